use std::{
    fmt,
    time::{Duration, Instant},
};

/// Wall clock stopwatch around a run.
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Elapsed {
        Elapsed(self.start.elapsed())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Elapsed(Duration);

impl Elapsed {
    pub fn duration(self) -> Duration {
        self.0
    }

    pub fn as_millis(self) -> u128 {
        self.0.as_millis()
    }
}

impl fmt::Display for Elapsed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "elapsed: {} ms", self.as_millis())
    }
}

/// Run `f` and measure how long it took.
pub fn timed<T, F>(f: F) -> (T, Elapsed)
where
    F: FnOnce() -> T,
{
    let timer = Timer::start();
    let value = f();
    (value, timer.elapsed())
}

#[cfg(test)]
mod tests {
    use super::timed;
    use std::{thread, time::Duration};

    #[test]
    fn measures_the_closure() {
        let (value, elapsed) = timed(|| {
            thread::sleep(Duration::from_millis(15));
            7
        });

        assert_eq!(value, 7);
        assert!(elapsed.as_millis() >= 15);
        assert_eq!(
            elapsed.to_string(),
            format!("elapsed: {} ms", elapsed.as_millis())
        );
    }
}
