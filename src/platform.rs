//! The thread capability the orchestrator spawns and joins workers through.
//!
//! Only one backend ships, built on `std::thread`, which already hides the differences
//! between the pthread and Win32 thread APIs. The trait exists so the backend is picked
//! once, when the orchestrator is constructed, and so tests can inject spawn failures.

use crate::{error::JoinError, worker::WorkerOutcome};
use std::{
    any::Any,
    io,
    thread::{self, JoinHandle},
};

/// A worker body, moved onto the thread that runs it.
pub type WorkerEntry = Box<dyn FnOnce() -> WorkerOutcome + Send + 'static>;

pub trait PlatformThread: Send + Sync {
    type Handle: Send;

    fn spawn(&self, name: String, entry: WorkerEntry) -> io::Result<Self::Handle>;

    fn join(&self, handle: Self::Handle) -> Result<WorkerOutcome, JoinError>;
}

/// Joinable OS threads from the standard library.
#[derive(Debug, Clone, Default)]
pub struct StdThreads {
    stack_size: Option<usize>,
}

impl StdThreads {
    pub fn new(stack_size: Option<usize>) -> Self {
        Self { stack_size }
    }
}

impl PlatformThread for StdThreads {
    type Handle = JoinHandle<WorkerOutcome>;

    fn spawn(&self, name: String, entry: WorkerEntry) -> io::Result<Self::Handle> {
        let mut builder = thread::Builder::new().name(name);

        if let Some(size) = self.stack_size {
            builder = builder.stack_size(size);
        }

        builder.spawn(entry)
    }

    fn join(&self, handle: Self::Handle) -> Result<WorkerOutcome, JoinError> {
        handle
            .join()
            .map_err(|payload| JoinError::Panicked(panic_message(&*payload)))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{PlatformThread, StdThreads};
    use crate::{
        error::JoinError,
        worker::{Role, WorkerOutcome},
    };

    #[test]
    fn spawn_and_join() {
        let threads = StdThreads::new(Some(256 * 1024));
        let handle = threads
            .spawn(
                "reader-3".to_string(),
                Box::new(|| {
                    assert_eq!(std::thread::current().name(), Some("reader-3"));
                    WorkerOutcome::new(3, Role::Reader)
                }),
            )
            .unwrap();

        let outcome = threads.join(handle).unwrap();
        assert_eq!(outcome.id, 3);
        assert_eq!(outcome.role, Role::Reader);
    }

    #[test]
    fn panic_becomes_join_error() {
        let threads = StdThreads::default();
        let handle = threads
            .spawn(
                "writer-0".to_string(),
                Box::new(|| -> WorkerOutcome { panic!("store vanished") }),
            )
            .unwrap();

        assert_eq!(
            threads.join(handle).unwrap_err(),
            JoinError::Panicked("store vanished".to_string())
        );
    }
}
