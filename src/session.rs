use crate::{
    orchestrator::{Orchestrator, RunReport},
    platform::PlatformThread,
    store::Store,
    timer::timed,
};
use log::{error, info, warn};
use std::{io::Write, sync::Arc};

/// How a session ended, mapped one to one onto process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    Usage,
    StoreUnavailable,
    SetupFailed,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Usage => 1,
            ExitStatus::StoreUnavailable => 2,
            ExitStatus::SetupFailed => 3,
        }
    }
}

/// Time one orchestrated run against an attached store, then tear the store down.
///
/// `delete_store` runs whether or not setup succeeded. The elapsed time line is only
/// written to `out` when workers actually ran.
pub fn execute<S, P, D, W>(
    orchestrator: &Orchestrator<P>,
    store: Arc<S>,
    readers: usize,
    writers: usize,
    delete_store: D,
    out: &mut W,
) -> (ExitStatus, Option<RunReport>)
where
    S: Store + ?Sized + 'static,
    P: PlatformThread,
    D: FnOnce(),
    W: Write,
{
    let (result, elapsed) = timed(|| orchestrator.run(store, readers, writers));

    let outcome = match result {
        Ok(report) => {
            if !report.is_clean() {
                warn!(
                    "degraded run: {}/{} workers spawned, {} join errors, {} stopped early",
                    report.spawned,
                    report.requested(),
                    report.join_errors.len(),
                    report.failed_workers()
                );
            }

            if let Err(err) = writeln!(out, "{}", elapsed) {
                error!("failed to report elapsed time: {}", err);
            }

            (ExitStatus::Success, Some(report))
        }
        Err(err) => {
            error!("{}: skipping tests.", err);
            (ExitStatus::SetupFailed, None)
        }
    };

    delete_store();
    info!("session finished with exit code {}", outcome.0.code());
    outcome
}
