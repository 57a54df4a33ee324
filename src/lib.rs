//! Barrier synchronized load generation against a shared transactional record store.
//!
//! A run fills the store with a fixed workload, spawns a cohort of writer and reader
//! threads, holds every one of them at a start barrier until the whole cohort is ready
//! and then releases them at once, so the measured time reflects contention between the
//! workers and not the order in which the OS happened to start them.

mod backoff;
mod barrier;
pub mod config;
mod error;
mod orchestrator;
mod platform;
mod prepare;
mod session;
mod store;
mod timer;
mod worker;

pub use backoff::Backoff;
pub use barrier::{StartBarrier, WaitStrategy};
pub use config::HarnessConfig;
pub use error::{JoinError, SetupError, StoreError, WorkerError};
pub use orchestrator::{Orchestrator, RunReport};
pub use platform::{PlatformThread, StdThreads, WorkerEntry};
pub use prepare::prepare;
pub use session::{execute, ExitStatus};
pub use store::{
    FieldType, FieldValue, MemStore, RecordRef, Store, TxLock, MIN_STORE_BYTES, WORD_BYTES,
};
pub use timer::{timed, Elapsed, Timer};
pub use worker::{Cursor, Role, Worker, WorkerOutcome};
