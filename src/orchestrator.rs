//! Runs one synchronized load round.
//!
//! A run prepares the workload, spawns the requested writers and readers, holds all of
//! them at a [`StartBarrier`] until every spawned worker has arrived, releases them at
//! once and then joins them in spawn order.

use crate::{
    barrier::StartBarrier,
    config::HarnessConfig,
    error::{JoinError, SetupError},
    platform::{PlatformThread, StdThreads},
    prepare::prepare,
    store::Store,
    worker::{Role, Worker, WorkerOutcome},
};
use log::{error, info, warn};
use std::{io, sync::Arc, time::Instant};

struct WorkerDescriptor<H> {
    id: usize,
    role: Role,
    handle: H,
}

/// What happened during a run that got past setup.
#[derive(Debug)]
pub struct RunReport {
    pub readers: usize,
    pub writers: usize,
    pub spawned: usize,
    pub joined: usize,
    /// Arrival count observed by the barrier at the moment it was released.
    pub arrivals_at_release: usize,
    pub released_at: Option<Instant>,
    /// False when a bounded quorum wait ran out before every worker arrived.
    pub quorum_reached: bool,
    pub spawn_error: Option<io::Error>,
    pub join_errors: Vec<(usize, JoinError)>,
    /// Outcomes of the workers that were joined cleanly, in spawn order.
    pub outcomes: Vec<WorkerOutcome>,
}

impl RunReport {
    fn new(readers: usize, writers: usize) -> Self {
        Self {
            readers,
            writers,
            spawned: 0,
            joined: 0,
            arrivals_at_release: 0,
            released_at: None,
            quorum_reached: true,
            spawn_error: None,
            join_errors: Vec::new(),
            outcomes: Vec::new(),
        }
    }

    pub fn requested(&self) -> usize {
        self.readers + self.writers
    }

    /// Workers that stopped their loop early.
    pub fn failed_workers(&self) -> usize {
        self.outcomes.iter().filter(|outcome| !outcome.is_ok()).count()
    }

    /// Every requested worker was spawned, joined and ran its loop to the end.
    pub fn is_clean(&self) -> bool {
        self.spawned == self.requested()
            && self.quorum_reached
            && self.join_errors.is_empty()
            && self.failed_workers() == 0
    }
}

pub struct Orchestrator<P = StdThreads> {
    config: HarnessConfig,
    platform: P,
}

impl Orchestrator<StdThreads> {
    pub fn new(config: HarnessConfig) -> Self {
        let platform = StdThreads::new(config.stack_size);
        Self::with_platform(config, platform)
    }
}

impl<P> Orchestrator<P>
where
    P: PlatformThread,
{
    pub fn with_platform(config: HarnessConfig, platform: P) -> Self {
        Self { config, platform }
    }

    /// Run `writers` writer and `readers` reader workers against `store`.
    ///
    /// Errors are returned only for setup failures, before any worker exists. Spawn,
    /// join and per worker failures are logged and recorded in the report.
    pub fn run<S>(
        &self,
        store: Arc<S>,
        readers: usize,
        writers: usize,
    ) -> Result<RunReport, SetupError>
    where
        S: Store + ?Sized + 'static,
    {
        let total = readers + writers;
        let mut report = RunReport::new(readers, writers);

        if total == 0 {
            info!("no workers requested");
            return Ok(report);
        }

        prepare(&*store, self.config.records, self.config.record_size)?;

        let mut table: Vec<WorkerDescriptor<P::Handle>> = Vec::new();
        table
            .try_reserve_exact(total)
            .map_err(|_| SetupError::ThreadTable(total))?;

        let barrier = Arc::new(StartBarrier::new(total, self.config.wait_strategy));

        if !self.config.sync_start {
            barrier.release_all();
        }

        for id in 0..total {
            let role = Role::for_worker(id, writers);
            let worker = Worker::new(
                id,
                role,
                Arc::clone(&store),
                Arc::clone(&barrier),
                &self.config,
            );

            let name = format!("{}-{}", role.name(), id);
            match self.platform.spawn(name, Box::new(move || worker.run())) {
                Ok(handle) => table.push(WorkerDescriptor { id, role, handle }),
                Err(err) => {
                    error!("Failed to spawn {} thread {}: {}", role, id, err);
                    report.spawn_error = Some(err);
                    break;
                }
            }
        }

        report.spawned = table.len();

        if self.config.sync_start {
            if report.spawned < total {
                warn!(
                    "continuing with {} of {} workers",
                    report.spawned, total
                );
                barrier.lower_quorum(report.spawned);
            }

            report.quorum_reached = match self.config.quorum_timeout {
                Some(timeout) => barrier.await_quorum_timeout(timeout),
                None => {
                    barrier.await_quorum();
                    true
                }
            };

            if !report.quorum_reached {
                error!(
                    "only {} of {} workers reached the start barrier, releasing them anyway",
                    barrier.arrivals(),
                    barrier.quorum()
                );
            }

            report.arrivals_at_release = barrier.release_all();
        }

        report.released_at = barrier.released_at();

        for descriptor in table {
            match self.platform.join(descriptor.handle) {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(err) => {
                    error!(
                        "Failed to join {} thread {}: {}",
                        descriptor.role, descriptor.id, err
                    );
                    report.join_errors.push((descriptor.id, err));
                }
            }

            report.joined += 1;
        }

        info!(
            "{} workers joined, {} stopped early",
            report.joined,
            report.failed_workers() + report.join_errors.len()
        );

        Ok(report)
    }
}
