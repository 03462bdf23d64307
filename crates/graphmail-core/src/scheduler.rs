//! Periodic mail retrieval

use crate::CoreResult;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

/// Work the scheduler runs on every tick
#[async_trait]
pub trait PeriodicJob: Send + Sync {
    /// Run one pass, returning how many items were processed
    async fn run_once(&self) -> CoreResult<usize>;
}

/// Commands accepted by a running scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Run the job immediately, outside the regular interval
    RunNow,
    /// Stop the scheduler loop
    Shutdown,
}

/// Runs a job at a fixed interval until told to stop.
///
/// The first run happens one full interval after [`RetrievalScheduler::run`]
/// starts. A failed run is logged and the schedule carries on.
pub struct RetrievalScheduler {
    job: Arc<dyn PeriodicJob>,
    interval: Duration,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl RetrievalScheduler {
    pub fn new(
        job: Arc<dyn PeriodicJob>,
        interval: Duration,
        command_rx: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            job,
            interval,
            command_rx,
        }
    }

    /// Run the scheduler loop
    pub async fn run(mut self) {
        info!(
            "Retrieval scheduler started, interval {}s",
            self.interval.as_secs()
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    debug!("Scheduled retrieval tick");
                    self.run_job().await;
                }
                command = self.command_rx.recv() => match command {
                    Some(SchedulerCommand::RunNow) => {
                        debug!("Retrieval requested");
                        self.run_job().await;
                    }
                    Some(SchedulerCommand::Shutdown) => {
                        info!("Retrieval scheduler shutting down");
                        break;
                    }
                    None => {
                        debug!("All scheduler handles dropped");
                        break;
                    }
                },
            }
        }

        info!("Retrieval scheduler stopped");
    }

    async fn run_job(&self) {
        match self.job.run_once().await {
            Ok(count) => info!("Scheduled retrieval finished, {} emails", count),
            Err(e) => error!("Scheduled retrieval failed: {}", e),
        }
    }
}

/// Create the command channel for a scheduler
pub fn create_scheduler_channel() -> (
    mpsc::Sender<SchedulerCommand>,
    mpsc::Receiver<SchedulerCommand>,
) {
    mpsc::channel::<SchedulerCommand>(16)
}
