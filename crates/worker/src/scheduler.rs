//! Interval trigger loops for scheduled script jobs.
//!
//! Every job gets its own tokio task ticking on a fixed interval. A tick
//! moves the job onto a blocking thread for the duration of the script and
//! takes it back afterwards, so a job can never run twice at once; ticks
//! missed while a script is still running are skipped.

use std::sync::Arc;
use std::time::Duration;

use cronscript_core::job_config::JobConfig;
use cronscript_events::EventBus;
use cronscript_host::ScriptLog;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::WorkerConfig;
use crate::job::{RunOutcome, ScheduledScriptJob};

/// When a job is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub interval: Duration,
    /// Trigger immediately instead of after the first interval.
    pub run_on_start: bool,
}

impl Schedule {
    pub fn from_config(config: &JobConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs.max(1)),
            run_on_start: config.run_on_start,
        }
    }
}

/// Trigger `job` on `schedule` until `cancel` fires, then dispose it.
pub async fn run_job_loop(job: ScheduledScriptJob, schedule: Schedule, cancel: CancellationToken) {
    let mut job = job;
    let name = job.name().to_string();

    let start = if schedule.run_on_start {
        Instant::now()
    } else {
        Instant::now() + schedule.interval
    };
    let mut interval = tokio::time::interval_at(start, schedule.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        job = %name,
        interval_secs = schedule.interval.as_secs(),
        run_on_start = schedule.run_on_start,
        "Job scheduled"
    );

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(job = %name, "Job loop stopping");
                break;
            }
            _ = interval.tick() => {
                let run_cancel = cancel.clone();
                let handle = tokio::task::spawn_blocking(move || {
                    let outcome = job.run(&run_cancel);
                    (job, outcome)
                });

                match handle.await {
                    Ok((returned, outcome)) => {
                        job = returned;
                        match outcome {
                            Ok(RunOutcome::Completed) => {
                                tracing::debug!(job = %name, "Job run completed");
                            }
                            Ok(RunOutcome::Skipped) => {
                                tracing::debug!(job = %name, "Job run skipped");
                            }
                            Ok(RunOutcome::Cancelled) => {
                                tracing::info!(job = %name, "Job run cancelled");
                            }
                            Err(e) => {
                                tracing::error!(job = %name, error = %e, "Job run failed");
                            }
                        }
                    }
                    Err(e) => {
                        // The job was dropped (and its host released) while unwinding.
                        tracing::error!(job = %name, error = %e, "Job run panicked, unscheduling job");
                        return;
                    }
                }
            }
        }
    }

    job.dispose();
}

/// Owns the trigger loops of all scheduled jobs.
pub struct JobScheduler {
    cancel: CancellationToken,
    handles: Vec<(String, JoinHandle<()>)>,
}

impl JobScheduler {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Token cancelled by [`JobScheduler::shutdown`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn job_count(&self) -> usize {
        self.handles.len()
    }

    /// Start the trigger loop for `job`.
    pub fn spawn(&mut self, job: ScheduledScriptJob, schedule: Schedule) {
        let name = job.name().to_string();
        let handle = tokio::spawn(run_job_loop(job, schedule, self.cancel.child_token()));
        self.handles.push((name, handle));
    }

    /// Create and start every enabled job from `jobs`.
    ///
    /// A job whose host cannot be created is logged and left out; the
    /// remaining jobs are still scheduled. Returns how many were started.
    pub fn schedule_all(
        &mut self,
        jobs: Vec<JobConfig>,
        config: &WorkerConfig,
        log: Arc<dyn ScriptLog>,
        bus: Arc<EventBus>,
    ) -> usize {
        let base_dir = config.base_dir();
        let mut started = 0;

        for job_config in jobs {
            if !job_config.enabled {
                tracing::info!(job = %job_config.name, "Job disabled, not scheduling");
                continue;
            }
            let schedule = Schedule::from_config(&job_config);
            let name = job_config.name.clone();

            match ScheduledScriptJob::new(
                job_config,
                config.host.clone(),
                base_dir.clone(),
                log.clone(),
                bus.clone(),
            ) {
                Ok(job) => {
                    self.spawn(job, schedule);
                    started += 1;
                }
                Err(e) => {
                    tracing::error!(job = %name, error = %e, "Failed to start job");
                }
            }
        }

        started
    }

    /// Cancel every job loop and wait up to `timeout` for them to finish.
    pub async fn shutdown(self, timeout: Duration) {
        self.cancel.cancel();
        let deadline = Instant::now() + timeout;

        for (name, handle) in self.handles {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(())) => tracing::debug!(job = %name, "Job loop stopped"),
                Ok(Err(e)) => tracing::error!(job = %name, error = %e, "Job loop task failed"),
                Err(_) => tracing::warn!(job = %name, "Job loop did not stop before shutdown timeout"),
            }
        }
    }
}

impl Default for JobScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_from_config() {
        let mut config = JobConfig::new("nightly").with_interval_secs(90);
        config.run_on_start = true;

        let schedule = Schedule::from_config(&config);
        assert_eq!(schedule.interval, Duration::from_secs(90));
        assert!(schedule.run_on_start);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let config = JobConfig::new("fast").with_interval_secs(0);
        assert_eq!(Schedule::from_config(&config).interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn empty_scheduler_shuts_down_immediately() {
        let scheduler = JobScheduler::new();
        let token = scheduler.cancellation_token();
        assert_eq!(scheduler.job_count(), 0);

        scheduler.shutdown(Duration::from_secs(1)).await;
        assert!(token.is_cancelled());
    }
}
