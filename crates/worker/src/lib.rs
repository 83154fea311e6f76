//! Scheduled script worker.
//!
//! Wraps an [`ExecutionHost`](cronscript_host::ExecutionHost) in a
//! [`ScheduledScriptJob`], drives it from an interval trigger loop and
//! publishes live status and [`JobEvent`](cronscript_events::JobEvent)s
//! while scripts run.

pub mod config;
pub mod error;
pub mod event_log;
pub mod job;
pub mod scheduler;

pub use config::WorkerConfig;
pub use error::JobError;
pub use event_log::log_job_events;
pub use job::{RunOutcome, ScheduledScriptJob};
pub use scheduler::{run_job_loop, JobScheduler, Schedule};
