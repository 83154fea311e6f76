//! Background logger for job events.

use cronscript_events::JobEvent;
use tokio::sync::broadcast::{self, error::RecvError};

/// Log every job event received until the bus closes.
///
/// Takes an already subscribed receiver so that events published between
/// subscription and the first poll are not missed. Returns the number of
/// events logged.
pub async fn log_job_events(mut rx: broadcast::Receiver<JobEvent>) -> u64 {
    let mut logged = 0;
    loop {
        match rx.recv().await {
            Ok(event) => {
                logged += 1;
                tracing::debug!(
                    event_type = %event.event_type,
                    job = %event.job_name,
                    payload = %event.payload,
                    "Job event",
                );
            }
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Job event logger lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    logged
}
