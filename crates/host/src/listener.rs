use cronscript_core::progress::ProgressArgs;
use cronscript_core::types::SourceId;

/// Receives progress notifications from an [`ExecutionHost`](crate::ExecutionHost).
///
/// Notifications are raised synchronously on the thread running the script,
/// in the order the script reported them.
pub trait ProgressListener: Send + Sync {
    /// An in-progress record was processed.
    fn on_progress(&self, args: &ProgressArgs);

    /// The progress stream `source_id` completed.
    fn on_progress_completed(&self, source_id: SourceId);
}
