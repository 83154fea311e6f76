//! Live status published by a scheduled script job.
//!
//! The four progress fields mirror the most recent progress record and are
//! cleared together once the progress stream completes. Run bookkeeping
//! (state, timestamps, last error) is kept alongside for observers.

use serde::{Deserialize, Serialize};

use crate::progress::ProgressArgs;
use crate::types::Timestamp;

/// Whether a job is currently executing its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Running,
}

/// Snapshot of a job's observable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct JobStatus {
    pub state: RunState,
    /// Current task in the script.
    pub activity: Option<String>,
    /// Current operation.
    pub current_operation: Option<String>,
    /// Current status description.
    pub status_description: Option<String>,
    /// Rendered as `"{percent}%, {remaining} seconds"`.
    pub progress: Option<String>,
    pub last_started_at: Option<Timestamp>,
    pub last_finished_at: Option<Timestamp>,
    pub last_error: Option<String>,
}

impl JobStatus {
    /// Copy a progress snapshot into the four progress fields.
    pub fn apply_progress(&mut self, args: &ProgressArgs) {
        self.activity = Some(args.activity.clone());
        self.current_operation = Some(args.current_operation.clone());
        self.status_description = Some(args.status_description.clone());
        self.progress = Some(format_progress(
            args.percent_complete,
            args.seconds_remaining,
        ));
    }

    /// Clear the four progress fields, signalling "no progress in flight".
    pub fn clear_progress(&mut self) {
        self.activity = None;
        self.current_operation = None;
        self.status_description = None;
        self.progress = None;
    }

    pub fn has_progress(&self) -> bool {
        self.activity.is_some()
            || self.current_operation.is_some()
            || self.status_description.is_some()
            || self.progress.is_some()
    }
}

/// Render the progress field, e.g. `"40%, 00:01:30 seconds"`.
pub fn format_progress(percent_complete: i32, seconds_remaining: i32) -> String {
    format!(
        "{percent_complete}%, {} seconds",
        format_seconds_span(i64::from(seconds_remaining))
    )
}

/// Render whole seconds as `[-][d.]hh:mm:ss`.
pub fn format_seconds_span(seconds: i64) -> String {
    let sign = if seconds < 0 { "-" } else { "" };
    let total = seconds.unsigned_abs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    if days > 0 {
        format!("{sign}{days}.{hours:02}:{minutes:02}:{secs:02}")
    } else {
        format!("{sign}{hours:02}:{minutes:02}:{secs:02}")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_args() -> ProgressArgs {
        ProgressArgs {
            source_id: 1,
            activity: "Export".to_string(),
            current_operation: "table 3".to_string(),
            status_description: "Writing rows".to_string(),
            percent_complete: 40,
            seconds_remaining: 90,
        }
    }

    #[test]
    fn format_progress_renders_percent_and_span() {
        assert_eq!(format_progress(40, 90), "40%, 00:01:30 seconds");
        assert_eq!(format_progress(100, 0), "100%, 00:00:00 seconds");
    }

    #[test]
    fn format_progress_unknown_remaining() {
        assert_eq!(format_progress(-1, -1), "-1%, -00:00:01 seconds");
    }

    #[test]
    fn format_seconds_span_days() {
        assert_eq!(format_seconds_span(90_061), "1.01:01:01");
        assert_eq!(format_seconds_span(-3_600), "-01:00:00");
    }

    #[test]
    fn apply_progress_sets_all_four_fields() {
        let mut status = JobStatus::default();
        status.apply_progress(&sample_args());
        assert_eq!(status.activity.as_deref(), Some("Export"));
        assert_eq!(status.current_operation.as_deref(), Some("table 3"));
        assert_eq!(status.status_description.as_deref(), Some("Writing rows"));
        assert_eq!(status.progress.as_deref(), Some("40%, 00:01:30 seconds"));
        assert!(status.has_progress());
    }

    #[test]
    fn clear_progress_resets_fields_but_keeps_bookkeeping() {
        let mut status = JobStatus {
            state: RunState::Running,
            last_error: Some("previous failure".to_string()),
            ..JobStatus::default()
        };
        status.apply_progress(&sample_args());
        status.clear_progress();

        assert!(!status.has_progress());
        assert_eq!(status.state, RunState::Running);
        assert_eq!(status.last_error.as_deref(), Some("previous failure"));
    }

    #[test]
    fn status_serializes_state_snake_case() {
        let json = serde_json::to_value(JobStatus::default()).expect("serialize");
        assert_eq!(json["state"], "idle");
        assert!(json["activity"].is_null());
    }
}
