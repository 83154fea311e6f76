//! Progress records emitted by running scripts and the snapshot handed to
//! progress listeners.

use serde::{Deserialize, Serialize};

use crate::types::SourceId;

/// Sentinel for an unknown percentage or remaining time.
pub const UNKNOWN: i32 = -1;

/// Whether a record continues a progress stream or closes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    #[default]
    InProgress,
    Completed,
}

/// One raw progress update as reported by a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub activity: String,
    pub current_operation: String,
    pub status_description: String,
    /// `0..=100`, or [`UNKNOWN`].
    pub percent_complete: i32,
    /// Seconds until completion, or [`UNKNOWN`].
    pub seconds_remaining: i32,
    pub kind: ProgressKind,
}

impl Default for ProgressRecord {
    fn default() -> Self {
        Self {
            activity: String::new(),
            current_operation: String::new(),
            status_description: String::new(),
            percent_complete: UNKNOWN,
            seconds_remaining: UNKNOWN,
            kind: ProgressKind::InProgress,
        }
    }
}

impl ProgressRecord {
    /// An in-progress record for `activity` with the given status text.
    pub fn new(activity: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            activity: activity.into(),
            status_description: status.into(),
            ..Self::default()
        }
    }

    /// A record that closes the progress stream it is written to.
    pub fn completed() -> Self {
        Self {
            kind: ProgressKind::Completed,
            ..Self::default()
        }
    }

    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.current_operation = operation.into();
        self
    }

    /// Set the completion percentage, clamped to `0..=100` unless unknown.
    pub fn with_percent(mut self, percent: i32) -> Self {
        self.percent_complete = if percent < 0 {
            UNKNOWN
        } else {
            percent.min(100)
        };
        self
    }

    pub fn with_seconds_remaining(mut self, seconds: i32) -> Self {
        self.seconds_remaining = seconds.max(UNKNOWN);
        self
    }

    pub fn is_completed(&self) -> bool {
        self.kind == ProgressKind::Completed
    }

    /// The text a timeline records for this update.
    ///
    /// Prefers the current operation and falls back to the status
    /// description when the operation is empty.
    pub fn status_text(&self) -> &str {
        if self.current_operation.is_empty() {
            &self.status_description
        } else {
            &self.current_operation
        }
    }
}

/// Snapshot raised to listeners for every in-progress record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressArgs {
    pub source_id: SourceId,
    pub activity: String,
    pub current_operation: String,
    pub status_description: String,
    pub percent_complete: i32,
    pub seconds_remaining: i32,
}

impl ProgressArgs {
    pub fn from_record(source_id: SourceId, record: &ProgressRecord) -> Self {
        Self {
            source_id,
            activity: record.activity.clone(),
            current_operation: record.current_operation.clone(),
            status_description: record.status_description.clone(),
            percent_complete: record.percent_complete,
            seconds_remaining: record.seconds_remaining,
        }
    }
}

/// What the host did with a progress record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressOutcome {
    /// First sighting of the source id; a new timeline was opened.
    Started,
    /// An open timeline was updated.
    Updated,
    /// The timeline was finished; carries its rendered text.
    Completed(String),
    /// A completed record for a source id with no open timeline. Benign.
    UnknownSource,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_record_has_unknown_counters() {
        let record = ProgressRecord::default();
        assert_eq!(record.percent_complete, UNKNOWN);
        assert_eq!(record.seconds_remaining, UNKNOWN);
        assert!(!record.is_completed());
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ProgressRecord::new("a", "b").with_percent(250).percent_complete, 100);
        assert_eq!(ProgressRecord::new("a", "b").with_percent(-7).percent_complete, UNKNOWN);
        assert_eq!(ProgressRecord::new("a", "b").with_percent(42).percent_complete, 42);
    }

    #[test]
    fn status_text_prefers_operation() {
        let record = ProgressRecord::new("Load", "Reading").with_operation("file 3 of 9");
        assert_eq!(record.status_text(), "file 3 of 9");
    }

    #[test]
    fn status_text_falls_back_to_description() {
        let record = ProgressRecord::new("Load", "Reading");
        assert_eq!(record.status_text(), "Reading");
    }

    #[test]
    fn args_copy_record_fields() {
        let record = ProgressRecord::new("Sync", "Uploading")
            .with_operation("chunk 4")
            .with_percent(40)
            .with_seconds_remaining(90);
        let args = ProgressArgs::from_record(7, &record);
        assert_eq!(args.source_id, 7);
        assert_eq!(args.activity, "Sync");
        assert_eq!(args.current_operation, "chunk 4");
        assert_eq!(args.status_description, "Uploading");
        assert_eq!(args.percent_complete, 40);
        assert_eq!(args.seconds_remaining, 90);
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ProgressKind::InProgress).expect("serialize");
        assert_eq!(json, "\"in_progress\"");
    }
}
