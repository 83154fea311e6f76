/// Identifies one progress stream within a script run.
pub type SourceId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
