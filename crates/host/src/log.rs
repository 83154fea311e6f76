//! Log sink injected into the host and the jobs.
//!
//! Script output is routed through a [`ScriptLog`] rather than straight to
//! `tracing`, so embedders can capture transcripts and tests can assert on
//! what a script wrote. [`TracingLog`] is the production sink.

use std::sync::{Arc, Mutex, PoisonError};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    /// An error raised by the script itself.
    Except,
}

/// Destination for host and job log lines.
pub trait ScriptLog: Send + Sync {
    fn write(&self, level: LogLevel, category: &str, message: &str);
}

/// Forwards every entry to `tracing` with a `category` field.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl ScriptLog for TracingLog {
    fn write(&self, level: LogLevel, category: &str, message: &str) {
        match level {
            LogLevel::Info => tracing::info!(category, "{message}"),
            LogLevel::Warn => tracing::warn!(category, "{message}"),
            LogLevel::Error => tracing::error!(category, "{message}"),
            LogLevel::Except => tracing::error!(category, exception = true, "{message}"),
        }
    }
}

/// One entry captured by [`MemoryLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub category: String,
    pub message: String,
}

/// Keeps every entry in memory, e.g. to attach a run transcript to a report.
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages logged at `level`, in order.
    pub fn messages(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|e| e.level == level)
            .map(|e| e.message)
            .collect()
    }

    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl ScriptLog for MemoryLog {
    fn write(&self, level: LogLevel, category: &str, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogEntry {
                level,
                category: category.to_string(),
                message: message.to_string(),
            });
    }
}

/// A [`ScriptLog`] bound to a fixed category.
#[derive(Clone)]
pub struct CategoryLog {
    sink: Arc<dyn ScriptLog>,
    category: String,
}

impl CategoryLog {
    pub fn new(sink: Arc<dyn ScriptLog>, category: impl Into<String>) -> Self {
        Self {
            sink,
            category: category.into(),
        }
    }

    pub fn info(&self, message: &str) {
        self.sink.write(LogLevel::Info, &self.category, message);
    }

    pub fn warn(&self, message: &str) {
        self.sink.write(LogLevel::Warn, &self.category, message);
    }

    pub fn error(&self, message: &str) {
        self.sink.write(LogLevel::Error, &self.category, message);
    }

    pub fn except(&self, message: &str) {
        self.sink.write(LogLevel::Except, &self.category, message);
    }
}

impl std::fmt::Debug for CategoryLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CategoryLog")
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_log_tags_entries() {
        let memory = Arc::new(MemoryLog::new());
        let log = CategoryLog::new(memory.clone(), "Script");

        log.info("hello");
        log.warn("careful");
        log.except("boom");

        let entries = memory.entries();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.category == "Script"));
        assert_eq!(memory.messages(LogLevel::Warn), vec!["careful"]);
        assert!(memory.contains(LogLevel::Except, "boom"));
        assert!(!memory.contains(LogLevel::Error, "boom"));
    }

    #[test]
    fn clear_drops_entries() {
        let memory = MemoryLog::new();
        memory.write(LogLevel::Info, "x", "y");
        memory.clear();
        assert!(memory.entries().is_empty());
    }
}
