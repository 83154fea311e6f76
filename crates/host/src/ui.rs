//! Host callback sink.
//!
//! [`HostUi`] is the capability interface a session reports to: text
//! output, diagnostics, progress, and the interactive operations an
//! unattended host refuses. [`ScriptUi`] is the implementation used by
//! [`ExecutionHost`](crate::ExecutionHost): it turns partial writes into
//! whole log lines, maps diagnostics to log severities and folds progress
//! records into [`ProgressTimeline`]s.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cronscript_core::progress::{ProgressArgs, ProgressOutcome, ProgressRecord};
use cronscript_core::timeline::ProgressTimeline;
use cronscript_core::types::SourceId;

use crate::error::HostError;
use crate::listener::ProgressListener;
use crate::log::CategoryLog;

/// Credentials a script could ask the host for. Never produced by an
/// unattended host.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub user_name: String,
    pub password: String,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("user_name", &self.user_name)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a running script can ask of its host.
///
/// The interactive operations default to [`HostError::NotSupported`].
pub trait HostUi: Send + Sync {
    /// Append a fragment of output; complete lines are emitted as they form.
    fn write(&self, text: &str);

    /// Append `text` and terminate the current line.
    fn write_line(&self, text: &str);

    fn write_debug_line(&self, message: &str);

    fn write_verbose_line(&self, message: &str);

    fn write_warning_line(&self, message: &str);

    fn write_error_line(&self, message: &str);

    fn write_progress(&self, source_id: SourceId, record: &ProgressRecord) -> ProgressOutcome;

    fn read_line(&self) -> Result<String, HostError> {
        Err(HostError::NotSupported("read_line"))
    }

    fn read_line_secure(&self) -> Result<String, HostError> {
        Err(HostError::NotSupported("read_line_secure"))
    }

    fn prompt(&self, _caption: &str, _message: &str) -> Result<String, HostError> {
        Err(HostError::NotSupported("prompt"))
    }

    fn prompt_for_choice(
        &self,
        _caption: &str,
        _choices: &[String],
        _default_choice: usize,
    ) -> Result<usize, HostError> {
        Err(HostError::NotSupported("prompt_for_choice"))
    }

    fn prompt_for_credential(
        &self,
        _caption: &str,
        _user_name: &str,
    ) -> Result<Credential, HostError> {
        Err(HostError::NotSupported("prompt_for_credential"))
    }
}

// ---------------------------------------------------------------------------
// ScriptUi
// ---------------------------------------------------------------------------

/// Callback sink of an [`ExecutionHost`](crate::ExecutionHost).
pub struct ScriptUi {
    log: CategoryLog,
    verbose: bool,
    line: Mutex<String>,
    progress: Mutex<HashMap<SourceId, ProgressTimeline>>,
    listeners: Mutex<Vec<Arc<dyn ProgressListener>>>,
}

impl ScriptUi {
    pub fn new(log: CategoryLog, verbose: bool) -> Self {
        Self {
            log,
            verbose,
            line: Mutex::new(String::new()),
            progress: Mutex::new(HashMap::new()),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, listener: Arc<dyn ProgressListener>) {
        lock(&self.listeners).push(listener);
    }

    /// Emit whatever partial line is still buffered.
    pub fn flush(&self) {
        let pending = std::mem::take(&mut *lock(&self.line));
        let pending = pending.trim_end_matches(['\r', '\n']);
        if !pending.is_empty() {
            self.log.info(pending);
        }
    }

    /// Number of progress streams opened but not yet completed.
    pub fn open_progress_count(&self) -> usize {
        lock(&self.progress).len()
    }

    /// Finish every still-open timeline as if its completed record arrived.
    ///
    /// Returns how many timelines were closed.
    pub fn finish_open_progress(&self) -> usize {
        let mut open: Vec<SourceId> = lock(&self.progress).keys().copied().collect();
        open.sort_unstable();
        for source_id in &open {
            self.write_progress(*source_id, &ProgressRecord::completed());
        }
        open.len()
    }

    fn notify_progress(&self, args: &ProgressArgs) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener.on_progress(args);
        }
    }

    fn notify_completed(&self, source_id: SourceId) {
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener.on_progress_completed(source_id);
        }
    }
}

impl HostUi for ScriptUi {
    fn write(&self, text: &str) {
        let mut complete = Vec::new();
        {
            let mut line = lock(&self.line);
            line.push_str(text);
            while let Some(pos) = line.find('\n') {
                let head: String = line.drain(..=pos).collect();
                let head = head.trim_end_matches(['\r', '\n']);
                if !head.is_empty() {
                    complete.push(head.to_string());
                }
            }
        }
        for line in complete {
            self.log.info(&line);
        }
    }

    fn write_line(&self, text: &str) {
        let line = {
            let mut buffer = lock(&self.line);
            buffer.push_str(text);
            std::mem::take(&mut *buffer)
        };
        if !line.is_empty() {
            self.log.info(&line);
        }
    }

    fn write_debug_line(&self, message: &str) {
        self.log.info(message);
    }

    fn write_verbose_line(&self, message: &str) {
        if self.verbose {
            self.log.info(message);
        }
    }

    fn write_warning_line(&self, message: &str) {
        self.log.warn(message);
    }

    fn write_error_line(&self, message: &str) {
        self.log.except(message);
    }

    fn write_progress(&self, source_id: SourceId, record: &ProgressRecord) -> ProgressOutcome {
        if record.is_completed() {
            let finished = lock(&self.progress).remove(&source_id);
            let Some(mut timeline) = finished else {
                tracing::debug!(source_id, "Ignoring completed progress for unknown source");
                return ProgressOutcome::UnknownSource;
            };
            timeline.finish();
            let text = timeline.render();
            self.write_verbose_line(text.trim_end());
            self.notify_completed(source_id);
            return ProgressOutcome::Completed(text);
        }

        let outcome = match lock(&self.progress).entry(source_id) {
            Entry::Occupied(mut entry) => {
                let timeline = entry.get_mut();
                timeline.update_activity(&record.activity);
                timeline.update_status(record.status_text());
                ProgressOutcome::Updated
            }
            Entry::Vacant(entry) => {
                let timeline = entry.insert(ProgressTimeline::new(&record.activity));
                timeline.update_status(record.status_text());
                ProgressOutcome::Started
            }
        };
        self.notify_progress(&ProgressArgs::from_record(source_id, record));
        outcome
    }
}

/// Lock a mutex, recovering the data if a listener panicked while holding it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::log::{LogLevel, MemoryLog};

    /// Records notifications in arrival order.
    #[derive(Default)]
    struct RecordingListener {
        events: Mutex<Vec<String>>,
    }

    impl RecordingListener {
        fn events(&self) -> Vec<String> {
            lock(&self.events).clone()
        }
    }

    impl ProgressListener for RecordingListener {
        fn on_progress(&self, args: &ProgressArgs) {
            lock(&self.events).push(format!(
                "progress {} {} {}%",
                args.source_id, args.activity, args.percent_complete
            ));
        }

        fn on_progress_completed(&self, source_id: SourceId) {
            lock(&self.events).push(format!("completed {source_id}"));
        }
    }

    fn ui_with_log(verbose: bool) -> (ScriptUi, Arc<MemoryLog>) {
        let memory = Arc::new(MemoryLog::new());
        let ui = ScriptUi::new(CategoryLog::new(memory.clone(), "Script"), verbose);
        (ui, memory)
    }

    #[test]
    fn fragments_are_joined_into_one_line() {
        let (ui, log) = ui_with_log(true);
        ui.write("Copying ");
        ui.write("42 ");
        ui.write("files");
        assert!(log.entries().is_empty(), "nothing logged before the line ends");
        ui.write_line("");
        assert_eq!(log.messages(LogLevel::Info), vec!["Copying 42 files"]);
    }

    #[test]
    fn newline_in_write_flushes_each_line() {
        let (ui, log) = ui_with_log(true);
        ui.write("first\r\nsec");
        ui.write("ond\nthird");
        assert_eq!(log.messages(LogLevel::Info), vec!["first", "second"]);
        ui.flush();
        assert_eq!(log.messages(LogLevel::Info), vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_lines_are_not_logged() {
        let (ui, log) = ui_with_log(true);
        ui.write_line("");
        ui.write("\n\n");
        ui.flush();
        assert!(log.entries().is_empty());
    }

    #[test]
    fn diagnostics_map_to_severities() {
        let (ui, log) = ui_with_log(true);
        ui.write_debug_line("dbg");
        ui.write_verbose_line("verbose");
        ui.write_warning_line("warn");
        ui.write_error_line("err");

        assert_eq!(log.messages(LogLevel::Info), vec!["dbg", "verbose"]);
        assert_eq!(log.messages(LogLevel::Warn), vec!["warn"]);
        assert_eq!(log.messages(LogLevel::Except), vec!["err"]);
    }

    #[test]
    fn verbose_lines_dropped_when_disabled() {
        let (ui, log) = ui_with_log(false);
        ui.write_verbose_line("chatty");
        assert!(log.entries().is_empty());
    }

    #[test]
    fn progress_opens_updates_and_completes_timeline() {
        let (ui, log) = ui_with_log(true);
        let listener = Arc::new(RecordingListener::default());
        ui.subscribe(listener.clone());

        assert_eq!(
            ui.write_progress(1, &ProgressRecord::new("Load", "Load").with_percent(0)),
            ProgressOutcome::Started
        );
        assert_eq!(
            ui.write_progress(1, &ProgressRecord::new("Load", "Parsing").with_percent(50)),
            ProgressOutcome::Updated
        );
        assert_eq!(
            ui.write_progress(1, &ProgressRecord::new("Load", "Parsing").with_percent(50)),
            ProgressOutcome::Updated
        );
        assert_eq!(ui.open_progress_count(), 1);

        let outcome = ui.write_progress(1, &ProgressRecord::completed());
        let text = assert_matches!(outcome, ProgressOutcome::Completed(text) => text);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3, "unexpected timeline: {lines:?}");
        assert_eq!(&lines[..2], &["Load", "Parsing"]);
        assert_eq!(ui.open_progress_count(), 0);

        assert_eq!(
            listener.events(),
            vec![
                "progress 1 Load 0%",
                "progress 1 Load 50%",
                "progress 1 Load 50%",
                "completed 1",
            ]
        );
        assert!(log.contains(LogLevel::Info, "=== Duration = "));
    }

    #[test]
    fn completed_for_unknown_source_is_ignored() {
        let (ui, log) = ui_with_log(true);
        let listener = Arc::new(RecordingListener::default());
        ui.subscribe(listener.clone());

        assert_eq!(
            ui.write_progress(99, &ProgressRecord::completed()),
            ProgressOutcome::UnknownSource
        );
        assert!(listener.events().is_empty());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn sources_are_tracked_independently() {
        let (ui, _log) = ui_with_log(true);
        let listener = Arc::new(RecordingListener::default());
        ui.subscribe(listener.clone());

        ui.write_progress(1, &ProgressRecord::new("Outer", "step 1"));
        ui.write_progress(2, &ProgressRecord::new("Inner", "item 1"));
        ui.write_progress(2, &ProgressRecord::completed());
        assert_eq!(ui.open_progress_count(), 1);
        ui.write_progress(1, &ProgressRecord::completed());

        assert_eq!(
            listener.events(),
            vec![
                "progress 1 Outer -1%",
                "progress 2 Inner -1%",
                "completed 2",
                "completed 1",
            ]
        );
    }

    #[test]
    fn finish_open_progress_closes_everything() {
        let (ui, _log) = ui_with_log(true);
        let listener = Arc::new(RecordingListener::default());
        ui.subscribe(listener.clone());

        ui.write_progress(3, &ProgressRecord::new("A", "a"));
        ui.write_progress(4, &ProgressRecord::new("B", "b"));
        assert_eq!(ui.finish_open_progress(), 2);
        assert_eq!(ui.open_progress_count(), 0);
        assert_eq!(ui.finish_open_progress(), 0);

        let events = listener.events();
        assert_eq!(&events[2..], &["completed 3", "completed 4"]);
    }

    #[test]
    fn interactive_operations_are_not_supported() {
        let (ui, _log) = ui_with_log(true);
        assert_matches!(ui.read_line(), Err(HostError::NotSupported("read_line")));
        assert_matches!(
            ui.read_line_secure(),
            Err(HostError::NotSupported("read_line_secure"))
        );
        assert_matches!(ui.prompt("c", "m"), Err(HostError::NotSupported("prompt")));
        assert_matches!(
            ui.prompt_for_choice("c", &["yes".to_string()], 0),
            Err(HostError::NotSupported("prompt_for_choice"))
        );
        assert_matches!(
            ui.prompt_for_credential("c", "admin"),
            Err(HostError::NotSupported("prompt_for_credential"))
        );
    }

    #[test]
    fn credential_debug_redacts_password() {
        let credential = Credential {
            user_name: "svc".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{credential:?}");
        assert!(debug.contains("svc"));
        assert!(!debug.contains("hunter2"));
    }
}
