//! Progress timeline: folds a chatty stream of progress updates into a
//! readable, de-duplicated log.
//!
//! One [`ProgressTimeline`] exists per open progress source. A line is only
//! appended when the activity or status text actually changes (compared
//! case-insensitively), so a script that reports the same status a thousand
//! times still produces a single line.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Accumulated history of one progress stream.
#[derive(Debug, Clone)]
pub struct ProgressTimeline {
    started: Instant,
    current_activity: String,
    current_status: String,
    text: String,
    lines: usize,
}

impl ProgressTimeline {
    /// Open a timeline seeded with its first activity line.
    ///
    /// The activity doubles as the initial status text, so a first status
    /// equal to the activity name does not produce a second line.
    pub fn new(activity: &str) -> Self {
        let mut timeline = Self {
            started: Instant::now(),
            current_activity: activity.to_string(),
            current_status: activity.to_string(),
            text: String::new(),
            lines: 0,
        };
        timeline.append_line(activity);
        timeline
    }

    /// Record an activity transition as `>> name <<`.
    pub fn update_activity(&mut self, activity: &str) {
        if activity.is_empty() || eq_ignore_case(&self.current_activity, activity) {
            return;
        }
        self.current_activity = activity.to_string();
        let line = format!(">> {activity} <<");
        self.append_line(&line);
    }

    /// Record a status transition verbatim.
    pub fn update_status(&mut self, status: &str) {
        if status.is_empty() || eq_ignore_case(&self.current_status, status) {
            return;
        }
        self.current_status = status.to_string();
        self.append_line(status);
    }

    /// Append the elapsed wall-clock time since the timeline was opened.
    pub fn finish(&mut self) {
        let line = duration_line(self.started.elapsed());
        self.append_line(&line);
    }

    /// The full accumulated log, one newline-terminated line per transition.
    pub fn render(&self) -> String {
        self.text.clone()
    }

    pub fn activity(&self) -> &str {
        &self.current_activity
    }

    pub fn status_text(&self) -> &str {
        &self.current_status
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    fn append_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
        self.lines += 1;
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

/// `=== Duration = 1,234ms, 00:00:01.2340000 ===`
pub fn duration_line(elapsed: Duration) -> String {
    format!(
        "=== Duration = {}ms, {} ===",
        group_thousands(elapsed.as_millis()),
        format_elapsed(elapsed)
    )
}

/// Render a duration as `[d.]hh:mm:ss[.fffffff]` (100ns resolution).
pub fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let days = total_secs / 86_400;
    let hours = (total_secs % 86_400) / 3_600;
    let minutes = (total_secs % 3_600) / 60;
    let seconds = total_secs % 60;
    let ticks = elapsed.subsec_nanos() / 100;

    let mut out = String::new();
    if days > 0 {
        let _ = write!(out, "{days}.");
    }
    let _ = write!(out, "{hours:02}:{minutes:02}:{seconds:02}");
    if ticks > 0 {
        let _ = write!(out, ".{ticks:07}");
    }
    out
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
