//! Notification sink — fire-and-forget delivery of a fired reminder to
//! the desktop. The scheduler never blocks on or inspects the outcome
//! beyond logging; a failed notification must not stop the reminder from
//! being cleared.

use std::process::Command;

/// Maximum number of task lines included in a notification body.
pub const PREVIEW_TASKS: usize = 10;

/// Platform-specific notification adapters implement this trait.
pub trait NotificationSink: Send + Sync {
    /// Attempt to display a notification. `body_lines` are joined with
    /// newlines by the adapter.
    fn notify(&self, title: &str, body_lines: &[String]) -> Result<(), String>;
}

/// Notification title for a list.
pub fn notification_title(list_title: &str) -> String {
    format!("Reminder — {list_title}")
}

/// Compose the body: intro sentence, then up to [`PREVIEW_TASKS`]
/// bulleted task lines.
pub fn compose_body(list_title: &str, tasks: &[String]) -> Vec<String> {
    let mut lines = Vec::with_capacity(2 + tasks.len().min(PREVIEW_TASKS));
    lines.push(format!("You scheduled a reminder for '{list_title}'."));
    lines.push("Tasks:".to_string());
    for task in tasks.iter().take(PREVIEW_TASKS) {
        lines.push(format!("- {task}"));
    }
    lines
}

/// Sink that shells out to the platform notifier: `notify-send` on
/// Linux, `osascript` on macOS. Anything else reports unsupported, which
/// the caller swallows like any other delivery failure.
pub struct DesktopSink;

impl NotificationSink for DesktopSink {
    #[cfg(target_os = "linux")]
    fn notify(&self, title: &str, body_lines: &[String]) -> Result<(), String> {
        let status = Command::new("notify-send")
            .arg(title)
            .arg(body_lines.join("\n"))
            .status()
            .map_err(|e| format!("notify-send failed to start: {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("notify-send exited with {status}"))
        }
    }

    #[cfg(target_os = "macos")]
    fn notify(&self, title: &str, body_lines: &[String]) -> Result<(), String> {
        let script = format!(
            "display notification \"{}\" with title \"{}\"",
            escape_applescript(&body_lines.join("\n")),
            escape_applescript(title),
        );
        let status = Command::new("osascript")
            .arg("-e")
            .arg(&script)
            .status()
            .map_err(|e| format!("osascript failed to start: {e}"))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("osascript exited with {status}"))
        }
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    fn notify(&self, _title: &str, _body_lines: &[String]) -> Result<(), String> {
        Err("no desktop notifier on this platform".to_string())
    }
}

#[cfg(target_os = "macos")]
fn escape_applescript(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Sink that drops everything; used when notifications are disabled.
pub struct NullSink;

impl NotificationSink for NullSink {
    fn notify(&self, _title: &str, _body_lines: &[String]) -> Result<(), String> {
        Ok(())
    }
}

/// Test double that records every delivery.
#[cfg(any(test, feature = "test-sinks"))]
pub struct RecordingSink {
    pub sent: std::sync::Mutex<Vec<(String, Vec<String>)>>,
}

#[cfg(any(test, feature = "test-sinks"))]
impl RecordingSink {
    pub fn new() -> Self {
        Self {
            sent: std::sync::Mutex::new(Vec::new()),
        }
    }
}

#[cfg(any(test, feature = "test-sinks"))]
impl Default for RecordingSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-sinks"))]
impl NotificationSink for RecordingSink {
    fn notify(&self, title: &str, body_lines: &[String]) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((title.to_string(), body_lines.to_vec()));
        Ok(())
    }
}

/// Test double that always fails delivery.
#[cfg(any(test, feature = "test-sinks"))]
pub struct FailingSink;

#[cfg(any(test, feature = "test-sinks"))]
impl NotificationSink for FailingSink {
    fn notify(&self, _title: &str, _body_lines: &[String]) -> Result<(), String> {
        Err("sink is down".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_template() {
        assert_eq!(notification_title("Errands"), "Reminder — Errands");
    }

    #[test]
    fn body_has_intro_and_bullets() {
        let tasks = vec!["Buy milk".to_string(), "Pay bills".to_string()];
        let body = compose_body("Errands", &tasks);
        assert_eq!(body[0], "You scheduled a reminder for 'Errands'.");
        assert_eq!(body[1], "Tasks:");
        assert_eq!(body[2], "- Buy milk");
        assert_eq!(body[3], "- Pay bills");
    }

    #[test]
    fn body_caps_at_ten_tasks() {
        let tasks: Vec<String> = (0..25).map(|i| format!("task {i}")).collect();
        let body = compose_body("Big", &tasks);
        // intro + "Tasks:" + 10 bullets
        assert_eq!(body.len(), 2 + PREVIEW_TASKS);
        assert_eq!(body.last().unwrap(), "- task 9");
    }

    #[test]
    fn empty_list_still_composes() {
        let body = compose_body("Empty", &[]);
        assert_eq!(body.len(), 2);
    }

    #[test]
    fn recording_sink_captures() {
        let sink = RecordingSink::new();
        sink.notify("t", &["a".into()]).unwrap();
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "t");
    }
}
