//! User-facing notifications.
//!
//! The notifier is an owned value: whoever drives the UI holds one and passes
//! it nowhere else. A new notification replaces the current one.

use std::fmt;
use std::io::Write;
use std::time::{Duration, Instant};

pub const DEFAULT_NOTIFICATION_DURATION: Duration = Duration::from_millis(2000);

/// Tracing target of notification events. The console log layer skips it
/// because the notifier prints these lines itself.
pub const NOTIFICATION_TARGET: &str = "betterprompt::notification";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Info => "info",
            Level::Success => "ok",
            Level::Warning => "warning",
            Level::Error => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub message: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level.label(), self.message)
    }
}

pub struct Notifier {
    sink: Box<dyn Write + Send>,
    duration: Duration,
    current: Option<(Notification, Instant)>,
}

impl Notifier {
    pub fn new(sink: Box<dyn Write + Send>, duration: Duration) -> Self {
        Self {
            sink,
            duration,
            current: None,
        }
    }

    pub fn stderr(duration: Duration) -> Self {
        Self::new(Box::new(std::io::stderr()), duration)
    }

    /// Notifier that only logs and tracks the current notification.
    pub fn silent(duration: Duration) -> Self {
        Self::new(Box::new(std::io::sink()), duration)
    }

    pub fn notify(&mut self, level: Level, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
        };

        match level {
            Level::Info | Level::Success => tracing::info!(
                target: NOTIFICATION_TARGET,
                level = level.label(),
                "{}",
                notification.message
            ),
            Level::Warning => tracing::warn!(target: NOTIFICATION_TARGET, "{}", notification.message),
            Level::Error => tracing::error!(target: NOTIFICATION_TARGET, "{}", notification.message),
        }
        // Write failures on the sink are ignored.
        let _ = writeln!(self.sink, "{notification}");
        let _ = self.sink.flush();

        self.current = Some((notification, Instant::now()));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(Level::Info, message);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.notify(Level::Success, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.notify(Level::Warning, message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(Level::Error, message);
    }

    /// The latest notification, while it is still within its display duration.
    pub fn current(&self) -> Option<&Notification> {
        self.current
            .as_ref()
            .filter(|(_, shown_at)| shown_at.elapsed() < self.duration)
            .map(|(n, _)| n)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Cloneable in-memory sink for asserting on notifier output.
    #[derive(Clone, Default)]
    pub(crate) struct SharedBuffer(pub Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        pub(crate) fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn notify_writes_one_line_per_notification() {
        let buf = SharedBuffer::default();
        let mut notifier = Notifier::new(Box::new(buf.clone()), DEFAULT_NOTIFICATION_DURATION);

        notifier.success("Prompt enhanced successfully");
        notifier.warning("No text to copy");

        assert_eq!(
            buf.contents(),
            "[ok] Prompt enhanced successfully\n[warning] No text to copy\n"
        );
    }

    #[test]
    fn new_notification_replaces_current() {
        let mut notifier = Notifier::silent(DEFAULT_NOTIFICATION_DURATION);
        notifier.info("first");
        notifier.error("second");

        let current = notifier.current().expect("fresh notification is visible");
        assert_eq!(current.level, Level::Error);
        assert_eq!(current.message, "second");
    }

    #[test]
    fn notification_expires_after_duration() {
        let mut notifier = Notifier::silent(Duration::ZERO);
        notifier.info("gone");
        assert!(notifier.current().is_none());
    }
}
