//! Outbound user-facing messages.
//!
//! The session engine reports progress through a [`NotificationSink`].
//! Sending is fire-and-forget: a sink that fails logs the failure itself
//! and the engine never retries.

pub mod content;

use std::io::Write;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use crate::types::NotifyTarget;

/// Delivers text to a notify target.
pub trait NotificationSink: Send + Sync {
    /// Sends `text` to `target`. Never fails from the caller's view.
    fn send(&self, target: &NotifyTarget, text: &str);
}

// ============================================================================
// ConsoleSink
// ============================================================================

#[derive(Serialize)]
struct ConsoleLine<'a> {
    target: &'a NotifyTarget,
    text: &'a str,
}

/// Prints messages to stdout, as plain text or JSON lines.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    /// Renders one output line.
    #[must_use]
    pub fn render(&self, target: &NotifyTarget, text: &str) -> String {
        if self.json {
            match serde_json::to_string(&ConsoleLine { target, text }) {
                Ok(line) => line,
                Err(e) => {
                    warn!("Failed to serialize message: {}", e);
                    format!("[{target}] {text}")
                }
            }
        } else {
            format!("[{target}] {text}")
        }
    }
}

impl NotificationSink for ConsoleSink {
    fn send(&self, target: &NotifyTarget, text: &str) {
        let line = self.render(target, text);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = writeln!(stdout, "{line}") {
            warn!("Failed to deliver message to {}: {}", target, e);
        }
    }
}

// ============================================================================
// MockNotificationSink
// ============================================================================

/// Recording sink for tests.
#[derive(Debug, Default)]
pub struct MockNotificationSink {
    messages: Mutex<Vec<(NotifyTarget, String)>>,
    should_fail: std::sync::atomic::AtomicBool,
}

impl MockNotificationSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every message while set, as an unreachable chat service would.
    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail
            .store(should_fail, std::sync::atomic::Ordering::SeqCst);
    }

    #[must_use]
    pub fn messages(&self) -> Vec<(NotifyTarget, String)> {
        self.messages.lock().clone()
    }

    /// Message texts, in delivery order.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    /// Number of messages containing `needle`.
    #[must_use]
    pub fn count_containing(&self, needle: &str) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|(_, text)| text.contains(needle))
            .count()
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn clear_recorded(&self) {
        self.messages.lock().clear();
    }
}

impl NotificationSink for MockNotificationSink {
    fn send(&self, target: &NotifyTarget, text: &str) {
        if self.should_fail.load(std::sync::atomic::Ordering::SeqCst) {
            warn!("Failed to deliver message to {}: Mock failure", target);
            return;
        }
        self.messages.lock().push((target.clone(), text.to_string()));
    }
}
