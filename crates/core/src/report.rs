//! Error-report and user-message sinks.
//!
//! Handlers emit two kinds of output besides log lines: structured error
//! reports (a title and a message, kept for operators) and short inline
//! messages meant for the user who triggered the event. Both go through the
//! [`Reporter`] trait so the destination is chosen by the caller.

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Severity of an inline user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageLevel {
    Info,
    Alert,
}

/// Destination for error reports and inline messages.
pub trait Reporter {
    /// Record a structured error report.
    fn log_error(&self, title: &str, message: &str);

    /// Show a message to the user who triggered the event.
    fn message(&self, text: &str, level: MessageLevel);
}

impl<T: Reporter + ?Sized> Reporter for &T {
    fn log_error(&self, title: &str, message: &str) {
        (**self).log_error(title, message)
    }

    fn message(&self, text: &str, level: MessageLevel) {
        (**self).message(text, level)
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Sends everything to `tracing` and nowhere else.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn log_error(&self, title: &str, message: &str) {
        error!(title, "{}", message);
    }

    fn message(&self, text: &str, level: MessageLevel) {
        match level {
            MessageLevel::Info => info!("{}", text),
            MessageLevel::Alert => warn!("{}", text),
        }
    }
}

// ---------------------------------------------------------------------------
// Fan-out
// ---------------------------------------------------------------------------

/// Sends every report and message to both reporters, in order.
impl<A: Reporter, B: Reporter> Reporter for (A, B) {
    fn log_error(&self, title: &str, message: &str) {
        self.0.log_error(title, message);
        self.1.log_error(title, message);
    }

    fn message(&self, text: &str, level: MessageLevel) {
        self.0.message(text, level);
        self.1.message(text, level);
    }
}

// ---------------------------------------------------------------------------
// In-memory capture
// ---------------------------------------------------------------------------

/// A captured error report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub title: String,
    pub message: String,
}

/// A captured inline message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineMessage {
    pub text: String,
    pub level: MessageLevel,
}

/// Keeps every report and message in memory, for inspection afterwards.
/// Nothing is logged; pair it with [`TracingReporter`] for that.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    errors: Mutex<Vec<ErrorReport>>,
    messages: Mutex<Vec<InlineMessage>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<ErrorReport> {
        lock(&self.errors).clone()
    }

    pub fn messages(&self) -> Vec<InlineMessage> {
        lock(&self.messages).clone()
    }
}

impl Reporter for RecordingReporter {
    fn log_error(&self, title: &str, message: &str) {
        lock(&self.errors).push(ErrorReport {
            title: title.to_string(),
            message: message.to_string(),
        });
    }

    fn message(&self, text: &str, level: MessageLevel) {
        lock(&self.messages).push(InlineMessage {
            text: text.to_string(),
            level,
        });
    }
}
