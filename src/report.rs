use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a reported message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportLevel {
    Info,
    Error,
}

/// A single reported message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub level: ReportLevel,
    pub message: String,
}

/// Receives status and error messages while batches are applied
///
/// The coordinator and session never print; whatever implements this decides
/// where messages go
pub trait Reporter: Send + Sync {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

/// Sends every message to both reporters, first `A` then `B`
impl<A: Reporter, B: Reporter> Reporter for (A, B) {
    fn info(&self, message: &str) {
        self.0.info(message);
        self.1.info(message);
    }

    fn error(&self, message: &str) {
        self.0.error(message);
        self.1.error(message);
    }
}

/// Forwards messages to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn info(&self, message: &str) {
        tracing::info!(target: "line_edit::report", "{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!(target: "line_edit::report", "{message}");
    }
}

/// Discards every message
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// Keeps messages in memory, in the order they were reported
#[derive(Debug, Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<ReportEntry>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<ReportEntry> {
        self.entries.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries
            .lock()
            .iter()
            .map(|entry| entry.message.clone())
            .collect()
    }

    /// Drain recorded entries, leaving the reporter empty
    pub fn take(&self) -> Vec<ReportEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    fn push(&self, level: ReportLevel, message: &str) {
        self.entries.lock().push(ReportEntry {
            level,
            message: message.to_string(),
        });
    }
}

impl Reporter for RecordingReporter {
    fn info(&self, message: &str) {
        self.push(ReportLevel::Info, message);
    }

    fn error(&self, message: &str) {
        self.push(ReportLevel::Error, message);
    }
}

/// `[current/total]` prefix for per-operation messages
pub(crate) struct ProgressMarker {
    display: String,
}

impl ProgressMarker {
    pub(crate) fn new(current: usize, total: usize) -> Self {
        Self {
            display: format!("[{current}/{total}]"),
        }
    }

    pub(crate) fn annotate(&self, detail: &str) -> String {
        format!("{} {}", self.display, detail)
    }
}
