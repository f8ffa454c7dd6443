//! Diagnostics sink
//!
//! Failures that never reach the query path (unreadable lists, bad
//! downloads, checksum mismatches) are reported here so the embedding
//! application can show them.

use std::fmt;

use log::Level;
use parking_lot::Mutex;

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// A list could not be read or has no format marker.
    Load,
    /// A list download failed.
    Download,
    /// A downloaded list did not match its checksum.
    Checksum,
    /// A downloaded list could not be persisted.
    Write,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Load => "load",
            Self::Download => "download",
            Self::Checksum => "checksum",
            Self::Write => "write",
        };
        f.write_str(name)
    }
}

/// One leveled, categorized message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub category: DiagnosticCategory,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            category,
            message: message.into(),
        }
    }

    pub fn warn(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warn,
            category,
            message: message.into(),
        }
    }
}

/// Receiver of diagnostics.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: Diagnostic) {
        log::log!(
            target: "bw_profiles::diagnostics",
            diagnostic.level,
            "[{}] {}",
            diagnostic.category,
            diagnostic.message
        );
    }
}

/// Keeps diagnostics in memory, and logs them too.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything reported so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries.lock().clone()
    }

    /// Drain everything reported so far.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Whether a diagnostic of the given category was reported.
    pub fn has(&self, category: DiagnosticCategory) -> bool {
        self.entries.lock().iter().any(|entry| entry.category == category)
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: Diagnostic) {
        LogSink.report(diagnostic.clone());
        self.entries.lock().push(diagnostic);
    }
}
