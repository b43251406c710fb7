//! Diagnostics.
//!
//! Problems that do not stop a render, such as an undefined reference or a division by zero,
//!     are reported to a [Diagnostics] sink and rendering continues.

use log::Level;
use parking_lot::Mutex;

/// A problem found while rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    /// Name of the template being rendered.
    pub template: String,
    pub line: u32,
    pub column: u32,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}:{}: {}",
            self.template, self.line, self.column, self.message
        )
    }
}

/// Receives diagnostics.
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to the [log] crate under the target `weft::render`.
#[derive(Debug, Default)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(&self, diagnostic: &Diagnostic) {
        log::log!(target: "weft::render", diagnostic.level, "{diagnostic}");
    }
}

/// Keeps diagnostics in memory.
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    records: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.records.lock())
    }

    pub fn messages(&self) -> Vec<String> {
        self.records
            .lock()
            .iter()
            .map(|d| d.message.clone())
            .collect()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, diagnostic: &Diagnostic) {
        self.records.lock().push(diagnostic.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_keeps_reports_in_order() {
        let sink = RecordingDiagnostics::default();
        for message in ["a", "b"] {
            sink.report(&Diagnostic {
                level: Level::Debug,
                template: "t".into(),
                line: 1,
                column: 2,
                message: message.into(),
            });
        }
        assert_eq!(sink.messages(), vec!["a", "b"]);
        let taken = sink.take();
        assert_eq!(taken[1].to_string(), "t:1:2: b");
        assert!(sink.messages().is_empty());
    }
}
