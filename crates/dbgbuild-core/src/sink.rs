//! Destination for build output shown to the user.

use std::sync::Mutex;

use tracing::info;

/// Receives live build output. Passed explicitly into each operation.
pub trait OutputSink: Send + Sync {
    /// Rendered compiler diagnostics and plain-text stdout lines, verbatim.
    fn diagnostic(&self, text: &str);

    /// Raw stderr bytes from the build tool.
    fn stderr(&self, chunk: &[u8]);

    /// Engine notes such as candidate artifact listings.
    fn note(&self, text: &str) {
        info!("{}", text);
    }
}

/// Routes everything through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl OutputSink for TracingSink {
    fn diagnostic(&self, text: &str) {
        info!(target: "dbgbuild::diagnostic", "{}", text.trim_end());
    }

    fn stderr(&self, chunk: &[u8]) {
        info!(target: "dbgbuild::stderr", "{}", String::from_utf8_lossy(chunk).trim_end());
    }
}

/// Keeps everything in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    diagnostics: Mutex<Vec<String>>,
    stderr: Mutex<Vec<u8>>,
    notes: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn stderr_text(&self) -> String {
        let bytes = self.stderr.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl OutputSink for RecordingSink {
    fn diagnostic(&self, text: &str) {
        self.diagnostics
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
    }

    fn stderr(&self, chunk: &[u8]) {
        self.stderr
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(chunk);
    }

    fn note(&self, text: &str) {
        self.notes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(text.to_string());
    }
}
