//! Diagnostic stream and capture implementations

use crate::traits::{CaptureManager, CapturedOutput, DiagnosticStream};
use shared::UnitInfo;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Writes diagnostics to the process's standard error
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrStream;

impl DiagnosticStream for StderrStream {
    fn write_text(&self, text: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(text.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

/// Collects diagnostics in memory
#[derive(Debug, Default, Clone)]
pub struct BufferStream {
    buffer: Arc<Mutex<String>>,
}

impl BufferStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far
    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl DiagnosticStream for BufferStream {
    fn write_text(&self, text: &str) {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_str(text);
    }

    fn flush(&self) {}
}

/// Capture manager for hosts that do not capture output
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapture;

impl CaptureManager for NoCapture {
    fn suspend_global_capture(&self, _unit: &UnitInfo) -> CapturedOutput {
        CapturedOutput::default()
    }
}
