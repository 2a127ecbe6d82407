//! Expiry sequences shared by both enforcement strategies

use crate::core::banner::ReportFormatter;
use crate::error::WatchdogError;
use crate::services::debugger::DebuggerGuard;
use crate::services::snapshot::StackSnapshotter;
use crate::services::threads::{self, ThreadIdent};
use crate::traits::{CaptureManager, DiagnosticStream, Terminator};
use shared::{UnitInfo, unit_warn};
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// Exit status used when the watchdog thread terminates the process
pub const TIMEOUT_EXIT_CODE: i32 = 1;

/// Everything an expiry handler needs to report on one armed unit
#[derive(Clone)]
pub struct ExpiryContext {
    pub unit: UnitInfo,
    pub deadline: f64,
    /// Thread that scheduled the unit and whose debugger state matters
    pub owner: ThreadIdent,
    pub grace: Duration,
    pub stream: Arc<dyn DiagnosticStream>,
    pub debugger: Arc<DebuggerGuard>,
    pub formatter: ReportFormatter,
}

impl ExpiryContext {
    fn snapshotter(&self) -> StackSnapshotter {
        StackSnapshotter::new(self.formatter)
    }

    /// Whether a debugger currently owns the scheduling thread
    pub fn owner_is_debugged(&self) -> bool {
        self.debugger.is_thread_debugged(self.owner)
    }

    /// In-band expiry: dump the other threads and produce the unit's failure
    ///
    /// Banners are only written when there is another thread to show; the
    /// watchdog's own threads do not count.
    pub fn report_interrupt(&self) -> WatchdogError {
        unit_warn!(self.unit, "⏰ Deadline of {}s exceeded, interrupting", self.deadline);

        let current = threads::current_ident();
        let other_threads = threads::unit_threads().len() > 1;
        if other_threads {
            self.stream.write_text(&self.formatter.timeout_banner());
        }
        self.stream.write_text(&self.snapshotter().dump(Some(current)));
        if other_threads {
            self.stream.write_text(&self.formatter.timeout_banner());
        }
        self.stream.flush();

        WatchdogError::Timeout {
            deadline: self.deadline,
        }
    }

    /// Out-of-band expiry: report captured output and stacks, then terminate
    ///
    /// A panic while reporting is written to the stream; the flush and the
    /// termination always happen.
    pub fn report_and_terminate(&self, capture: &dyn CaptureManager, terminator: &dyn Terminator) {
        unit_warn!(self.unit, "⏰ Deadline of {}s exceeded, terminating", self.deadline);

        let reported = panic::catch_unwind(AssertUnwindSafe(|| self.write_thread_report(capture)));
        if let Err(payload) = reported {
            self.stream.write_text(&format!(
                "Exception while reporting timeout: {}\n",
                panic_message(payload.as_ref())
            ));
        }

        self.stream.flush();
        let _ = std::io::stdout().flush();
        let _ = std::io::stderr().flush();
        terminator.terminate(TIMEOUT_EXIT_CODE);
    }

    fn write_thread_report(&self, capture: &dyn CaptureManager) {
        let captured = capture.suspend_global_capture(&self.unit);

        self.stream.write_text(&self.formatter.timeout_banner());
        if !captured.stdout.is_empty() {
            self.stream
                .write_text(&self.formatter.section("Captured stdout", &captured.stdout));
        }
        if !captured.stderr.is_empty() {
            self.stream
                .write_text(&self.formatter.section("Captured stderr", &captured.stderr));
        }
        self.stream
            .write_text(&self.snapshotter().dump(Some(threads::current_ident())));
        self.stream.write_text(&self.formatter.timeout_banner());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Terminates with `_exit`, skipping unwinding and exit handlers
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessTerminator;

impl Terminator for ProcessTerminator {
    fn terminate(&self, code: i32) {
        // SAFETY: `_exit` never returns and touches no Rust state.
        unsafe { libc::_exit(code) }
    }
}
