//! Deadline watchdog for units of work run by a host test runner
//!
//! This library resolves per-unit timeout settings from layered sources,
//! arms one of two enforcement strategies around each unit (an in-band alarm
//! observed at interruption points, or an out-of-band watchdog thread that
//! terminates the process), dumps the stacks of all live threads on expiry
//! and tracks a run-wide session deadline.

pub mod core;
pub mod error;
pub mod interrupt;
pub mod services;
pub mod traits;
pub mod watchdog;

// Re-export commonly used types
pub use crate::core::{
    GlobalSettings, LayerValues, LayeredSources, ReportFormatter, SessionDeadline, SessionState,
    SessionVerdict, SettingsResolver,
};
pub use error::{WatchdogError, WatchdogResult};
pub use interrupt::{checkpoint, sleep};
pub use services::{
    DebuggerGuard, ModuleAllowList, StackSnapshotter, ThreadIdent, TimerOverrides, TraceHook,
    install_trace_hook,
};
pub use traits::{
    CaptureManager, CapturedOutput, DebuggerProbe, DiagnosticStream, EnforcementStrategy,
    Terminator, TimerOverride,
};
pub use crate::watchdog::{ArmPoint, TimerGuard, Watchdog, WatchdogBuilder};
