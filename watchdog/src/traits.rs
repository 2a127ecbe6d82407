//! Trait definitions with mockall annotations for testing
//!
//! These are the narrow interfaces through which the watchdog talks to its
//! host runner: where diagnostics go, how output capture is suspended, how
//! the process is terminated, how debuggers are recognised and how an
//! external collaborator can take over arming and disarming.

use crate::services::debugger::ProbeContext;
use shared::{TimeoutSettings, UnitInfo};

/// Output captured for a unit up to the moment capture was suspended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Destination for timeout banners, stack dumps and session notices
#[mockall::automock]
pub trait DiagnosticStream: Send + Sync {
    /// Write text verbatim
    fn write_text(&self, text: &str);

    /// Flush anything buffered
    fn flush(&self);
}

/// An armed deadline for one unit
///
/// Implementations disarm on drop; `disarm` is idempotent and safe whether
/// or not the deadline fired.
pub trait EnforcementStrategy {
    fn disarm(&mut self);

    fn is_armed(&self) -> bool;
}

/// Output capture owned by the host runner
///
/// Only the watchdog thread calls this, right before dumping state and
/// terminating the process.
#[mockall::automock]
pub trait CaptureManager: Send + Sync {
    /// Stop capturing globally and return what was captured for `unit`
    fn suspend_global_capture(&self, unit: &UnitInfo) -> CapturedOutput;
}

/// Process termination without unwinding or exit handlers
#[mockall::automock]
pub trait Terminator: Send + Sync {
    fn terminate(&self, code: i32);
}

/// Predicate deciding whether an interactive debugger owns execution
#[mockall::automock]
pub trait DebuggerProbe: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether the probe recognises a debugger on the interrupted thread
    fn matches(&self, context: &ProbeContext) -> bool;
}

/// External override of how the timer is armed and disarmed
///
/// Both hooks default to declining. The first registered provider that
/// returns `true` takes responsibility and the built-in strategy is skipped.
#[mockall::automock]
pub trait TimerOverride: Send + Sync {
    fn try_set_timer(&self, _unit: &UnitInfo, _settings: &TimeoutSettings) -> bool {
        false
    }

    fn try_cancel_timer(&self, _unit: &UnitInfo) -> bool {
        false
    }
}
