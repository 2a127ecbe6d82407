//! Service implementations
//!
//! This module contains the parts of the watchdog that touch the OS: thread
//! enumeration and sampling, signal and thread timers, debugger probes and
//! the real diagnostic streams.

pub mod debugger;
pub mod expiry;
pub mod overrides;
#[cfg(target_os = "linux")]
pub mod sampler;
#[cfg(unix)]
pub mod signal_timer;
pub mod snapshot;
pub mod streams;
pub mod thread_timer;
pub mod threads;

#[cfg(test)]
pub(crate) mod tests;

// Re-export all service implementations
pub use debugger::{
    DebuggerGuard, ModuleAllowList, ProbeContext, TraceHook, TraceHookGuard, install_trace_hook,
};
pub use expiry::{ExpiryContext, ProcessTerminator};
pub use overrides::TimerOverrides;
#[cfg(unix)]
pub use signal_timer::SignalTimer;
pub use snapshot::{Frame, StackSnapshotter, ThreadSnapshot};
pub use streams::{BufferStream, NoCapture, StderrStream};
pub use thread_timer::{ThreadTimer, WATCHDOG_THREAD_NAME};
pub use threads::ThreadIdent;
