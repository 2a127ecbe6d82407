//! Watchdog-specific error types

use shared::SettingsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchdogError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The unit overran its deadline and was interrupted
    #[error("Timeout >{deadline}s")]
    Timeout { deadline: f64 },

    #[error("A signal timer is already armed in this process")]
    AlreadyArmed,

    #[error("Signal timers are not available on this platform")]
    SignalUnavailable,

    #[cfg(unix)]
    #[error("OS call failed: {0}")]
    Os(#[from] nix::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WatchdogError {
    /// Failure kind as shown in the runner's failure report
    pub fn kind(&self) -> &'static str {
        match self {
            WatchdogError::Settings(err) => err.kind(),
            WatchdogError::Timeout { .. } => "Failed",
            _ => "Error",
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, WatchdogError::Timeout { .. })
    }
}

pub type WatchdogResult<T> = Result<T, WatchdogError>;
