//! Run-wide session deadline
//!
//! The session clock is cooperative: it is only consulted between units, so
//! the unit running when the deadline passes always finishes with its real
//! outcome. The worst-case overrun is therefore the deadline plus one unit.

use crate::traits::DiagnosticStream;
use shared::SessionSettings;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Lifecycle of the session clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running { started: Instant },
    Expired,
}

/// What the scheduler should do after a unit completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionVerdict {
    Continue,
    Stop,
}

#[derive(Debug, Clone)]
pub struct SessionDeadline {
    deadline: Option<f64>,
    limit: Option<Duration>,
    state: SessionState,
}

impl SessionDeadline {
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            deadline: settings.deadline,
            limit: settings.duration(),
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_configured(&self) -> bool {
        self.limit.is_some()
    }

    pub fn is_expired(&self) -> bool {
        self.state == SessionState::Expired
    }

    /// Start the clock; no-op without a deadline or when already started
    pub fn start(&mut self) {
        self.start_at(Instant::now());
    }

    pub fn start_at(&mut self, now: Instant) {
        if self.limit.is_some() && self.state == SessionState::Idle {
            debug!("⏱️ Session clock started");
            self.state = SessionState::Running { started: now };
        }
    }

    /// Check the clock after a unit completes
    pub fn check(&mut self, stream: &dyn DiagnosticStream) -> SessionVerdict {
        self.check_at(Instant::now(), stream)
    }

    /// Check the clock as of `now`
    ///
    /// The transition to `Expired` happens once and writes a single notice
    /// line; every later check keeps returning `Stop`.
    pub fn check_at(&mut self, now: Instant, stream: &dyn DiagnosticStream) -> SessionVerdict {
        match self.state {
            SessionState::Idle => SessionVerdict::Continue,
            SessionState::Expired => SessionVerdict::Stop,
            SessionState::Running { started } => {
                let Some(limit) = self.limit else {
                    return SessionVerdict::Continue;
                };
                if now.saturating_duration_since(started) <= limit {
                    return SessionVerdict::Continue;
                }

                self.state = SessionState::Expired;
                let deadline = self.deadline.unwrap_or_default();
                warn!("⏰ Session deadline of {}s exceeded", deadline);
                stream.write_text(&format!("!! session-timeout: {deadline}s exceeded !!!\n"));
                stream.flush();
                SessionVerdict::Stop
            }
        }
    }
}
