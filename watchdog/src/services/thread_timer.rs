//! Watchdog-thread enforcement strategy
//!
//! A registered `timeout-watchdog` thread waits on a condition variable for
//! either cancellation or the deadline. Expiry dumps state and terminates the
//! process; once started it cannot be cancelled.
//!
//! The same thread backs the signal strategy: armed as a backstop it only
//! escalates when a delivered alarm stays unserviced for a whole grace period.

use crate::error::WatchdogResult;
use crate::services::expiry::ExpiryContext;
use crate::services::threads;
use crate::traits::{CaptureManager, EnforcementStrategy, Terminator};
use shared::unit_debug;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Name under which the watchdog thread is registered
pub const WATCHDOG_THREAD_NAME: &str = "timeout-watchdog";

#[derive(Default)]
struct Cancellation {
    cancelled: Mutex<bool>,
    wake: Condvar,
}

impl Cancellation {
    /// Wait up to `timeout`; true when cancelled
    fn wait(&self, timeout: Duration) -> bool {
        let cancelled = self
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let (cancelled, _) = self
            .wake
            .wait_timeout_while(cancelled, timeout, |cancelled| !*cancelled)
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cancelled
    }

    fn cancel(&self) {
        let mut cancelled = self
            .cancelled
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *cancelled = true;
        self.wake.notify_all();
    }
}

/// What makes the watchdog thread give up on the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    /// The deadline itself
    Deadline,
    /// A `SIGALRM` that no interruption point picked up
    #[cfg(unix)]
    UnservicedAlarm,
}

/// Armed watchdog thread for one unit
pub struct ThreadTimer {
    cancellation: Arc<Cancellation>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadTimer {
    /// Spawn the watchdog thread for a deadline `after` from now
    pub fn arm(
        after: Duration,
        expiry: ExpiryContext,
        capture: Arc<dyn CaptureManager>,
        terminator: Arc<dyn Terminator>,
    ) -> WatchdogResult<Self> {
        unit_debug!(expiry.unit, "⏲️ Watchdog thread armed for {}s", expiry.deadline);
        Self::spawn(after, expiry, capture, terminator, Trigger::Deadline)
    }

    /// Spawn a backstop for a signal alarm due `after` from now
    ///
    /// Terminates the process once a delivered alarm has gone unserviced for
    /// a grace period while no debugger holds the owner.
    #[cfg(unix)]
    pub(crate) fn arm_backstop(
        after: Duration,
        expiry: ExpiryContext,
        capture: Arc<dyn CaptureManager>,
        terminator: Arc<dyn Terminator>,
    ) -> WatchdogResult<Self> {
        Self::spawn(after, expiry, capture, terminator, Trigger::UnservicedAlarm)
    }

    fn spawn(
        after: Duration,
        expiry: ExpiryContext,
        capture: Arc<dyn CaptureManager>,
        terminator: Arc<dyn Terminator>,
        trigger: Trigger,
    ) -> WatchdogResult<Self> {
        let cancellation = Arc::new(Cancellation::default());
        let watched = Arc::clone(&cancellation);

        let handle = threads::spawn_registered(WATCHDOG_THREAD_NAME, move || {
            if watch(&watched, after, &expiry, trigger) {
                expiry.report_and_terminate(capture.as_ref(), terminator.as_ref());
            }
        })?;

        Ok(Self {
            cancellation,
            handle: Some(handle),
        })
    }
}

/// Wait for the trigger; true when the unit must be terminated
#[cfg_attr(not(unix), allow(unused_variables))]
fn watch(
    cancellation: &Cancellation,
    after: Duration,
    expiry: &ExpiryContext,
    trigger: Trigger,
) -> bool {
    let mut wait = after;
    #[cfg(unix)]
    let mut last_seen: Option<u64> = None;
    loop {
        if cancellation.wait(wait) {
            return false;
        }
        wait = expiry.grace;

        #[cfg(unix)]
        {
            if trigger == Trigger::UnservicedAlarm {
                let pending = crate::interrupt::unserviced_alarm();
                let stale = pending.is_some() && pending == last_seen;
                last_seen = pending;
                if !stale {
                    continue;
                }
                unit_debug!(expiry.unit, "🚨 Alarm unserviced for {:?}", expiry.grace);
            }
        }

        if !expiry.owner_is_debugged() {
            return true;
        }
        unit_debug!(expiry.unit, "🐞 Debugger active, postponing expiry by {:?}", expiry.grace);
    }
}

impl EnforcementStrategy for ThreadTimer {
    fn disarm(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.cancellation.cancel();
        let _ = handle.join();
    }

    fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for ThreadTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
