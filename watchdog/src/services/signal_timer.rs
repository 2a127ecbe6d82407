//! Signal enforcement strategy
//!
//! Arms a one-shot `SIGALRM` aimed at the scheduling thread. On Linux this is
//! a per-thread POSIX timer (`SIGEV_THREAD_ID`); other unix platforms fall
//! back to `setitimer(ITIMER_REAL)`. Expiry is handled in-band by
//! [`service_pending`] at the next interruption point. A unit that never
//! reaches one (blocked in a call, spinning) is caught by a backstop
//! watchdog thread, which dumps and terminates like the thread strategy.

use crate::error::{WatchdogError, WatchdogResult};
use crate::interrupt;
use crate::services::expiry::ExpiryContext;
use crate::services::thread_timer::ThreadTimer;
use crate::traits::{CaptureManager, EnforcementStrategy, Terminator};
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use shared::unit_debug;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set while any thread of the process holds an armed signal timer
static SIGNAL_OWNED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static ARMED: RefCell<Option<ArmedAlarm>> = const { RefCell::new(None) };
}

struct ArmedAlarm {
    clock: AlarmClock,
    prior: SigAction,
    expiry: ExpiryContext,
    backstop: Option<ThreadTimer>,
}

/// Per-thread POSIX timer delivering `SIGALRM` to the arming thread
#[cfg(target_os = "linux")]
struct AlarmClock {
    timer: nix::sys::timer::Timer,
}

#[cfg(target_os = "linux")]
impl AlarmClock {
    fn start(after: Duration) -> WatchdogResult<Self> {
        use nix::sys::signal::{SigEvent, SigevNotify};
        use nix::sys::timer::Timer;
        use nix::time::ClockId;

        let event = SigEvent::new(SigevNotify::SigevThreadId {
            signal: Signal::SIGALRM,
            thread_id: nix::unistd::gettid().as_raw(),
            si_value: 0,
        });
        let mut clock = Self {
            timer: Timer::new(ClockId::CLOCK_MONOTONIC, event)?,
        };
        clock.restart(after)?;
        Ok(clock)
    }

    /// Schedule the next delivery `after` from now, replacing any pending one
    fn restart(&mut self, after: Duration) -> WatchdogResult<()> {
        use nix::sys::time::TimeSpec;
        use nix::sys::timer::{Expiration, TimerSetTimeFlags};

        self.timer.set(
            Expiration::OneShot(TimeSpec::from(after)),
            TimerSetTimeFlags::empty(),
        )?;
        Ok(())
    }
}

/// Process-wide interval timer; the only alarm source outside Linux
#[cfg(not(target_os = "linux"))]
struct AlarmClock;

#[cfg(not(target_os = "linux"))]
impl AlarmClock {
    fn start(after: Duration) -> WatchdogResult<Self> {
        Self::set(after)?;
        Ok(Self)
    }

    /// Schedule the next delivery `after` from now, replacing any pending one
    fn restart(&mut self, after: Duration) -> WatchdogResult<()> {
        Self::set(after)?;
        Ok(())
    }

    fn set(after: Duration) -> std::io::Result<()> {
        let value = libc::itimerval {
            it_interval: libc::timeval {
                tv_sec: 0,
                tv_usec: 0,
            },
            it_value: libc::timeval {
                tv_sec: after.as_secs() as libc::time_t,
                tv_usec: after.subsec_micros() as libc::suseconds_t,
            },
        };
        // SAFETY: `value` outlives the call and the old value is not requested.
        let rc = unsafe { libc::setitimer(libc::ITIMER_REAL, &value, std::ptr::null_mut()) };
        if rc == 0 {
            Ok(())
        } else {
            Err(std::io::Error::last_os_error())
        }
    }
}

#[cfg(not(target_os = "linux"))]
impl Drop for AlarmClock {
    fn drop(&mut self) {
        let _ = Self::set(Duration::ZERO);
    }
}

/// Armed `SIGALRM` deadline for the calling thread
///
/// Not `Send`: only the thread that armed it may disarm it.
#[derive(Debug)]
pub struct SignalTimer {
    armed: bool,
    _not_send: PhantomData<*const ()>,
}

impl SignalTimer {
    /// Install the alarm handler and schedule delivery after `after`
    ///
    /// `capture` and `terminator` serve the backstop, which ends the process
    /// when the alarm is never serviced.
    pub fn arm(
        after: Duration,
        expiry: ExpiryContext,
        capture: Arc<dyn CaptureManager>,
        terminator: Arc<dyn Terminator>,
    ) -> WatchdogResult<Self> {
        if SIGNAL_OWNED
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(WatchdogError::AlreadyArmed);
        }
        interrupt::clear_pending();

        let action = SigAction::new(
            SigHandler::Handler(interrupt::on_alarm),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic.
        let prior = match unsafe { sigaction(Signal::SIGALRM, &action) } {
            Ok(prior) => prior,
            Err(err) => {
                SIGNAL_OWNED.store(false, Ordering::SeqCst);
                return Err(err.into());
            }
        };

        let clock = match AlarmClock::start(after) {
            Ok(clock) => clock,
            Err(err) => {
                // SAFETY: restores the disposition saved above.
                let _ = unsafe { sigaction(Signal::SIGALRM, &prior) };
                SIGNAL_OWNED.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        let backstop = match ThreadTimer::arm_backstop(after, expiry.clone(), capture, terminator)
        {
            Ok(backstop) => backstop,
            Err(err) => {
                drop(clock);
                // SAFETY: restores the disposition saved above.
                let _ = unsafe { sigaction(Signal::SIGALRM, &prior) };
                SIGNAL_OWNED.store(false, Ordering::SeqCst);
                return Err(err);
            }
        };

        unit_debug!(expiry.unit, "⏲️ Signal timer armed for {}s", expiry.deadline);
        ARMED.with(|slot| {
            *slot.borrow_mut() = Some(ArmedAlarm {
                clock,
                prior,
                expiry,
                backstop: Some(backstop),
            })
        });

        Ok(Self {
            armed: true,
            _not_send: PhantomData,
        })
    }
}

impl EnforcementStrategy for SignalTimer {
    fn disarm(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;

        if let Some(alarm) = ARMED.with(|slot| slot.borrow_mut().take()) {
            let ArmedAlarm {
                clock,
                prior,
                expiry,
                backstop,
            } = alarm;
            drop(backstop);
            // Stop delivery before the handler goes away
            drop(clock);
            // SAFETY: restores the disposition saved at arm.
            let _ = unsafe { sigaction(Signal::SIGALRM, &prior) };
            unit_debug!(expiry.unit, "⏲️ Signal timer disarmed");
        }
        interrupt::clear_pending();
        SIGNAL_OWNED.store(false, Ordering::SeqCst);
    }

    fn is_armed(&self) -> bool {
        self.armed
    }
}

impl Drop for SignalTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Act on a delivered alarm for the calling thread
///
/// No-op when this thread has nothing armed or the alarm has not fired.
pub(crate) fn service_pending() -> WatchdogResult<()> {
    let expiry = ARMED.with(|slot| slot.borrow().as_ref().map(|alarm| alarm.expiry.clone()));
    let Some(expiry) = expiry else {
        return Ok(());
    };
    if !interrupt::take_pending() {
        return Ok(());
    }

    if expiry.owner_is_debugged() {
        unit_debug!(expiry.unit, "🐞 Debugger active, postponing expiry by {:?}", expiry.grace);
        return ARMED.with(|slot| match slot.borrow_mut().as_mut() {
            Some(alarm) => alarm.clock.restart(expiry.grace),
            None => Ok(()),
        });
    }

    // Serviced in-band: the backstop has nothing left to escalate
    let backstop = ARMED.with(|slot| {
        slot.borrow_mut()
            .as_mut()
            .and_then(|alarm| alarm.backstop.take())
    });
    drop(backstop);

    Err(expiry.report_interrupt())
}
