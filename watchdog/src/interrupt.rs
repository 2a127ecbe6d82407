//! Interruption points for the signal strategy
//!
//! The `SIGALRM` handler only records that the alarm fired. The scheduling
//! thread acts on it in-band, at the next interruption point: an explicit
//! [`checkpoint`], a [`sleep`] (which wakes early when the alarm lands), or a
//! phase boundary in the host runner. An alarm nobody services within the
//! grace period is escalated by the signal timer's backstop thread.

use crate::error::WatchdogResult;
use std::time::Duration;

#[cfg(unix)]
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(unix)]
static ALARM_PENDING: AtomicBool = AtomicBool::new(false);

/// Number of alarms delivered so far
#[cfg(unix)]
static ALARM_COUNT: AtomicU64 = AtomicU64::new(0);

#[cfg(unix)]
pub(crate) extern "C" fn on_alarm(_signal: libc::c_int) {
    ALARM_COUNT.fetch_add(1, Ordering::SeqCst);
    ALARM_PENDING.store(true, Ordering::SeqCst);
}

/// Sequence number of the delivered alarm still waiting for a checkpoint
#[cfg(unix)]
pub(crate) fn unserviced_alarm() -> Option<u64> {
    let count = ALARM_COUNT.load(Ordering::SeqCst);
    ALARM_PENDING.load(Ordering::SeqCst).then_some(count)
}

#[cfg(unix)]
pub(crate) fn take_pending() -> bool {
    ALARM_PENDING.swap(false, Ordering::SeqCst)
}

#[cfg(unix)]
pub(crate) fn clear_pending() {
    ALARM_PENDING.store(false, Ordering::SeqCst);
}

/// Act on a delivered alarm, if the calling thread has one armed
///
/// Returns `Err(WatchdogError::Timeout)` once the unit's deadline has really
/// expired; a debugger-suppressed expiry re-arms and returns `Ok`.
pub fn checkpoint() -> WatchdogResult<()> {
    #[cfg(unix)]
    {
        crate::services::signal_timer::service_pending()
    }
    #[cfg(not(unix))]
    {
        Ok(())
    }
}

/// Sleep for `duration`, waking at the alarm to run a checkpoint
///
/// A suppressed expiry resumes the sleep for the time that was left.
#[cfg(unix)]
pub fn sleep(duration: Duration) -> WatchdogResult<()> {
    let mut remaining = duration;
    loop {
        checkpoint()?;
        if remaining.is_zero() {
            return Ok(());
        }

        let request = libc::timespec {
            tv_sec: remaining.as_secs() as libc::time_t,
            tv_nsec: remaining.subsec_nanos() as libc::c_long,
        };
        let mut left = libc::timespec {
            tv_sec: 0,
            tv_nsec: 0,
        };
        // SAFETY: both pointers refer to live stack values.
        let rc = unsafe { libc::nanosleep(&request, &mut left) };
        if rc == 0 {
            return checkpoint();
        }

        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err.into());
        }
        remaining = Duration::new(left.tv_sec.max(0) as u64, left.tv_nsec.max(0) as u32);
    }
}

/// Sleep for `duration`
#[cfg(not(unix))]
pub fn sleep(duration: Duration) -> WatchdogResult<()> {
    std::thread::sleep(duration);
    Ok(())
}
