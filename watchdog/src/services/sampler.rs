//! Cross-thread stack sampling
//!
//! Another thread's stack cannot be walked from outside, so the sampled thread
//! is sent `SIGUSR2` and walks its own stack inside the handler, storing raw
//! instruction pointers in a static buffer. The requesting thread waits for the
//! answer and resolves symbols itself.

use crate::services::threads::ThreadIdent;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// Deepest stack recorded per sample
pub const MAX_FRAMES: usize = 128;

/// How long a sampled thread has to answer
pub const SAMPLE_TIMEOUT: Duration = Duration::from_millis(250);

const SAMPLE_SIGNAL: Signal = Signal::SIGUSR2;

static FRAMES: [AtomicUsize; MAX_FRAMES] = [const { AtomicUsize::new(0) }; MAX_FRAMES];
static FRAME_COUNT: AtomicUsize = AtomicUsize::new(0);
static REQUESTED: AtomicU64 = AtomicU64::new(0);
static ANSWERED: AtomicU64 = AtomicU64::new(0);
static INSTALLED: Mutex<()> = Mutex::new(());

extern "C" fn on_sample(_signal: libc::c_int) {
    let request = REQUESTED.load(Ordering::SeqCst);
    let mut count = 0;
    // SAFETY: the walk only writes to preallocated atomics and never allocates.
    unsafe {
        backtrace::trace_unsynchronized(|frame| {
            if count >= MAX_FRAMES {
                return false;
            }
            FRAMES[count].store(frame.ip() as usize, Ordering::Relaxed);
            count += 1;
            true
        });
    }
    FRAME_COUNT.store(count, Ordering::SeqCst);
    ANSWERED.store(request, Ordering::SeqCst);
}

/// Installed sampling handler; the previous disposition returns on drop
///
/// Only one sampler exists at a time; `install` blocks until the current one
/// is dropped.
pub struct Sampler {
    prior: SigAction,
    _exclusive: MutexGuard<'static, ()>,
}

impl Sampler {
    pub fn install() -> nix::Result<Self> {
        let exclusive = INSTALLED
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let action = SigAction::new(
            SigHandler::Handler(on_sample),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler is async-signal-safe apart from the stack walk.
        let prior = unsafe { sigaction(SAMPLE_SIGNAL, &action)? };
        Ok(Self {
            prior,
            _exclusive: exclusive,
        })
    }

    /// Instruction pointers of `ident`'s stack, innermost first
    ///
    /// Returns `None` when the thread has exited or does not answer in time.
    pub fn sample(&self, ident: ThreadIdent, timeout: Duration) -> Option<Vec<usize>> {
        let request = REQUESTED.fetch_add(1, Ordering::SeqCst) + 1;

        // SAFETY: tgkill only targets a thread of this process.
        let rc = unsafe {
            libc::syscall(
                libc::SYS_tgkill,
                libc::getpid(),
                ident as libc::pid_t,
                SAMPLE_SIGNAL as libc::c_int,
            )
        };
        if rc != 0 {
            debug!("Thread {} vanished before sampling", ident);
            return None;
        }

        let started = Instant::now();
        while ANSWERED.load(Ordering::SeqCst) != request {
            if started.elapsed() > timeout {
                debug!("Thread {} did not answer the sample request", ident);
                return None;
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        let count = FRAME_COUNT.load(Ordering::SeqCst).min(MAX_FRAMES);
        let frames: Vec<usize> = FRAMES[..count]
            .iter()
            .map(|slot| slot.load(Ordering::Relaxed))
            .collect();

        // A late answer to an older request may have overwritten the buffer
        (ANSWERED.load(Ordering::SeqCst) == request).then_some(frames)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        // SAFETY: restores the disposition saved at install.
        let _ = unsafe { sigaction(SAMPLE_SIGNAL, &self.prior) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::threads::current_ident;
    use std::sync::mpsc;

    #[test]
    fn test_sample_parked_thread() {
        let (ident_tx, ident_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = std::thread::spawn(move || {
            ident_tx.send(current_ident()).unwrap();
            let _ = release_rx.recv();
        });
        let ident = ident_rx.recv().unwrap();

        let sampler = Sampler::install().unwrap();
        let frames = sampler.sample(ident, SAMPLE_TIMEOUT);
        drop(sampler);

        release_tx.send(()).unwrap();
        handle.join().unwrap();

        let frames = frames.expect("parked thread answers");
        assert!(!frames.is_empty());
        assert!(frames.len() <= MAX_FRAMES);
    }

    #[test]
    fn test_sample_missing_thread() {
        let sampler = Sampler::install().unwrap();
        assert_eq!(sampler.sample(u32::MAX as ThreadIdent - 1, SAMPLE_TIMEOUT), None);
    }
}
