//! Per-unit output capture
//!
//! While a unit runs, file descriptors 1 and 2 point at anonymous temporary
//! files. The watchdog thread may suspend capture from another thread right
//! before it terminates the process, so the active redirection sits behind a
//! mutex.

use shared::UnitInfo;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use watchdog::{CaptureManager, CapturedOutput};

#[cfg(unix)]
mod redirect {
    use nix::unistd::{close, dup, dup2};
    use std::fs::File;
    use std::io::{self, Read, Seek, SeekFrom};
    use std::os::fd::{AsRawFd, RawFd};

    /// One descriptor pointed at a temporary file
    pub struct Redirect {
        target: RawFd,
        saved: RawFd,
        file: File,
    }

    impl Redirect {
        pub fn start(target: RawFd) -> io::Result<Self> {
            let file = tempfile::tempfile()?;
            let saved = dup(target)?;
            if let Err(err) = dup2(file.as_raw_fd(), target) {
                let _ = close(saved);
                return Err(err.into());
            }
            Ok(Self {
                target,
                saved,
                file,
            })
        }

        /// Restore the descriptor and return what was written meanwhile
        pub fn finish(mut self) -> String {
            let _ = dup2(self.saved, self.target);
            let _ = close(self.saved);

            let mut bytes = Vec::new();
            if self.file.seek(SeekFrom::Start(0)).is_ok() {
                let _ = self.file.read_to_end(&mut bytes);
            }
            String::from_utf8_lossy(&bytes).into_owned()
        }
    }

    pub const STDOUT: RawFd = 1;
    pub const STDERR: RawFd = 2;
}

#[cfg(not(unix))]
mod redirect {
    use std::io;

    /// Capture is not available here; output passes through
    pub struct Redirect;

    impl Redirect {
        pub fn start(_target: i32) -> io::Result<Self> {
            Ok(Self)
        }

        pub fn finish(self) -> String {
            String::new()
        }
    }

    pub const STDOUT: i32 = 1;
    pub const STDERR: i32 = 2;
}

use redirect::Redirect;

struct ActiveCapture {
    node_id: String,
    stdout: Redirect,
    stderr: Redirect,
}

/// Captures unit output at the file-descriptor level
pub struct FdCapture {
    enabled: bool,
    active: Mutex<Option<ActiveCapture>>,
}

impl FdCapture {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            active: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveCapture>> {
        self.active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Begin capturing for `unit`; a capture still active is finished first
    pub fn start(&self, unit: &UnitInfo) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let mut active = self.active();
        if let Some(previous) = active.take() {
            finish(previous);
        }

        flush_std();
        let stdout = Redirect::start(redirect::STDOUT)?;
        let stderr = match Redirect::start(redirect::STDERR) {
            Ok(stderr) => stderr,
            Err(err) => {
                stdout.finish();
                return Err(err);
            }
        };
        *active = Some(ActiveCapture {
            node_id: unit.node_id.clone(),
            stdout,
            stderr,
        });
        Ok(())
    }

    /// Stop capturing and return the output; empty when nothing was active
    pub fn stop(&self) -> CapturedOutput {
        self.active().take().map(finish).unwrap_or_default()
    }
}

fn flush_std() {
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();
}

fn finish(capture: ActiveCapture) -> CapturedOutput {
    flush_std();
    CapturedOutput {
        stdout: capture.stdout.finish(),
        stderr: capture.stderr.finish(),
    }
}

impl CaptureManager for FdCapture {
    fn suspend_global_capture(&self, unit: &UnitInfo) -> CapturedOutput {
        let Some(capture) = self.active().take() else {
            return CapturedOutput::default();
        };
        if capture.node_id != unit.node_id {
            debug!(
                "Capture belongs to {}, suspending for {}",
                capture.node_id, unit.node_id
            );
        }
        finish(capture)
    }
}
