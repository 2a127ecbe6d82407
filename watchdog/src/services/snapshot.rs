//! Stack snapshots of every live thread

use crate::core::banner::ReportFormatter;
use crate::services::threads::{self, ThreadIdent, UNKNOWN_THREAD};
use std::collections::HashMap;
use std::ffi::c_void;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Function names of frames belonging to the dump machinery itself
const INTERNAL_FRAMES: &[&str] = &[
    "backtrace::",
    "watchdog::services::sampler::",
    "watchdog::services::snapshot::",
    "__restore_rt",
];

static DUMP_LOCK: Mutex<()> = Mutex::new(());

/// One resolved stack frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: Option<PathBuf>,
    pub line: Option<u32>,
}

impl Frame {
    fn is_internal(&self) -> bool {
        INTERNAL_FRAMES
            .iter()
            .any(|marker| self.function.contains(marker))
    }
}

/// A thread's identity and its frames, oldest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSnapshot {
    pub ident: ThreadIdent,
    pub name: String,
    pub frames: Vec<Frame>,
}

impl ThreadSnapshot {
    pub fn title(&self) -> String {
        format!("Stack of {} ({})", self.name, self.ident)
    }
}

/// Source lines read while rendering, keyed by file
#[derive(Default)]
struct SourceCache {
    files: HashMap<PathBuf, Option<Vec<String>>>,
}

impl SourceCache {
    fn line(&mut self, file: &Path, line: u32) -> Option<String> {
        let lines = self.files.entry(file.to_path_buf()).or_insert_with(|| {
            std::fs::read_to_string(file)
                .ok()
                .map(|text| text.lines().map(str::to_string).collect())
        });
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        lines
            .as_ref()?
            .get(index)
            .map(|source| source.trim().to_string())
            .filter(|source| !source.is_empty())
    }
}

/// Render frames the way a traceback reads: oldest call first
pub fn render_frames(frames: &[Frame]) -> String {
    let mut cache = SourceCache::default();
    let mut text = String::new();
    for frame in frames {
        match (&frame.file, frame.line) {
            (Some(file), Some(line)) => {
                let _ = writeln!(
                    text,
                    "  File \"{}\", line {}, in {}",
                    file.display(),
                    line,
                    frame.function
                );
                if let Some(source) = cache.line(file, line) {
                    let _ = writeln!(text, "    {source}");
                }
            }
            _ => {
                let _ = writeln!(text, "  File \"<unknown>\", line ?, in {}", frame.function);
            }
        }
    }
    text
}

/// Resolve raw instruction pointers (innermost first) into frames (oldest first)
pub fn resolve_frames(ips: &[usize]) -> Vec<Frame> {
    let mut frames = Vec::new();
    for (depth, ip) in ips.iter().enumerate() {
        // Return addresses point past the call; step back into it
        let address = if depth == 0 { *ip } else { ip.saturating_sub(1) };
        let mut resolved = false;
        backtrace::resolve(address as *mut c_void, |symbol| {
            resolved = true;
            frames.push(Frame {
                function: symbol
                    .name()
                    .map(|name| format!("{name:#}"))
                    .unwrap_or_else(|| "<unknown>".to_string()),
                file: symbol.filename().map(Path::to_path_buf),
                line: symbol.lineno(),
            });
        });
        if !resolved {
            frames.push(Frame {
                function: format!("{address:#x}"),
                file: None,
                line: None,
            });
        }
    }
    frames.retain(|frame| !frame.is_internal());
    frames.reverse();
    frames
}

/// Walk the calling thread's own stack
fn capture_current() -> Vec<usize> {
    let mut ips = Vec::new();
    backtrace::trace(|frame| {
        ips.push(frame.ip() as usize);
        true
    });
    ips
}

/// Enumerates live threads and renders their stacks
#[derive(Debug, Clone, Copy)]
pub struct StackSnapshotter {
    formatter: ReportFormatter,
}

impl StackSnapshotter {
    pub fn new(formatter: ReportFormatter) -> Self {
        Self { formatter }
    }

    /// Snapshot every live thread except `exclude`
    ///
    /// The watchdog's own threads are never shown.
    /// Threads that vanish, do not answer or yield no frames are skipped.
    /// Never fails; only one snapshot runs at a time.
    pub fn snapshot(&self, exclude: Option<ThreadIdent>) -> Vec<ThreadSnapshot> {
        let _exclusive = DUMP_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let current = threads::current_ident();
        let targets: Vec<ThreadIdent> = threads::unit_threads()
            .into_iter()
            .filter(|ident| Some(*ident) != exclude)
            .collect();

        let mut sampled = self.sample_all(&targets, current);
        let mut snapshots = Vec::new();
        for ident in targets {
            let ips = if ident == current {
                capture_current()
            } else {
                match sampled.remove(&ident) {
                    Some(ips) => ips,
                    None => continue,
                }
            };
            let frames = resolve_frames(&ips);
            if frames.is_empty() {
                debug!("Thread {} yielded no frames", ident);
                continue;
            }
            snapshots.push(ThreadSnapshot {
                ident,
                name: threads::name_of(ident).unwrap_or_else(|| UNKNOWN_THREAD.to_string()),
                frames,
            });
        }
        snapshots
    }

    #[cfg(target_os = "linux")]
    fn sample_all(
        &self,
        targets: &[ThreadIdent],
        current: ThreadIdent,
    ) -> HashMap<ThreadIdent, Vec<usize>> {
        use crate::services::sampler::{SAMPLE_TIMEOUT, Sampler};

        let mut sampled = HashMap::new();
        let sampler = match Sampler::install() {
            Ok(sampler) => sampler,
            Err(err) => {
                debug!("Stack sampler unavailable: {}", err);
                return sampled;
            }
        };
        for ident in targets.iter().copied().filter(|ident| *ident != current) {
            if let Some(ips) = sampler.sample(ident, SAMPLE_TIMEOUT) {
                sampled.insert(ident, ips);
            }
        }
        sampled
    }

    #[cfg(not(target_os = "linux"))]
    fn sample_all(
        &self,
        _targets: &[ThreadIdent],
        _current: ThreadIdent,
    ) -> HashMap<ThreadIdent, Vec<usize>> {
        HashMap::new()
    }

    /// Render a dump of every live thread except `exclude`
    pub fn dump(&self, exclude: Option<ThreadIdent>) -> String {
        self.snapshot(exclude)
            .iter()
            .map(|snapshot| {
                self.formatter
                    .section(&snapshot.title(), &render_frames(&snapshot.frames))
            })
            .collect()
    }
}
