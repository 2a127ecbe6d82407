//! Test helpers for building watchdogs with observable collaborators

use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard};
use watchdog::services::{BufferStream, NoCapture};
use watchdog::traits::MockTerminator;
use watchdog::{LayeredSources, ModuleAllowList, Watchdog};

/// Serialise tests that arm signal timers
pub fn serial() -> MutexGuard<'static, ()> {
    static SERIAL: Mutex<()> = Mutex::new(());
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A watchdog whose diagnostics land in memory and whose terminations are reported
pub struct WatchdogHarness {
    pub watchdog: Watchdog,
    pub stream: BufferStream,
    pub terminations: mpsc::Receiver<i32>,
}

impl WatchdogHarness {
    pub fn new(sources: LayeredSources) -> Self {
        let (tx, rx) = mpsc::channel();
        let tx = Mutex::new(tx);
        let mut terminator = MockTerminator::new();
        terminator.expect_terminate().returning(move |code| {
            let _ = tx.lock().unwrap().send(code);
        });

        let stream = BufferStream::new();
        let watchdog = Watchdog::builder()
            .with_sources(sources)
            .with_stream(Arc::new(stream.clone()))
            .with_capture(Arc::new(NoCapture))
            .with_terminator(Arc::new(terminator))
            .with_debugger_probes(vec![Box::new(ModuleAllowList::default())])
            .with_width(60)
            .with_grace_period(std::time::Duration::from_millis(50))
            .build()
            .unwrap();

        Self {
            watchdog,
            stream,
            terminations: rx,
        }
    }
}

/// Assertion helpers
pub struct TestHelpers;

impl TestHelpers {
    /// Assert that `text` contains every fragment, in order
    pub fn assert_in_order(text: &str, fragments: &[&str]) {
        let mut rest = text;
        for fragment in fragments {
            match rest.find(fragment) {
                Some(index) => rest = &rest[index + fragment.len()..],
                None => panic!("missing {fragment:?} (in order) in:\n{text}"),
            }
        }
    }
}
