//! Service-specific tests
//!
//! Each service has its own test file. Tests that install process-wide signal
//! handlers take the shared serial lock first.

mod overrides;
mod snapshot;

// Common test utilities for services
pub mod common {
    use crate::core::banner::ReportFormatter;
    use crate::services::debugger::{DebuggerGuard, ModuleAllowList};
    use crate::services::expiry::ExpiryContext;
    use crate::services::streams::BufferStream;
    use crate::services::threads::{self, ThreadIdent};
    use shared::UnitInfo;
    use std::sync::mpsc::{self, Sender};
    use std::sync::{Arc, Mutex, MutexGuard};
    use std::thread::JoinHandle;
    use std::time::Duration;

    /// Short grace period so suppressed expiries re-fire quickly
    pub const TEST_GRACE: Duration = Duration::from_millis(50);

    /// Serialise tests that arm timers or install signal handlers
    pub fn serial() -> MutexGuard<'static, ()> {
        static SERIAL: Mutex<()> = Mutex::new(());
        SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Debugger guard that only looks at trace hooks
    pub fn hook_only_debugger() -> Arc<DebuggerGuard> {
        Arc::new(DebuggerGuard::with_probes(
            true,
            vec![Box::new(ModuleAllowList::default())],
        ))
    }

    /// Expiry context owned by the calling thread, writing into `stream`
    pub fn expiry_for(
        node_id: &str,
        deadline: f64,
        stream: &BufferStream,
        debugger: Arc<DebuggerGuard>,
    ) -> ExpiryContext {
        ExpiryContext {
            unit: UnitInfo::new(node_id),
            deadline,
            owner: threads::current_ident(),
            grace: TEST_GRACE,
            stream: Arc::new(stream.clone()),
            debugger,
            formatter: ReportFormatter::new().with_width(40),
        }
    }

    /// A registered helper thread parked until the returned sender fires
    pub fn park_helper(name: &str) -> (ThreadIdent, Sender<()>, JoinHandle<()>) {
        let (ident_tx, ident_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let handle = threads::spawn_registered(name, move || {
            ident_tx.send(threads::current_ident()).unwrap();
            let _ = release_rx.recv();
        })
        .unwrap();
        let ident = ident_rx.recv().unwrap();
        (ident, release_tx, handle)
    }
}
