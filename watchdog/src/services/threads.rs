//! Thread identities and the name registry used in stack dumps

use crate::services::thread_timer::WATCHDOG_THREAD_NAME;
use std::collections::HashMap;
use std::io;
use std::sync::{Mutex, MutexGuard, OnceLock};
use std::thread::{self, JoinHandle};

/// OS-level identity of a thread as printed in dump titles
pub type ThreadIdent = u64;

/// Name shown for threads nobody registered
pub const UNKNOWN_THREAD: &str = "<unknown>";

fn registry() -> MutexGuard<'static, HashMap<ThreadIdent, String>> {
    static REGISTRY: OnceLock<Mutex<HashMap<ThreadIdent, String>>> = OnceLock::new();
    REGISTRY
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Identity of the calling thread
#[cfg(target_os = "linux")]
pub fn current_ident() -> ThreadIdent {
    nix::unistd::gettid().as_raw() as ThreadIdent
}

/// Identity of the calling thread
#[cfg(not(target_os = "linux"))]
pub fn current_ident() -> ThreadIdent {
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT: AtomicU64 = AtomicU64::new(1);
    thread_local! {
        static IDENT: ThreadIdent = NEXT.fetch_add(1, Ordering::Relaxed);
    }
    IDENT.with(|ident| *ident)
}

/// Registration of the calling thread; unregisters on drop
#[derive(Debug)]
pub struct Registration {
    ident: ThreadIdent,
}

impl Registration {
    pub fn ident(&self) -> ThreadIdent {
        self.ident
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        registry().remove(&self.ident);
    }
}

/// Register the calling thread under `name`
pub fn register_current(name: &str) -> Registration {
    let ident = current_ident();
    registry().insert(ident, name.to_string());
    Registration { ident }
}

/// Registered name of a thread, if any
pub fn name_of(ident: ThreadIdent) -> Option<String> {
    registry().get(&ident).cloned()
}

/// Spawn a named thread that is registered for the whole of its run
pub fn spawn_registered<F, T>(name: &str, body: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let thread_name = name.to_string();
    thread::Builder::new()
        .name(thread_name.clone())
        .spawn(move || {
            let _registration = register_current(&thread_name);
            body()
        })
}

/// Every live thread of the process, sorted by identity
#[cfg(target_os = "linux")]
pub fn live_threads() -> Vec<ThreadIdent> {
    let mut idents: Vec<ThreadIdent> = match std::fs::read_dir("/proc/self/task") {
        Ok(entries) => entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().to_str()?.parse().ok())
            .collect(),
        Err(_) => vec![current_ident()],
    };
    idents.sort_unstable();
    idents
}

/// Every thread known to the registry plus the caller, sorted by identity
#[cfg(not(target_os = "linux"))]
pub fn live_threads() -> Vec<ThreadIdent> {
    let mut idents: Vec<ThreadIdent> = registry().keys().copied().collect();
    let current = current_ident();
    if !idents.contains(&current) {
        idents.push(current);
    }
    idents.sort_unstable();
    idents
}

/// Whether `ident` is one of the watchdog's own threads
pub fn is_watchdog_thread(ident: ThreadIdent) -> bool {
    name_of(ident).as_deref() == Some(WATCHDOG_THREAD_NAME)
}

/// Live threads minus the watchdog's own, sorted by identity
pub fn unit_threads() -> Vec<ThreadIdent> {
    live_threads()
        .into_iter()
        .filter(|ident| !is_watchdog_thread(*ident))
        .collect()
}
