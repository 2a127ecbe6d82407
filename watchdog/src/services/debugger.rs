//! Debugger awareness
//!
//! Expiry is suppressed while an interactive debugger owns execution. Hosts
//! announce tracing code through trace hooks, and probes decide whether the
//! hook (or the process tracer) belongs to a debugger.

use crate::services::threads::{self, ThreadIdent};
use crate::traits::DebuggerProbe;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::debug;

/// Modules whose trace hooks identify an interactive debugger
pub const DEFAULT_DEBUGGER_MODULES: &[&str] =
    &["pdb", "bdb", "pydevd", "debugpy", "gdb", "lldb", "codelldb"];

/// Tracer process names recognised as debuggers
pub const DEFAULT_TRACER_NAMES: &[&str] =
    &["gdb", "lldb", "lldb-server", "rr", "rust-gdb", "rust-lldb"];

/// Tracing callback installed on a thread, identified by its owning module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceHook {
    pub owner_module: String,
}

impl TraceHook {
    pub fn new(owner_module: impl Into<String>) -> Self {
        Self {
            owner_module: owner_module.into(),
        }
    }
}

/// What a probe gets to look at for the interrupted thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeContext {
    pub hook: Option<TraceHook>,
}

fn hooks() -> MutexGuard<'static, HashMap<ThreadIdent, TraceHook>> {
    static HOOKS: OnceLock<Mutex<HashMap<ThreadIdent, TraceHook>>> = OnceLock::new();
    HOOKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Installed trace hook; restores the previous hook on drop
#[derive(Debug)]
pub struct TraceHookGuard {
    ident: ThreadIdent,
    previous: Option<TraceHook>,
}

impl Drop for TraceHookGuard {
    fn drop(&mut self) {
        let mut hooks = hooks();
        match self.previous.take() {
            Some(previous) => {
                hooks.insert(self.ident, previous);
            }
            None => {
                hooks.remove(&self.ident);
            }
        }
    }
}

/// Install a trace hook owned by `owner_module` on the calling thread
pub fn install_trace_hook(owner_module: &str) -> TraceHookGuard {
    let ident = threads::current_ident();
    let previous = hooks().insert(ident, TraceHook::new(owner_module));
    TraceHookGuard { ident, previous }
}

/// The trace hook installed on a thread, if any
pub fn trace_hook_of(ident: ThreadIdent) -> Option<TraceHook> {
    hooks().get(&ident).cloned()
}

/// Matches trace hooks owned by an allow-listed module or a submodule of one
#[derive(Debug, Clone)]
pub struct ModuleAllowList {
    modules: Vec<String>,
}

impl Default for ModuleAllowList {
    fn default() -> Self {
        Self::new(DEFAULT_DEBUGGER_MODULES.iter().copied())
    }
}

impl ModuleAllowList {
    pub fn new<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    fn allows(&self, module: &str) -> bool {
        self.modules.iter().any(|entry| {
            module == entry
                || module
                    .strip_prefix(entry.as_str())
                    .is_some_and(|rest| rest.starts_with("::") || rest.starts_with('.'))
        })
    }
}

impl DebuggerProbe for ModuleAllowList {
    fn name(&self) -> &'static str {
        "module-allow-list"
    }

    fn matches(&self, context: &ProbeContext) -> bool {
        context
            .hook
            .as_ref()
            .is_some_and(|hook| self.allows(&hook.owner_module))
    }
}

/// Matches when this process is being traced by a known debugger
#[cfg(target_os = "linux")]
#[derive(Debug, Clone)]
pub struct TracerProbe {
    tracers: Vec<String>,
}

#[cfg(target_os = "linux")]
impl Default for TracerProbe {
    fn default() -> Self {
        Self {
            tracers: DEFAULT_TRACER_NAMES.iter().map(|name| name.to_string()).collect(),
        }
    }
}

#[cfg(target_os = "linux")]
impl TracerProbe {
    /// Pid of the process tracing us, from `/proc/self/status`
    fn tracer_pid() -> Option<u32> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_tracer_pid(&status)
    }

    fn tracer_name(pid: u32) -> Option<String> {
        use sysinfo::{Pid, System};

        let pid = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_process(pid);
        system.process(pid).map(|process| process.name().to_string())
    }
}

#[cfg(target_os = "linux")]
impl DebuggerProbe for TracerProbe {
    fn name(&self) -> &'static str {
        "tracer"
    }

    fn matches(&self, _context: &ProbeContext) -> bool {
        let Some(pid) = Self::tracer_pid() else {
            return false;
        };
        match Self::tracer_name(pid) {
            Some(name) => self.tracers.iter().any(|tracer| *tracer == name),
            None => false,
        }
    }
}

/// Parse the `TracerPid:` field; zero means untraced
pub fn parse_tracer_pid(status: &str) -> Option<u32> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("TracerPid:"))
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|pid| *pid != 0)
}

/// Decides whether expiry should be suppressed for a debugged thread
pub struct DebuggerGuard {
    enabled: bool,
    probes: Vec<Box<dyn DebuggerProbe>>,
    entered: AtomicBool,
}

impl std::fmt::Debug for DebuggerGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebuggerGuard")
            .field("enabled", &self.enabled)
            .field(
                "probes",
                &self.probes.iter().map(|probe| probe.name()).collect::<Vec<_>>(),
            )
            .field("entered", &self.entered.load(Ordering::SeqCst))
            .finish()
    }
}

impl DebuggerGuard {
    /// Guard with the default probes for this platform
    pub fn new(enabled: bool) -> Self {
        Self::with_probes(enabled, default_probes())
    }

    pub fn with_probes(enabled: bool, probes: Vec<Box<dyn DebuggerProbe>>) -> Self {
        Self {
            enabled,
            probes,
            entered: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether a debugger owns the thread that installed `hook`
    pub fn is_debugging(&self, hook: Option<&TraceHook>) -> bool {
        if !self.enabled {
            return false;
        }
        if self.entered.load(Ordering::SeqCst) {
            debug!("🐞 Debugger session announced by host");
            return true;
        }
        let context = ProbeContext {
            hook: hook.cloned(),
        };
        match self.probes.iter().find(|probe| probe.matches(&context)) {
            Some(probe) => {
                debug!("🐞 Debugger detected by {} probe", probe.name());
                true
            }
            None => false,
        }
    }

    /// Same as [`is_debugging`](Self::is_debugging) for the hook installed on `ident`
    pub fn is_thread_debugged(&self, ident: ThreadIdent) -> bool {
        self.is_debugging(trace_hook_of(ident).as_ref())
    }

    /// Host notification that a debugger session started
    pub fn notify_entered(&self) {
        self.entered.store(true, Ordering::SeqCst);
    }

    /// Forget a previous debugger notification; called at every arm
    pub fn reset(&self) {
        self.entered.store(false, Ordering::SeqCst);
    }
}

/// Probes enabled by default
pub fn default_probes() -> Vec<Box<dyn DebuggerProbe>> {
    let mut probes: Vec<Box<dyn DebuggerProbe>> = vec![Box::new(ModuleAllowList::default())];
    #[cfg(target_os = "linux")]
    probes.push(Box::new(TracerProbe::default()));
    probes
}
