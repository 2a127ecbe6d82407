//! Watchdog facade
//!
//! Ties settings resolution, override providers and the two enforcement
//! strategies together behind scoped guards. The host runner builds one
//! `Watchdog` per run and asks it for a [`TimerGuard`] at each arm point.

use crate::core::{
    GlobalSettings, LayeredSources, ReportFormatter, SessionDeadline, SettingsResolver,
};
use crate::error::WatchdogResult;
use crate::services::debugger::{DebuggerGuard, default_probes};
use crate::services::expiry::{ExpiryContext, ProcessTerminator};
use crate::services::overrides::TimerOverrides;
use crate::services::snapshot::StackSnapshotter;
use crate::services::streams::{NoCapture, StderrStream};
use crate::services::thread_timer::ThreadTimer;
use crate::services::threads::{self, Registration};
use crate::traits::{
    CaptureManager, DebuggerProbe, DiagnosticStream, EnforcementStrategy, Terminator,
    TimerOverride,
};
use shared::{TimeoutMethod, TimeoutScope, TimeoutSettings, UnitInfo, unit_debug};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::info;

/// Re-check interval while a debugger holds an expired unit
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Where in a unit's lifecycle a guard is requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmPoint {
    /// Around the whole unit, setup through teardown
    Protocol,
    /// Around the unit's body only
    Call,
}

impl ArmPoint {
    /// Whether a unit with `scope` is clocked at this arm point
    pub fn covers(&self, scope: TimeoutScope) -> bool {
        matches!(
            (self, scope),
            (ArmPoint::Protocol, TimeoutScope::WholeUnit) | (ArmPoint::Call, TimeoutScope::CoreOnly)
        )
    }
}

enum GuardState {
    Inert,
    Overridden {
        unit: UnitInfo,
        overrides: TimerOverrides,
    },
    Builtin(Box<dyn EnforcementStrategy>),
    Disarmed,
}

/// Scoped deadline for one unit; disarms when dropped
pub struct TimerGuard {
    state: GuardState,
}

impl TimerGuard {
    /// A guard that enforces nothing
    pub fn inert() -> Self {
        Self {
            state: GuardState::Inert,
        }
    }

    pub fn is_armed(&self) -> bool {
        match &self.state {
            GuardState::Overridden { .. } => true,
            GuardState::Builtin(strategy) => strategy.is_armed(),
            GuardState::Inert | GuardState::Disarmed => false,
        }
    }

    pub fn is_overridden(&self) -> bool {
        matches!(self.state, GuardState::Overridden { .. })
    }

    /// Disarm now; later calls and the drop are no-ops
    pub fn disarm(&mut self) {
        match std::mem::replace(&mut self.state, GuardState::Disarmed) {
            GuardState::Overridden { unit, overrides } => {
                overrides.try_cancel_timer(&unit);
            }
            GuardState::Builtin(mut strategy) => strategy.disarm(),
            GuardState::Inert | GuardState::Disarmed => {}
        }
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.disarm();
    }
}

/// Builder for [`Watchdog`]
pub struct WatchdogBuilder {
    sources: LayeredSources,
    stream: Arc<dyn DiagnosticStream>,
    capture: Arc<dyn CaptureManager>,
    terminator: Arc<dyn Terminator>,
    probes: Option<Vec<Box<dyn DebuggerProbe>>>,
    overrides: TimerOverrides,
    width: Option<usize>,
    grace: Duration,
}

impl Default for WatchdogBuilder {
    fn default() -> Self {
        Self {
            sources: LayeredSources::default(),
            stream: Arc::new(StderrStream),
            capture: Arc::new(NoCapture),
            terminator: Arc::new(ProcessTerminator),
            probes: None,
            overrides: TimerOverrides::new(),
            width: None,
            grace: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl WatchdogBuilder {
    pub fn with_sources(mut self, sources: LayeredSources) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_stream(mut self, stream: Arc<dyn DiagnosticStream>) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_capture(mut self, capture: Arc<dyn CaptureManager>) -> Self {
        self.capture = capture;
        self
    }

    pub fn with_terminator(mut self, terminator: Arc<dyn Terminator>) -> Self {
        self.terminator = terminator;
        self
    }

    /// Replace the default debugger probes
    pub fn with_debugger_probes(mut self, probes: Vec<Box<dyn DebuggerProbe>>) -> Self {
        self.probes = Some(probes);
        self
    }

    /// Register an override provider after any already registered
    pub fn with_override(mut self, provider: Arc<dyn TimerOverride>) -> Self {
        self.overrides.register(provider);
        self
    }

    /// Fixed banner width instead of the terminal's
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Resolve the global layers and build the watchdog
    pub fn build(self) -> WatchdogResult<Watchdog> {
        let global = GlobalSettings::resolve(&self.sources)?;
        let formatter = match self.width {
            Some(width) => ReportFormatter::new().with_width(width),
            None => ReportFormatter::new(),
        };
        let probes = self.probes.unwrap_or_else(default_probes);

        info!(
            "🐕 Watchdog ready (default method: {}, debugger detection: {})",
            global.method, global.debugger_detection
        );

        Ok(Watchdog {
            resolver: SettingsResolver::new(global),
            stream: self.stream,
            capture: self.capture,
            terminator: self.terminator,
            debugger: Arc::new(DebuggerGuard::with_probes(global.debugger_detection, probes)),
            overrides: self.overrides,
            formatter,
            grace: self.grace,
        })
    }
}

/// Deadline enforcement for one run
pub struct Watchdog {
    resolver: SettingsResolver,
    stream: Arc<dyn DiagnosticStream>,
    capture: Arc<dyn CaptureManager>,
    terminator: Arc<dyn Terminator>,
    debugger: Arc<DebuggerGuard>,
    overrides: TimerOverrides,
    formatter: ReportFormatter,
    grace: Duration,
}

impl Watchdog {
    pub fn builder() -> WatchdogBuilder {
        WatchdogBuilder::default()
    }

    pub fn global(&self) -> &GlobalSettings {
        self.resolver.global()
    }

    /// Effective settings for `unit`
    pub fn resolve(&self, unit: &UnitInfo) -> WatchdogResult<TimeoutSettings> {
        Ok(self.resolver.resolve(unit)?)
    }

    /// Guard for `unit` at `point`; inert unless the settings are enforced
    /// and their scope is clocked at this point
    pub fn arm_for(
        &self,
        point: ArmPoint,
        unit: &UnitInfo,
        settings: &TimeoutSettings,
    ) -> WatchdogResult<TimerGuard> {
        if !point.covers(settings.scope) {
            return Ok(TimerGuard::inert());
        }
        self.arm(unit, settings)
    }

    /// Arm a deadline for `unit` on the calling thread
    pub fn arm(&self, unit: &UnitInfo, settings: &TimeoutSettings) -> WatchdogResult<TimerGuard> {
        let Some(after) = settings.duration() else {
            return Ok(TimerGuard::inert());
        };
        self.debugger.reset();

        if self.overrides.try_set_timer(unit, settings) {
            return Ok(TimerGuard {
                state: GuardState::Overridden {
                    unit: unit.clone(),
                    overrides: self.overrides.clone(),
                },
            });
        }

        let expiry = ExpiryContext {
            unit: unit.clone(),
            deadline: settings.deadline.unwrap_or_default(),
            owner: threads::current_ident(),
            grace: self.grace,
            stream: Arc::clone(&self.stream),
            debugger: Arc::clone(&self.debugger),
            formatter: self.formatter,
        };

        let strategy: Box<dyn EnforcementStrategy> = match settings.method {
            TimeoutMethod::Signal => self.arm_signal(after, expiry)?,
            TimeoutMethod::Thread => Box::new(ThreadTimer::arm(
                after,
                expiry,
                Arc::clone(&self.capture),
                Arc::clone(&self.terminator),
            )?),
        };
        unit_debug!(unit, "🛡️ Deadline armed with {} method", settings.method);

        Ok(TimerGuard {
            state: GuardState::Builtin(strategy),
        })
    }

    #[cfg(unix)]
    fn arm_signal(
        &self,
        after: Duration,
        expiry: ExpiryContext,
    ) -> WatchdogResult<Box<dyn EnforcementStrategy>> {
        Ok(Box::new(crate::services::signal_timer::SignalTimer::arm(
            after,
            expiry,
            Arc::clone(&self.capture),
            Arc::clone(&self.terminator),
        )?))
    }

    #[cfg(not(unix))]
    fn arm_signal(
        &self,
        _after: Duration,
        _expiry: ExpiryContext,
    ) -> WatchdogResult<Box<dyn EnforcementStrategy>> {
        Err(crate::error::WatchdogError::SignalUnavailable)
    }

    /// Session clock for this run, not yet started
    pub fn session(&self) -> SessionDeadline {
        SessionDeadline::new(self.global().session)
    }

    pub fn debugger(&self) -> &DebuggerGuard {
        &self.debugger
    }

    pub fn stream(&self) -> Arc<dyn DiagnosticStream> {
        Arc::clone(&self.stream)
    }

    pub fn formatter(&self) -> ReportFormatter {
        self.formatter
    }

    pub fn snapshotter(&self) -> StackSnapshotter {
        StackSnapshotter::new(self.formatter)
    }

    /// Lines for the run header
    pub fn report_header(&self) -> Vec<String> {
        self.global().report_header()
    }

    /// Name the calling thread in stack dumps while the registration lives
    pub fn register_current_thread(&self, name: &str) -> Registration {
        threads::register_current(name)
    }

    /// Spawn a thread that is named in stack dumps
    pub fn spawn_registered<F, T>(&self, name: &str, body: F) -> std::io::Result<JoinHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        threads::spawn_registered(name, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::MockTimerOverride;

    fn settings(deadline: Option<f64>, method: TimeoutMethod, scope: TimeoutScope) -> TimeoutSettings {
        TimeoutSettings {
            deadline,
            method,
            scope,
        }
    }

    #[test]
    fn test_arm_point_coverage() {
        assert!(ArmPoint::Protocol.covers(TimeoutScope::WholeUnit));
        assert!(!ArmPoint::Protocol.covers(TimeoutScope::CoreOnly));
        assert!(ArmPoint::Call.covers(TimeoutScope::CoreOnly));
        assert!(!ArmPoint::Call.covers(TimeoutScope::WholeUnit));
    }

    #[test]
    fn test_unenforced_settings_give_inert_guard() {
        let watchdog = Watchdog::builder().build().unwrap();
        let unit = UnitInfo::new("suite::test_plain");

        for deadline in [None, Some(0.0), Some(-3.0)] {
            let guard = watchdog
                .arm_for(
                    ArmPoint::Protocol,
                    &unit,
                    &settings(deadline, TimeoutMethod::Thread, TimeoutScope::WholeUnit),
                )
                .unwrap();
            assert!(!guard.is_armed());
        }
    }

    #[test]
    fn test_scope_mismatch_gives_inert_guard() {
        let watchdog = Watchdog::builder().build().unwrap();
        let unit = UnitInfo::new("suite::test_scoped");
        let guard = watchdog
            .arm_for(
                ArmPoint::Protocol,
                &unit,
                &settings(Some(5.0), TimeoutMethod::Thread, TimeoutScope::CoreOnly),
            )
            .unwrap();
        assert!(!guard.is_armed());
    }

    #[test]
    fn test_override_takes_arm_and_cancel() {
        let mut provider = MockTimerOverride::new();
        provider.expect_try_set_timer().times(1).return_const(true);
        provider.expect_try_cancel_timer().times(1).return_const(true);

        let watchdog = Watchdog::builder()
            .with_override(Arc::new(provider))
            .build()
            .unwrap();
        let unit = UnitInfo::new("suite::test_overridden");
        let mut guard = watchdog
            .arm(
                &unit,
                &settings(Some(5.0), TimeoutMethod::Thread, TimeoutScope::WholeUnit),
            )
            .unwrap();
        assert!(guard.is_overridden());
        guard.disarm();
        guard.disarm();
        assert!(!guard.is_armed());
    }

    #[test]
    fn test_invalid_global_layer_fails_build() {
        let sources = LayeredSources::default().with_environment(Some("never".to_string()));
        let err = Watchdog::builder().with_sources(sources).build().err().unwrap();
        assert_eq!(err.kind(), "ConfigValueError");
    }
}
