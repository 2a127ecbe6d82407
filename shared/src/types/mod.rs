//! Core types used throughout the watchdog system

mod marker;

pub use marker::{Marker, MarkerChain};

use crate::errors::{SettingsError, SharedResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Environment variable supplying the per-unit deadline
pub const ENV_TIMEOUT_VAR: &str = "WATCHDOG_TIMEOUT";

/// Whether this platform can deliver an alarm interrupt to the scheduling thread
pub const HAVE_SIGNAL_TIMER: bool = cfg!(unix);

/// Enforcement mechanism for a unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutMethod {
    /// In-band alarm delivered to the scheduling thread
    Signal,
    /// Out-of-band watchdog thread that terminates the process
    Thread,
}

impl TimeoutMethod {
    /// Signal where the platform supports it, Thread otherwise
    pub fn platform_default() -> Self {
        if HAVE_SIGNAL_TIMER {
            TimeoutMethod::Signal
        } else {
            TimeoutMethod::Thread
        }
    }

    /// Validate a method value coming from a configuration layer
    pub fn from_value(value: &SettingValue, layer: ConfigLayer) -> SharedResult<Self> {
        let parsed = match value {
            SettingValue::Text(text) => text.parse::<TimeoutMethod>().ok(),
            _ => None,
        };
        match parsed {
            Some(TimeoutMethod::Signal) if !HAVE_SIGNAL_TIMER => {
                Err(SettingsError::value("method", value, layer))
            }
            Some(method) => Ok(method),
            None => Err(SettingsError::value("method", value, layer)),
        }
    }
}

impl fmt::Display for TimeoutMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeoutMethod::Signal => write!(f, "signal"),
            TimeoutMethod::Thread => write!(f, "thread"),
        }
    }
}

impl std::str::FromStr for TimeoutMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signal" => Ok(TimeoutMethod::Signal),
            "thread" => Ok(TimeoutMethod::Thread),
            _ => Err(format!("Unknown timeout method: {s}")),
        }
    }
}

/// Which phases of a unit of work the deadline covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeoutScope {
    /// Clock runs from fixture setup through teardown
    #[default]
    WholeUnit,
    /// Clock runs only around the unit's body
    CoreOnly,
}

impl TimeoutScope {
    pub fn from_func_only(func_only: bool) -> Self {
        if func_only {
            TimeoutScope::CoreOnly
        } else {
            TimeoutScope::WholeUnit
        }
    }

    pub fn is_func_only(&self) -> bool {
        matches!(self, TimeoutScope::CoreOnly)
    }
}

/// Source layer a setting was read from, named in validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigLayer {
    Marker,
    EnclosingMarker,
    CommandLine,
    Environment,
    ConfigFile,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLayer::Marker => write!(f, "marker"),
            ConfigLayer::EnclosingMarker => write!(f, "enclosing marker"),
            ConfigLayer::CommandLine => write!(f, "command line"),
            ConfigLayer::Environment => write!(f, "{ENV_TIMEOUT_VAR} environment variable"),
            ConfigLayer::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Dynamically typed setting as it arrives from a marker or config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Flag(bool),
    Number(f64),
    Text(String),
}

impl SettingValue {
    /// Interpret as a deadline in seconds
    pub fn as_seconds(&self, layer: ConfigLayer) -> SharedResult<f64> {
        match self {
            SettingValue::Number(n) => Ok(*n),
            SettingValue::Text(text) => text
                .trim()
                .parse::<f64>()
                .map_err(|_| SettingsError::value("timeout", self, layer)),
            SettingValue::Flag(_) => Err(SettingsError::value("timeout", self, layer)),
        }
    }

    /// Interpret as a boolean flag
    pub fn as_flag(&self, field: &'static str, layer: ConfigLayer) -> SharedResult<bool> {
        match self {
            SettingValue::Flag(flag) => Ok(*flag),
            SettingValue::Text(text) => match text.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Ok(true),
                "false" | "no" | "off" | "0" => Ok(false),
                _ => Err(SettingsError::value(field, self, layer)),
            },
            SettingValue::Number(_) => Err(SettingsError::value(field, self, layer)),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Flag(flag) => write!(f, "{flag}"),
            SettingValue::Number(n) => write!(f, "{n}"),
            SettingValue::Text(text) => write!(f, "{text}"),
        }
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Number(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Number(value as f64)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Flag(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Text(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Text(value)
    }
}

/// Effective enforcement for one unit of work
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeoutSettings {
    pub deadline: Option<f64>,
    pub method: TimeoutMethod,
    pub scope: TimeoutScope,
}

impl TimeoutSettings {
    /// Settings that never arm a timer
    pub fn disabled() -> Self {
        Self {
            deadline: None,
            method: TimeoutMethod::platform_default(),
            scope: TimeoutScope::WholeUnit,
        }
    }

    /// The deadline as a duration, if it should be enforced at all
    pub fn duration(&self) -> Option<Duration> {
        match self.deadline {
            Some(seconds) if seconds > 0.0 => Duration::try_from_secs_f64(seconds).ok(),
            _ => None,
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.duration().is_some()
    }
}

/// Run-wide deadline configuration
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SessionSettings {
    pub deadline: Option<f64>,
}

impl SessionSettings {
    pub fn duration(&self) -> Option<Duration> {
        match self.deadline {
            Some(seconds) if seconds > 0.0 => Duration::try_from_secs_f64(seconds).ok(),
            _ => None,
        }
    }
}

/// Identity of a unit of work as seen by the watchdog
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnitInfo {
    /// Fully qualified node id, e.g. `suite::group::test_name`
    pub node_id: String,
    pub markers: MarkerChain,
}

impl UnitInfo {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            markers: MarkerChain::default(),
        }
    }

    pub fn with_markers(mut self, markers: MarkerChain) -> Self {
        self.markers = markers;
        self
    }
}

impl fmt::Display for UnitInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.node_id)
    }
}
