//! Timeout annotations attached to units of work and their enclosing groups

use super::SettingValue;

/// A `timeout` annotation as written on a unit or group
///
/// Arguments are kept exactly as supplied; shape and value validation happen
/// when settings are resolved so that errors surface per unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Marker {
    pub args: Vec<SettingValue>,
    pub kwargs: Vec<(String, SettingValue)>,
}

impl Marker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marker with a single positional deadline
    pub fn deadline(seconds: impl Into<SettingValue>) -> Self {
        Self::new().arg(seconds)
    }

    pub fn arg(mut self, value: impl Into<SettingValue>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        self.kwargs.push((name.into(), value.into()));
        self
    }

    /// Look up a named argument
    pub fn get(&self, name: &str) -> Option<&SettingValue> {
        self.kwargs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }
}

/// The annotation chain for one unit: its own marker, then enclosing group
/// markers ordered nearest first
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MarkerChain {
    pub own: Option<Marker>,
    pub enclosing: Vec<Marker>,
}

impl MarkerChain {
    pub fn with_own(mut self, marker: Marker) -> Self {
        self.own = Some(marker);
        self
    }

    /// Append a group marker further out than any already present
    pub fn with_enclosing(mut self, marker: Marker) -> Self {
        self.enclosing.push(marker);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.own.is_none() && self.enclosing.is_empty()
    }
}
