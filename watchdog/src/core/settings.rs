//! Timeout settings resolution
//!
//! Settings for a unit are merged field by field from, highest first: the
//! unit's own marker, the nearest enclosing group marker that sets the field,
//! the command line, the `WATCHDOG_TIMEOUT` environment variable (deadline
//! only), the config file and finally the built-in defaults.

use shared::{
    ConfigLayer, Marker, SessionSettings, SettingValue, SettingsError, SharedResult,
    TimeoutMethod, TimeoutScope, TimeoutSettings, UnitInfo,
};

/// Marker fields as written, not yet interpreted
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedMarker {
    pub timeout: Option<SettingValue>,
    pub method: Option<SettingValue>,
    pub func_only: Option<SettingValue>,
}

/// Split a marker into its fields, rejecting malformed shapes
pub fn parse_marker(marker: &Marker) -> SharedResult<ParsedMarker> {
    if marker.is_empty() {
        return Err(SettingsError::shape(
            "Timeout marker must have at least one argument",
        ));
    }

    let mut parsed = ParsedMarker::default();
    for (name, value) in &marker.kwargs {
        match name.as_str() {
            "timeout" => parsed.timeout = Some(value.clone()),
            "method" => parsed.method = Some(value.clone()),
            "func_only" => parsed.func_only = Some(value.clone()),
            other => {
                return Err(SettingsError::shape(format!(
                    "Invalid keyword argument for timeout marker: {other}"
                )));
            }
        }
    }

    if let Some(first) = marker.args.first() {
        if parsed.timeout.is_some() {
            return Err(SettingsError::shape(
                "Multiple values for timeout argument of timeout marker",
            ));
        }
        parsed.timeout = Some(first.clone());
    }
    if let Some(second) = marker.args.get(1) {
        if parsed.method.is_some() {
            return Err(SettingsError::shape(
                "Multiple values for method argument of timeout marker",
            ));
        }
        parsed.method = Some(second.clone());
    }
    if marker.args.len() > 2 {
        return Err(SettingsError::shape("Too many arguments for timeout marker"));
    }

    Ok(parsed)
}

/// Marker fields after validation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct MarkerFields {
    deadline: Option<f64>,
    method: Option<TimeoutMethod>,
    func_only: Option<bool>,
}

impl MarkerFields {
    fn from_marker(marker: &Marker, layer: ConfigLayer) -> SharedResult<Self> {
        let parsed = parse_marker(marker)?;
        Ok(Self {
            deadline: parsed
                .timeout
                .map(|value| value.as_seconds(layer))
                .transpose()?,
            method: parsed
                .method
                .map(|value| TimeoutMethod::from_value(&value, layer))
                .transpose()?,
            func_only: parsed
                .func_only
                .map(|value| value.as_flag("func_only", layer))
                .transpose()?,
        })
    }
}

/// Raw values supplied by one non-marker layer
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayerValues {
    pub timeout: Option<SettingValue>,
    pub method: Option<SettingValue>,
    pub func_only: Option<SettingValue>,
    pub session_timeout: Option<SettingValue>,
    pub disable_debugger_detection: Option<SettingValue>,
}

/// Every non-marker source, as handed over by the host runner
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LayeredSources {
    pub command_line: LayerValues,
    /// Raw `WATCHDOG_TIMEOUT` value; an empty value counts as unset
    pub environment: Option<String>,
    pub config_file: LayerValues,
}

impl LayeredSources {
    pub fn with_command_line(mut self, values: LayerValues) -> Self {
        self.command_line = values;
        self
    }

    pub fn with_environment(mut self, value: Option<String>) -> Self {
        self.environment = value;
        self
    }

    pub fn with_config_file(mut self, values: LayerValues) -> Self {
        self.config_file = values;
        self
    }
}

/// Settings resolved once at startup from the non-marker layers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlobalSettings {
    pub deadline: Option<f64>,
    pub method: TimeoutMethod,
    pub func_only: bool,
    pub session: SessionSettings,
    pub debugger_detection: bool,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            deadline: None,
            method: TimeoutMethod::platform_default(),
            func_only: false,
            session: SessionSettings::default(),
            debugger_detection: true,
        }
    }
}

impl GlobalSettings {
    /// Resolve the command line, environment and config file layers
    ///
    /// Only the layer that supplies a field is validated; a lower layer that
    /// is shadowed is never parsed.
    pub fn resolve(sources: &LayeredSources) -> SharedResult<Self> {
        let cli = &sources.command_line;
        let file = &sources.config_file;

        let environment = sources
            .environment
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(SettingValue::from);

        let deadline = if let Some(value) = &cli.timeout {
            Some(value.as_seconds(ConfigLayer::CommandLine)?)
        } else if let Some(value) = &environment {
            Some(value.as_seconds(ConfigLayer::Environment)?)
        } else if let Some(value) = &file.timeout {
            Some(value.as_seconds(ConfigLayer::ConfigFile)?)
        } else {
            None
        };

        let method = if let Some(value) = &cli.method {
            TimeoutMethod::from_value(value, ConfigLayer::CommandLine)?
        } else if let Some(value) = &file.method {
            TimeoutMethod::from_value(value, ConfigLayer::ConfigFile)?
        } else {
            TimeoutMethod::platform_default()
        };

        let func_only = pick_flag(cli, file, "func_only", |layer| &layer.func_only)?;

        let session = if let Some(value) = &cli.session_timeout {
            Some(value.as_seconds(ConfigLayer::CommandLine)?)
        } else if let Some(value) = &file.session_timeout {
            Some(value.as_seconds(ConfigLayer::ConfigFile)?)
        } else {
            None
        };

        let disable_detection = pick_flag(cli, file, "disable_debugger_detection", |layer| {
            &layer.disable_debugger_detection
        })?;

        Ok(Self {
            deadline,
            method,
            func_only,
            session: SessionSettings { deadline: session },
            debugger_detection: !disable_detection,
        })
    }

    /// Lines describing the global configuration for the run header
    pub fn report_header(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(deadline) = self.deadline {
            lines.push(format!("timeout: {deadline}s method: {}", self.method));
        }
        if let Some(deadline) = self.session.deadline {
            lines.push(format!("session timeout: {deadline}s"));
        }
        lines
    }
}

fn pick_flag(
    cli: &LayerValues,
    file: &LayerValues,
    field: &'static str,
    get: impl Fn(&LayerValues) -> &Option<SettingValue>,
) -> SharedResult<bool> {
    if let Some(value) = get(cli) {
        value.as_flag(field, ConfigLayer::CommandLine)
    } else if let Some(value) = get(file) {
        value.as_flag(field, ConfigLayer::ConfigFile)
    } else {
        Ok(false)
    }
}

/// Computes the effective settings for each unit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettingsResolver {
    global: GlobalSettings,
}

impl SettingsResolver {
    pub fn new(global: GlobalSettings) -> Self {
        Self { global }
    }

    pub fn global(&self) -> &GlobalSettings {
        &self.global
    }

    /// Effective settings for `unit`
    ///
    /// Every marker in the chain is validated, including ones whose fields
    /// are all shadowed by a nearer marker.
    pub fn resolve(&self, unit: &UnitInfo) -> SharedResult<TimeoutSettings> {
        let own = unit
            .markers
            .own
            .as_ref()
            .map(|marker| MarkerFields::from_marker(marker, ConfigLayer::Marker))
            .transpose()?;
        let enclosing = unit
            .markers
            .enclosing
            .iter()
            .map(|marker| MarkerFields::from_marker(marker, ConfigLayer::EnclosingMarker))
            .collect::<SharedResult<Vec<_>>>()?;

        let chain: Vec<MarkerFields> = own.into_iter().chain(enclosing).collect();

        let deadline = chain
            .iter()
            .find_map(|fields| fields.deadline)
            .or(self.global.deadline);
        let method = chain
            .iter()
            .find_map(|fields| fields.method)
            .unwrap_or(self.global.method);
        let func_only = chain
            .iter()
            .find_map(|fields| fields.func_only)
            .unwrap_or(self.global.func_only);

        Ok(TimeoutSettings {
            deadline,
            method,
            scope: TimeoutScope::from_func_only(func_only),
        })
    }
}
