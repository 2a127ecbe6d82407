//! TOML config file
//!
//! Keys mirror the command line. Values stay untyped here and are validated
//! by the settings resolver, which names the config file as their source.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use shared::SettingValue;
use std::fs;
use std::path::Path;
use watchdog::LayerValues;

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "watchdog.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub timeout: Option<SettingValue>,
    pub timeout_method: Option<SettingValue>,
    pub timeout_func_only: Option<SettingValue>,
    pub session_timeout: Option<SettingValue>,
    pub timeout_disable_debugger_detection: Option<SettingValue>,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Read `path`, which must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config file {}", path.display()))
    }

    /// Read `path` if given, else the default file in `dir` if present
    pub fn discover(path: Option<&Path>, dir: &Path) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = dir.join(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn layer_values(&self) -> LayerValues {
        LayerValues {
            timeout: self.timeout.clone(),
            method: self.timeout_method.clone(),
            func_only: self.timeout_func_only.clone(),
            session_timeout: self.session_timeout.clone(),
            disable_debugger_detection: self.timeout_disable_debugger_detection.clone(),
        }
    }
}
