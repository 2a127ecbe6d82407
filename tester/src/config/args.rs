//! Command-line arguments

use clap::Parser;
use shared::SettingValue;
use std::path::PathBuf;
use watchdog::LayerValues;

/// Run built-in scenarios under the deadline watchdog
#[derive(Debug, Clone, Parser)]
#[command(name = "tester")]
#[command(about = "Runs built-in scenarios with per-unit and session deadlines")]
pub struct Args {
    /// Scenario to run (see --list)
    #[arg(long, default_value = "passing")]
    pub scenario: String,

    /// Deadline in seconds for each unit
    #[arg(long)]
    pub timeout: Option<String>,

    /// Enforcement method: signal or thread
    #[arg(long = "timeout-method", visible_alias = "timeout_method")]
    pub timeout_method: Option<String>,

    /// Clock only the unit body, not its fixtures
    #[arg(long)]
    pub timeout_func_only: bool,

    /// Deadline in seconds for the whole run
    #[arg(long)]
    pub session_timeout: Option<String>,

    /// Enforce deadlines even while a debugger is active
    #[arg(long)]
    pub timeout_disable_debugger_detection: bool,

    /// Config file (defaults to ./watchdog.toml when present)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Let unit output through instead of capturing it
    #[arg(short = 's', long)]
    pub no_capture: bool,

    /// Seconds per time unit used by scenario sleeps and markers
    #[arg(long, default_value_t = 1.0)]
    pub time_unit: f64,

    /// List scenarios and exit
    #[arg(long)]
    pub list: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Args {
    /// Values given on the command line; switches left off stay unset
    pub fn layer_values(&self) -> LayerValues {
        LayerValues {
            timeout: self.timeout.clone().map(SettingValue::from),
            method: self.timeout_method.clone().map(SettingValue::from),
            func_only: self.timeout_func_only.then_some(SettingValue::Flag(true)),
            session_timeout: self.session_timeout.clone().map(SettingValue::from),
            disable_debugger_detection: self
                .timeout_disable_debugger_detection
                .then_some(SettingValue::Flag(true)),
        }
    }
}
