//! Assembles the run configuration from every source

use crate::config::{Args, FileConfig};
use anyhow::Result;
use shared::ENV_TIMEOUT_VAR;
use std::path::Path;
use tracing::{debug, warn};
use watchdog::LayeredSources;

/// Everything the runner needs from its configuration
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub scenario: String,
    pub sources: LayeredSources,
    pub capture: bool,
    pub time_unit: f64,
}

impl RunnerConfig {
    /// Combine arguments, the config file and `WATCHDOG_TIMEOUT`
    ///
    /// A `.env` file is loaded first so it can supply the variable.
    pub fn from_args(args: &Args, dir: &Path) -> Result<Self> {
        if let Ok(path) = dotenv::dotenv() {
            debug!("📄 Loaded environment from {}", path.display());
        }
        let environment = std::env::var(ENV_TIMEOUT_VAR).ok();
        let file = FileConfig::discover(args.config.as_deref(), dir)?;
        Ok(Self::assemble(args, environment, &file))
    }

    pub fn assemble(args: &Args, environment: Option<String>, file: &FileConfig) -> Self {
        let sources = LayeredSources::default()
            .with_command_line(args.layer_values())
            .with_environment(environment)
            .with_config_file(file.layer_values());

        Self {
            scenario: args.scenario.clone(),
            sources,
            capture: !args.no_capture,
            time_unit: args.time_unit,
        }
    }
}

/// Warn about deprecated spellings in the raw argument list
pub fn deprecated_flags_used<I, S>(argv: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let used = argv
        .into_iter()
        .any(|arg| arg.as_ref().starts_with("--timeout_method"));
    if used {
        warn!("⚠️ --timeout_method is deprecated, use --timeout-method");
    }
    used
}
