//! Configuration Management
//!
//! Command-line arguments, the TOML config file and the environment, turned
//! into the layered sources the watchdog resolves its settings from.

pub mod args;
pub mod file;
pub mod sources;

// Re-export main types
pub use args::Args;
pub use file::{DEFAULT_CONFIG_FILE, FileConfig};
pub use sources::{RunnerConfig, deprecated_flags_used};
