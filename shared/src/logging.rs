//! Shared logging utilities for consistent tracing across the workspace

use chrono::{DateTime, Utc};
use tracing::info;

/// Crates whose events are filtered by the requested level
const WORKSPACE_TARGETS: &[&str] = &["watchdog", "tester", "shared"];

/// Build the filter directive applied to every workspace crate
pub fn filter_directive(log_level: Option<&str>) -> String {
    let base_level = log_level.unwrap_or("warn");
    WORKSPACE_TARGETS
        .iter()
        .map(|target| format!("{target}={base_level}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Initialize tracing with the given level, writing to stderr
///
/// Stdout belongs to the report, so diagnostics never go there. A `RUST_LOG`
/// value takes precedence over the requested level.
pub fn init_tracing_with_level(log_level: Option<&str>) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(log_level)));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for unit-aware info logging
#[macro_export]
macro_rules! unit_info {
    ($unit:expr, $($arg:tt)*) => {
        tracing::info!(
            unit = %$unit,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for unit-aware warning logging
#[macro_export]
macro_rules! unit_warn {
    ($unit:expr, $($arg:tt)*) => {
        tracing::warn!(
            unit = %$unit,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for unit-aware debug logging
#[macro_export]
macro_rules! unit_debug {
    ($unit:expr, $($arg:tt)*) => {
        tracing::debug!(
            unit = %$unit,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for run start
pub fn log_startup(details: &str) {
    info!(timestamp = format_timestamp(), "🚀 Starting {}", details);
}

/// Contextual logging helper for run end
pub fn log_shutdown(reason: &str) {
    info!(timestamp = format_timestamp(), "🛑 Finished: {}", reason);
}
