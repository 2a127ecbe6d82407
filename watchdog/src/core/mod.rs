//! Core logic modules
//!
//! This module contains the pure parts of the watchdog: settings resolution,
//! banner rendering and the session deadline state machine. Nothing here arms
//! timers or touches signals.

pub mod banner;
pub mod session;
pub mod settings;

pub use banner::{DEFAULT_WIDTH, ReportFormatter, SECTION_SEP, TIMEOUT_SEP};
pub use session::{SessionDeadline, SessionState, SessionVerdict};
pub use settings::{
    GlobalSettings, LayerValues, LayeredSources, ParsedMarker, SettingsResolver, parse_marker,
};
