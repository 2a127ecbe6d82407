//! Shared types for the deadline watchdog
//!
//! Contains the settings vocabulary shared by the enforcement engine and the
//! host runner: timeout methods and scopes, annotation markers, configuration
//! layers and their validation errors.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
