//! Host runner for the deadline watchdog
//!
//! Runs built-in scenario suites sequentially under per-unit and session
//! deadlines, capturing unit output at the descriptor level and reporting
//! one line per unit followed by failures and a summary.
//!
//! ## Quick Start
//!
//! ```text
//! tester --scenario sleep --timeout 1
//! tester --scenario sleep --timeout 1 --timeout-method thread
//! WATCHDOG_TIMEOUT=1 tester --scenario sleep
//! tester --list
//! ```

// Core modules
pub mod config;
pub mod runtime;
pub mod scenarios;

// Main interfaces - re-exported at crate root for convenience
pub use config::{Args, FileConfig, RunnerConfig};
pub use runtime::{FdCapture, Reporter, RunSummary, Runner, Suite};
pub use scenarios::{Scenario, find as find_scenario};
