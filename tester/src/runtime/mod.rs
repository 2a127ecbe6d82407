//! Runtime Management
//!
//! Suites of units, per-unit output capture, the sequential scheduler and
//! the terminal reporter.

pub mod capture;
pub mod report;
pub mod runner;
pub mod suite;

// Re-export main types
pub use capture::FdCapture;
pub use report::{Outcome, Phase, Reporter, RunSummary, UnitReport};
pub use runner::Runner;
pub use suite::{CollectedUnit, Fixture, Group, StepResult, Suite, TestUnit, UnitContext, UnitError};
