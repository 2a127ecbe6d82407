//! Test Scenarios
//!
//! Built-in suites exercising every way a deadline can be configured, hit,
//! postponed or reported. Sleeps and marker deadlines are written in time
//! units, scaled by `--time-unit` seconds.

pub mod core;
pub mod edge;

use crate::runtime::Suite;

/// A named suite factory
pub struct Scenario {
    pub name: &'static str,
    pub about: &'static str,
    build: fn(f64) -> Suite,
}

impl Scenario {
    /// Build the suite with `time_unit` seconds per time unit
    pub fn suite(&self, time_unit: f64) -> Suite {
        (self.build)(time_unit)
    }
}

const SCENARIOS: &[Scenario] = &[
    // Core functionality
    Scenario {
        name: "passing",
        about: "one unit that passes at once",
        build: core::passing,
    },
    Scenario {
        name: "sleep",
        about: "one unit sleeping 2 units",
        build: core::sleep,
    },
    Scenario {
        name: "sleep_with_helper",
        about: "one unit sleeping 2 units while a named helper thread waits",
        build: core::sleep_with_helper,
    },
    Scenario {
        name: "blocked",
        about: "one unit blocked for 20 units in a channel receive",
        build: core::blocked,
    },
    Scenario {
        name: "two_sleepers",
        about: "two units sleeping 2 units each",
        build: core::two_sleepers,
    },
    Scenario {
        name: "marker_signal",
        about: "a 1 unit marker on a 2 unit sleeper, then a passing unit",
        build: core::marker_signal,
    },
    Scenario {
        name: "marker_thread",
        about: "a 1 unit thread-method marker on a 2 unit sleeper",
        build: core::marker_thread,
    },
    Scenario {
        name: "nested_groups",
        about: "group and unit markers merged field by field",
        build: core::nested_groups,
    },
    Scenario {
        name: "fixture_setup",
        about: "a fixture whose setup sleeps 2 units",
        build: core::fixture_setup,
    },
    Scenario {
        name: "fixture_finalizer",
        about: "a fixture whose finalizer sleeps 2 units",
        build: core::fixture_finalizer,
    },
    Scenario {
        name: "func_only",
        about: "func_only markers with slow fixtures and bodies",
        build: core::func_only,
    },
    // Edge cases
    Scenario {
        name: "marker_errors",
        about: "malformed markers next to an unaffected unit",
        build: edge::marker_errors,
    },
    Scenario {
        name: "debugger_pause",
        about: "a 2 unit sleeper paused under a debugger trace hook",
        build: edge::debugger_pause,
    },
    Scenario {
        name: "failing_finalizer",
        about: "a failing body whose finalizer also fails",
        build: edge::failing_finalizer,
    },
];

/// Every scenario, in listing order
pub fn all() -> &'static [Scenario] {
    SCENARIOS
}

pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|scenario| scenario.name == name)
}
