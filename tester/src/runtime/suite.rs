//! Suites, groups, fixtures and units
//!
//! A suite is a tree of groups. Markers attach to groups and units, and a
//! unit sees the markers of every group above it, nearest first.

use shared::{Marker, MarkerChain, UnitInfo};
use std::time::Duration;
use thiserror::Error;
use watchdog::{Watchdog, WatchdogError};

/// Why a setup, body or finalizer step failed
#[derive(Error, Debug)]
pub enum UnitError {
    #[error(transparent)]
    Watchdog(#[from] WatchdogError),

    #[error("{0}")]
    Assertion(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl UnitError {
    pub fn assertion(message: impl Into<String>) -> Self {
        Self::Assertion(message.into())
    }

    /// Failure kind shown by the reporter
    pub fn kind(&self) -> &'static str {
        match self {
            UnitError::Watchdog(err) => err.kind(),
            UnitError::Assertion(_) => "AssertionError",
            UnitError::Io(_) => "Error",
        }
    }
}

pub type StepResult = Result<(), UnitError>;

type Step = Box<dyn Fn(&UnitContext<'_>) -> StepResult>;

/// What a running step can reach
pub struct UnitContext<'a> {
    pub watchdog: &'a Watchdog,
    pub unit: &'a UnitInfo,
    pub time_unit: f64,
}

impl UnitContext<'_> {
    /// `count` time units as a duration
    pub fn units(&self, count: f64) -> Duration {
        Duration::from_secs_f64((count * self.time_unit).max(0.0))
    }

    /// Sleep `count` time units, stopping early on an expired deadline
    pub fn sleep(&self, count: f64) -> StepResult {
        watchdog::sleep(self.units(count))?;
        Ok(())
    }
}

/// Setup and finalizer around a unit
pub struct Fixture {
    pub name: String,
    setup: Option<Step>,
    finalizer: Option<Step>,
}

impl Fixture {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            setup: None,
            finalizer: None,
        }
    }

    pub fn with_setup(mut self, step: impl Fn(&UnitContext<'_>) -> StepResult + 'static) -> Self {
        self.setup = Some(Box::new(step));
        self
    }

    pub fn with_finalizer(
        mut self,
        step: impl Fn(&UnitContext<'_>) -> StepResult + 'static,
    ) -> Self {
        self.finalizer = Some(Box::new(step));
        self
    }

    pub fn set_up(&self, ctx: &UnitContext<'_>) -> StepResult {
        self.setup.as_ref().map_or(Ok(()), |step| step(ctx))
    }

    pub fn finalize(&self, ctx: &UnitContext<'_>) -> StepResult {
        self.finalizer.as_ref().map_or(Ok(()), |step| step(ctx))
    }
}

/// One unit of work
pub struct TestUnit {
    pub name: String,
    pub marker: Option<Marker>,
    pub fixtures: Vec<Fixture>,
    body: Step,
}

impl TestUnit {
    pub fn new(
        name: impl Into<String>,
        body: impl Fn(&UnitContext<'_>) -> StepResult + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            marker: None,
            fixtures: Vec::new(),
            body: Box::new(body),
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_fixture(mut self, fixture: Fixture) -> Self {
        self.fixtures.push(fixture);
        self
    }

    pub fn run(&self, ctx: &UnitContext<'_>) -> StepResult {
        (self.body)(ctx)
    }
}

/// Named group of units and nested groups
pub struct Group {
    pub name: String,
    pub marker: Option<Marker>,
    pub units: Vec<TestUnit>,
    pub groups: Vec<Group>,
}

impl Group {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            marker: None,
            units: Vec::new(),
            groups: Vec::new(),
        }
    }

    pub fn with_marker(mut self, marker: Marker) -> Self {
        self.marker = Some(marker);
        self
    }

    pub fn with_unit(mut self, unit: TestUnit) -> Self {
        self.units.push(unit);
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.push(group);
        self
    }
}

/// A unit paired with its identity and marker chain
pub struct CollectedUnit<'a> {
    pub info: UnitInfo,
    pub unit: &'a TestUnit,
}

/// Top-level group of a scenario
pub struct Suite {
    pub root: Group,
}

impl Suite {
    pub fn new(root: Group) -> Self {
        Self { root }
    }

    pub fn name(&self) -> &str {
        &self.root.name
    }

    /// Every unit in definition order, units of a group before its subgroups
    pub fn collect(&self) -> Vec<CollectedUnit<'_>> {
        let mut collected = Vec::new();
        collect_group(&self.root, &mut Vec::new(), &mut Vec::new(), &mut collected);
        collected
    }
}

fn collect_group<'a>(
    group: &'a Group,
    path: &mut Vec<&'a str>,
    markers: &mut Vec<&'a Marker>,
    collected: &mut Vec<CollectedUnit<'a>>,
) {
    path.push(&group.name);
    if let Some(marker) = &group.marker {
        markers.push(marker);
    }

    for unit in &group.units {
        let mut chain = MarkerChain::default();
        if let Some(marker) = &unit.marker {
            chain = chain.with_own(marker.clone());
        }
        for marker in markers.iter().rev() {
            chain = chain.with_enclosing((*marker).clone());
        }
        let node_id = format!("{}::{}", path.join("::"), unit.name);
        collected.push(CollectedUnit {
            info: UnitInfo::new(node_id).with_markers(chain),
            unit,
        });
    }
    for nested in &group.groups {
        collect_group(nested, path, markers, collected);
    }

    if group.marker.is_some() {
        markers.pop();
    }
    path.pop();
}
