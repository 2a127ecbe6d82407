//! Edge Case Scenarios

use crate::runtime::{Fixture, Group, StepResult, Suite, TestUnit, UnitContext, UnitError};
use shared::Marker;
use watchdog::install_trace_hook;

fn body(_ctx: &UnitContext<'_>) -> StepResult {
    println!("body ran");
    Ok(())
}

/// Malformed markers; each fails its own unit during setup
pub fn marker_errors(_time_unit: f64) -> Suite {
    Suite::new(
        Group::new("marker_errors")
            .with_unit(TestUnit::new("test_nonnumeric", body).with_marker(Marker::deadline("foo")))
            .with_unit(
                TestUnit::new("test_too_many", body)
                    .with_marker(Marker::deadline(1).arg("thread").arg(3)),
            )
            .with_unit(TestUnit::new("test_no_args", body).with_marker(Marker::new()))
            .with_unit(
                TestUnit::new("test_unknown_keyword", body)
                    .with_marker(Marker::new().kwarg("seconds", 1)),
            )
            .with_unit(
                TestUnit::new("test_bad_method", body)
                    .with_marker(Marker::deadline(1).arg("fork")),
            )
            .with_unit(TestUnit::new("test_unaffected", |_| Ok(()))),
    )
}

/// A sleeper whose thread carries a debugger trace hook
pub fn debugger_pause(time_unit: f64) -> Suite {
    Suite::new(
        Group::new("debugger_pause").with_unit(
            TestUnit::new("test_paused", |ctx| {
                let _hook = install_trace_hook("pdb");
                ctx.sleep(2.0)
            })
            .with_marker(Marker::deadline(time_unit)),
        ),
    )
}

/// The body failure is reported; the finalizer failure is only logged
pub fn failing_finalizer(_time_unit: f64) -> Suite {
    Suite::new(
        Group::new("failing_finalizer").with_unit(
            TestUnit::new("test_fails", |_| Err(UnitError::assertion("body failed")))
                .with_fixture(
                    Fixture::new("cleanup")
                        .with_finalizer(|_| Err(UnitError::assertion("cleanup failed"))),
                ),
        ),
    )
}
