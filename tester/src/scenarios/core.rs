//! Core Functionality Scenarios
//!
//! Deadlines hit by sleeping bodies and fixtures under both methods.

use crate::runtime::{Fixture, Group, StepResult, Suite, TestUnit, UnitContext};
use shared::Marker;
use std::sync::mpsc;

/// One unit that passes at once
pub fn passing(_time_unit: f64) -> Suite {
    Suite::new(Group::new("passing").with_unit(TestUnit::new("test_pass", |_| {
        println!("nothing to wait for");
        Ok(())
    })))
}

fn sleep_two(ctx: &UnitContext<'_>) -> StepResult {
    println!("sleeping in {}", ctx.unit.node_id);
    ctx.sleep(2.0)
}

/// One unit sleeping 2 units
pub fn sleep(_time_unit: f64) -> Suite {
    Suite::new(Group::new("sleep").with_unit(TestUnit::new("test_sleep", sleep_two)))
}

/// Sleeps while a registered helper thread waits for it to finish
pub fn sleep_with_helper(_time_unit: f64) -> Suite {
    Suite::new(Group::new("sleep_with_helper").with_unit(TestUnit::new(
        "test_sleep",
        |ctx| {
            let (done, wait) = mpsc::channel::<()>();
            let helper = ctx.watchdog.spawn_registered("helper", move || {
                let _ = wait.recv();
            })?;

            let slept = sleep_two(ctx);
            drop(done);
            let _ = helper.join();
            slept
        },
    )))
}

fn block_on_channel(ctx: &UnitContext<'_>) -> StepResult {
    println!("blocking in {}", ctx.unit.node_id);
    let (_keep, wait) = mpsc::channel::<()>();
    let _ = wait.recv_timeout(ctx.units(20.0));
    Ok(())
}

/// One unit stuck in a blocking call that never reaches an interruption point
pub fn blocked(_time_unit: f64) -> Suite {
    Suite::new(Group::new("blocked").with_unit(TestUnit::new("test_blocked", block_on_channel)))
}

/// Two sleepers, so a session deadline can stop the run between them
pub fn two_sleepers(_time_unit: f64) -> Suite {
    Suite::new(
        Group::new("two_sleepers")
            .with_unit(TestUnit::new("test_first", sleep_two))
            .with_unit(TestUnit::new("test_second", sleep_two)),
    )
}

/// A marker deadline failing one unit, with the run carrying on
pub fn marker_signal(time_unit: f64) -> Suite {
    Suite::new(
        Group::new("marker_signal")
            .with_unit(
                TestUnit::new("test_slow", sleep_two)
                    .with_marker(Marker::deadline(time_unit).arg("signal")),
            )
            .with_unit(TestUnit::new("test_after", |_| Ok(()))),
    )
}

/// A thread-method marker; expiry terminates the process
pub fn marker_thread(time_unit: f64) -> Suite {
    Suite::new(
        Group::new("marker_thread")
            .with_unit(
                TestUnit::new("test_slow", sleep_two)
                    .with_marker(Marker::deadline(time_unit).kwarg("method", "thread")),
            )
            .with_unit(TestUnit::new("test_never_reached", |_| Ok(()))),
    )
}

/// Group deadline of 2 units, one unit overriding it with 3
///
/// The inner group only sets the method, so its unit keeps the outer
/// group's deadline.
pub fn nested_groups(time_unit: f64) -> Suite {
    Suite::new(
        Group::new("nested_groups")
            .with_marker(Marker::deadline(2.0 * time_unit))
            .with_unit(
                TestUnit::new("test_inner", |ctx| ctx.sleep(2.5))
                    .with_marker(Marker::deadline(3.0 * time_unit)),
            )
            .with_unit(TestUnit::new("test_sibling", |ctx| ctx.sleep(1.5)))
            .with_group(
                Group::new("threaded")
                    .with_marker(Marker::new().kwarg("method", "thread"))
                    .with_unit(TestUnit::new("test_method_only", |ctx| ctx.sleep(0.5))),
            ),
    )
}

fn slow_fixture(name: &str) -> Fixture {
    Fixture::new(name).with_setup(|ctx| {
        println!("slow setup");
        ctx.sleep(2.0)
    })
}

/// A fixture whose setup outlasts the deadline
pub fn fixture_setup(_time_unit: f64) -> Suite {
    Suite::new(
        Group::new("fixture_setup").with_unit(
            TestUnit::new("test_quick_body", |_| Ok(())).with_fixture(slow_fixture("slow")),
        ),
    )
}

/// A fixture whose finalizer outlasts the deadline
pub fn fixture_finalizer(_time_unit: f64) -> Suite {
    Suite::new(
        Group::new("fixture_finalizer").with_unit(
            TestUnit::new("test_quick_body", |_| Ok(())).with_fixture(
                Fixture::new("slow_teardown").with_finalizer(|ctx| {
                    println!("slow finalizer");
                    ctx.sleep(2.0)
                }),
            ),
        ),
    )
}

/// `func_only` markers: slow fixtures are not clocked, slow bodies are
pub fn func_only(time_unit: f64) -> Suite {
    let marker = || Marker::deadline(time_unit).kwarg("func_only", true);
    Suite::new(
        Group::new("func_only")
            .with_unit(
                TestUnit::new("test_slow_fixture", |_| Ok(()))
                    .with_marker(marker())
                    .with_fixture(slow_fixture("slow")),
            )
            .with_unit(TestUnit::new("test_slow_body", sleep_two).with_marker(marker())),
    )
}
