//! Sequential scheduler
//!
//! Units run one after another on the calling thread. For each unit the
//! settings are resolved first; a marker error becomes a setup error and
//! nothing of the unit runs. Then the protocol guard is armed, fixtures are
//! set up, the call guard is armed around the body and finalizers run in
//! reverse order whatever happened before. Every phase ends at an
//! interruption point.

use crate::runtime::capture::FdCapture;
use crate::runtime::report::{Outcome, Phase, Reporter, RunSummary, UnitReport};
use crate::runtime::suite::{CollectedUnit, StepResult, Suite, UnitContext, UnitError};
use shared::{TimeoutSettings, unit_debug, unit_info, unit_warn};
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;
use watchdog::{ArmPoint, CapturedOutput, SessionVerdict, Watchdog};

pub struct Runner<'a, W: Write> {
    watchdog: &'a Watchdog,
    capture: Arc<FdCapture>,
    reporter: Reporter<W>,
    time_unit: f64,
}

impl<'a, W: Write> Runner<'a, W> {
    pub fn new(
        watchdog: &'a Watchdog,
        capture: Arc<FdCapture>,
        reporter: Reporter<W>,
        time_unit: f64,
    ) -> Self {
        Self {
            watchdog,
            capture,
            reporter,
            time_unit,
        }
    }

    pub fn into_reporter(self) -> Reporter<W> {
        self.reporter
    }

    /// Run every unit of `suite` until done or the session deadline passes
    pub fn run(&mut self, suite: &Suite) -> RunSummary {
        let started = Instant::now();
        let collected = suite.collect();
        self.reporter
            .session_start(suite.name(), &self.watchdog.report_header(), collected.len());

        let mut session = self.watchdog.session();
        session.start();
        let stream = self.watchdog.stream();

        let mut summary = RunSummary::default();
        let mut remaining = collected.iter();
        for unit in remaining.by_ref() {
            let report = self.run_unit(unit);
            summary.reports.push(report);

            if session.check(stream.as_ref()) == SessionVerdict::Stop {
                summary.interrupted = true;
                break;
            }
        }
        summary.not_run = remaining.map(|unit| unit.info.node_id.clone()).collect();
        summary.elapsed = started.elapsed();

        self.reporter.summary(&summary);
        summary
    }

    fn run_unit(&mut self, collected: &CollectedUnit<'_>) -> UnitReport {
        let info = &collected.info;
        let started = Instant::now();
        self.reporter.unit_started(&info.node_id);
        unit_debug!(info, "▶️ Starting unit");

        let (outcome, captured) = match self.watchdog.resolve(info) {
            Ok(settings) => self.capture_and_execute(collected, &settings),
            Err(err) => {
                unit_warn!(info, "❌ Invalid timeout settings: {}", err);
                let outcome = Outcome::failed(Phase::Setup, &UnitError::from(err));
                (outcome, CapturedOutput::default())
            }
        };

        let report = UnitReport {
            node_id: info.node_id.clone(),
            outcome,
            captured,
            duration: started.elapsed(),
        };
        unit_info!(info, "🏁 {} in {:?}", report.outcome.label(), report.duration);
        self.reporter.unit_finished(&report);
        report
    }

    fn capture_and_execute(
        &self,
        collected: &CollectedUnit<'_>,
        settings: &TimeoutSettings,
    ) -> (Outcome, CapturedOutput) {
        if let Err(err) = self.capture.start(&collected.info) {
            let outcome = Outcome::failed(Phase::Setup, &UnitError::from(err));
            return (outcome, CapturedOutput::default());
        }
        let outcome = self.execute(collected, settings);
        (outcome, self.capture.stop())
    }

    fn execute(&self, collected: &CollectedUnit<'_>, settings: &TimeoutSettings) -> Outcome {
        let info = &collected.info;
        let unit = collected.unit;
        let ctx = UnitContext {
            watchdog: self.watchdog,
            unit: info,
            time_unit: self.time_unit,
        };

        let protocol = match self.watchdog.arm_for(ArmPoint::Protocol, info, settings) {
            Ok(guard) => guard,
            Err(err) => return Outcome::failed(Phase::Setup, &UnitError::from(err)),
        };

        let mut failure: Option<(Phase, UnitError)> = None;
        let mut set_up = 0;
        for fixture in &unit.fixtures {
            match fixture.set_up(&ctx).and_then(|()| interruption_point()) {
                Ok(()) => set_up += 1,
                Err(err) => {
                    unit_debug!(info, "Fixture {} failed during setup", fixture.name);
                    failure = Some((Phase::Setup, err));
                    break;
                }
            }
        }

        if failure.is_none() {
            if let Err(err) = self.call(collected, settings, &ctx) {
                failure = Some((Phase::Call, err));
            }
        }

        for fixture in unit.fixtures[..set_up].iter().rev() {
            if let Err(err) = fixture.finalize(&ctx).and_then(|()| interruption_point()) {
                if failure.is_none() {
                    failure = Some((Phase::Teardown, err));
                } else {
                    unit_warn!(info, "Fixture {} also failed in teardown: {}", fixture.name, err);
                }
            }
        }
        drop(protocol);

        match failure {
            None => Outcome::Passed,
            Some((phase, err)) => Outcome::failed(phase, &err),
        }
    }

    /// The body under the call guard; the guard is dropped after the final
    /// interruption point
    fn call(
        &self,
        collected: &CollectedUnit<'_>,
        settings: &TimeoutSettings,
        ctx: &UnitContext<'_>,
    ) -> StepResult {
        let _call = self
            .watchdog
            .arm_for(ArmPoint::Call, &collected.info, settings)?;
        collected.unit.run(ctx)?;
        interruption_point()
    }
}

fn interruption_point() -> StepResult {
    watchdog::checkpoint()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::suite::{Fixture, Group, TestUnit};
    use shared::{Marker, SettingValue};
    use std::cell::RefCell;
    use std::rc::Rc;
    use watchdog::services::BufferStream;
    use watchdog::{LayerValues, LayeredSources, ReportFormatter};

    type Log = Rc<RefCell<Vec<String>>>;

    fn watchdog_with(sources: LayeredSources, stream: &BufferStream) -> Watchdog {
        Watchdog::builder()
            .with_sources(sources)
            .with_stream(Arc::new(stream.clone()))
            .with_width(40)
            .build()
            .unwrap()
    }

    fn run(watchdog: &Watchdog, suite: &Suite) -> (RunSummary, String) {
        let reporter = Reporter::new(Vec::new(), ReportFormatter::new().with_width(40));
        let mut runner = Runner::new(watchdog, Arc::new(FdCapture::new(false)), reporter, 0.01);
        let summary = runner.run(suite);
        let text = String::from_utf8(runner.into_reporter().into_inner()).unwrap();
        (summary, text)
    }

    fn recording(log: &Log, name: &str) -> Fixture {
        let (setup_log, final_log) = (Rc::clone(log), Rc::clone(log));
        let (setup_name, final_name) = (format!("setup {name}"), format!("finalize {name}"));
        Fixture::new(name)
            .with_setup(move |_| {
                setup_log.borrow_mut().push(setup_name.clone());
                Ok(())
            })
            .with_finalizer(move |_| {
                final_log.borrow_mut().push(final_name.clone());
                Ok(())
            })
    }

    #[test]
    fn test_fixtures_wrap_body_in_reverse_order() {
        let log: Log = Rc::default();
        let body_log = Rc::clone(&log);
        let suite = Suite::new(
            Group::new("order").with_unit(
                TestUnit::new("test_body", move |_| {
                    body_log.borrow_mut().push("body".to_string());
                    Ok(())
                })
                .with_fixture(recording(&log, "a"))
                .with_fixture(recording(&log, "b")),
            ),
        );

        let stream = BufferStream::new();
        let (summary, text) = run(&watchdog_with(LayeredSources::default(), &stream), &suite);

        assert_eq!(summary.exit_code(), 0);
        assert_eq!(
            *log.borrow(),
            vec!["setup a", "setup b", "body", "finalize b", "finalize a"]
        );
        assert!(text.contains("order::test_body PASSED\n"));
    }

    #[test]
    fn test_setup_failure_skips_body_and_later_fixtures() {
        let log: Log = Rc::default();
        let body_log = Rc::clone(&log);
        let suite = Suite::new(
            Group::new("broken").with_unit(
                TestUnit::new("test_body", move |_| {
                    body_log.borrow_mut().push("body".to_string());
                    Ok(())
                })
                .with_fixture(recording(&log, "a"))
                .with_fixture(
                    Fixture::new("db").with_setup(|_| Err(UnitError::assertion("no db"))),
                )
                .with_fixture(recording(&log, "c")),
            ),
        );

        let stream = BufferStream::new();
        let (summary, _) = run(&watchdog_with(LayeredSources::default(), &stream), &suite);

        assert_eq!(*log.borrow(), vec!["setup a", "finalize a"]);
        assert_eq!(summary.errors(), 1);
        assert_eq!(summary.reports[0].outcome.label(), "ERROR");
    }

    #[test]
    fn test_marker_error_is_setup_error_before_anything_runs() {
        let log: Log = Rc::default();
        let body_log = Rc::clone(&log);
        let suite = Suite::new(
            Group::new("markers")
                .with_unit(
                    TestUnit::new("test_foo", move |_| {
                        body_log.borrow_mut().push("body".to_string());
                        Ok(())
                    })
                    .with_marker(Marker::deadline("foo"))
                    .with_fixture(recording(&log, "a")),
                )
                .with_unit(TestUnit::new("test_fine", |_| Ok(()))),
        );

        let stream = BufferStream::new();
        let (summary, text) = run(&watchdog_with(LayeredSources::default(), &stream), &suite);

        assert!(log.borrow().is_empty());
        assert_eq!(summary.errors(), 1);
        assert_eq!(summary.passed(), 1);
        assert!(text.contains("ERROR markers::test_foo - ConfigValueError: Invalid timeout foo from marker"));
    }

    #[test]
    fn test_session_deadline_stops_remaining_units() {
        let suite = Suite::new(
            Group::new("session")
                .with_unit(TestUnit::new("test_first", |ctx| ctx.sleep(5.0)))
                .with_unit(TestUnit::new("test_second", |_| {
                    Err(UnitError::assertion("must not run"))
                })),
        );
        let sources = LayeredSources::default().with_command_line(LayerValues {
            session_timeout: Some(SettingValue::from(0.01)),
            ..LayerValues::default()
        });

        let stream = BufferStream::new();
        let (summary, text) = run(&watchdog_with(sources, &stream), &suite);

        assert!(summary.interrupted);
        assert_eq!(summary.passed(), 1);
        assert_eq!(summary.not_run, vec!["session::test_second".to_string()]);
        assert_eq!(summary.exit_code(), 2);
        assert_eq!(stream.contents(), "!! session-timeout: 0.01s exceeded !!!\n");
        assert!(text.contains("NOT RUN session::test_second"));
    }
}
