//! Terminal reporter and run summary

use crate::runtime::suite::UnitError;
use std::fmt;
use std::io::Write;
use std::time::Duration;
use watchdog::{CapturedOutput, ReportFormatter};

/// Exit status when any unit failed or errored
pub const EXIT_FAILED: u8 = 1;
/// Exit status when the session deadline stopped the run
pub const EXIT_INTERRUPTED: u8 = 2;
/// Exit status for usage and configuration errors
pub const EXIT_USAGE: u8 = 4;

/// Stage of a unit a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Call,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Setup => write!(f, "setup"),
            Phase::Call => write!(f, "call"),
            Phase::Teardown => write!(f, "teardown"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    Failed {
        phase: Phase,
        kind: &'static str,
        message: String,
    },
}

impl Outcome {
    pub fn failed(phase: Phase, error: &UnitError) -> Self {
        Outcome::Failed {
            phase,
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// `PASSED`, `FAILED` for body failures, `ERROR` for fixture failures
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Passed => "PASSED",
            Outcome::Failed {
                phase: Phase::Call, ..
            } => "FAILED",
            Outcome::Failed { .. } => "ERROR",
        }
    }

    pub fn is_passed(&self) -> bool {
        matches!(self, Outcome::Passed)
    }
}

#[derive(Debug, Clone)]
pub struct UnitReport {
    pub node_id: String,
    pub outcome: Outcome,
    pub captured: CapturedOutput,
    pub duration: Duration,
}

impl UnitReport {
    /// `Kind: message`, or `None` when passed
    pub fn reason(&self) -> Option<String> {
        match &self.outcome {
            Outcome::Passed => None,
            Outcome::Failed { kind, message, .. } => Some(format!("{kind}: {message}")),
        }
    }
}

/// Results of one run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub reports: Vec<UnitReport>,
    /// Units skipped because the session deadline passed
    pub not_run: Vec<String>,
    pub interrupted: bool,
    pub elapsed: Duration,
}

impl RunSummary {
    fn count(&self, label: &str) -> usize {
        self.reports
            .iter()
            .filter(|report| report.outcome.label() == label)
            .count()
    }

    pub fn passed(&self) -> usize {
        self.count("PASSED")
    }

    pub fn failed(&self) -> usize {
        self.count("FAILED")
    }

    pub fn errors(&self) -> usize {
        self.count("ERROR")
    }

    pub fn exit_code(&self) -> u8 {
        if self.interrupted {
            EXIT_INTERRUPTED
        } else if self.failed() + self.errors() > 0 {
            EXIT_FAILED
        } else {
            0
        }
    }

    /// e.g. `1 failed, 2 passed, 1 not run`
    pub fn counts_line(&self) -> String {
        let parts: Vec<String> = [
            (self.failed(), "failed"),
            (self.passed(), "passed"),
            (self.errors(), "error"),
            (self.not_run.len(), "not run"),
        ]
        .into_iter()
        .filter(|(count, _)| *count > 0)
        .map(|(count, label)| match (label, count) {
            ("error", n) if n > 1 => format!("{n} errors"),
            (label, n) => format!("{n} {label}"),
        })
        .collect();

        if parts.is_empty() {
            "no units ran".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Writes the run report: header, one line per unit, failures and summary
pub struct Reporter<W: Write> {
    out: W,
    formatter: ReportFormatter,
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, formatter: ReportFormatter) -> Self {
        Self { out, formatter }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
    }

    pub fn session_start(&mut self, scenario: &str, header: &[String], collected: usize) {
        let banner = self.formatter.render_line("test session starts", '=');
        self.line(&banner);
        self.line(&format!("scenario: {scenario}"));
        for entry in header {
            self.line(entry);
        }
        let noun = if collected == 1 { "unit" } else { "units" };
        self.line(&format!("collected {collected} {noun}"));
        self.line("");
        let _ = self.out.flush();
    }

    /// Node id written before the unit runs so it shows even if the process dies
    pub fn unit_started(&mut self, node_id: &str) {
        let _ = write!(self.out, "{node_id} ");
        let _ = self.out.flush();
    }

    pub fn unit_finished(&mut self, report: &UnitReport) {
        self.line(report.outcome.label());
        let _ = self.out.flush();
    }

    pub fn summary(&mut self, summary: &RunSummary) {
        let failures: Vec<&UnitReport> = summary
            .reports
            .iter()
            .filter(|report| !report.outcome.is_passed())
            .collect();

        if !failures.is_empty() {
            let banner = self.formatter.render_line("FAILURES", '=');
            self.line(&banner);
            for report in &failures {
                self.failure(report);
            }
        }

        if !failures.is_empty() || !summary.not_run.is_empty() {
            let banner = self.formatter.render_line("short test summary info", '=');
            self.line(&banner);
            for report in &failures {
                let reason = report.reason().unwrap_or_default();
                self.line(&format!("{} {} - {reason}", report.outcome.label(), report.node_id));
            }
            for node_id in &summary.not_run {
                self.line(&format!("NOT RUN {node_id}"));
            }
        }

        if summary.interrupted {
            let banner = self
                .formatter
                .render_line("Interrupted: session deadline exceeded", '!');
            self.line(&banner);
        }

        let closing = format!(
            "{} in {:.2}s",
            summary.counts_line(),
            summary.elapsed.as_secs_f64()
        );
        let banner = self.formatter.render_line(&closing, '=');
        self.line(&banner);
        let _ = self.out.flush();
    }

    fn failure(&mut self, report: &UnitReport) {
        let Outcome::Failed { phase, .. } = &report.outcome else {
            return;
        };
        let title = match phase {
            Phase::Call => report.node_id.clone(),
            phase => format!("ERROR at {phase} of {}", report.node_id),
        };
        let banner = self.formatter.render_line(&title, '_');
        self.line(&banner);
        self.line(&report.reason().unwrap_or_default());

        for (stream, text) in [
            ("stdout", &report.captured.stdout),
            ("stderr", &report.captured.stderr),
        ] {
            if text.is_empty() {
                continue;
            }
            let banner = self
                .formatter
                .render_line(&format!("Captured {stream} {phase}"), '-');
            self.line(&banner);
            let _ = write!(self.out, "{text}");
            if !text.ends_with('\n') {
                self.line("");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use watchdog::WatchdogError;

    fn report(node_id: &str, outcome: Outcome) -> UnitReport {
        UnitReport {
            node_id: node_id.to_string(),
            outcome,
            captured: CapturedOutput::default(),
            duration: Duration::ZERO,
        }
    }

    fn timeout_failure() -> Outcome {
        Outcome::failed(
            Phase::Call,
            &UnitError::from(WatchdogError::Timeout { deadline: 1.0 }),
        )
    }

    #[test]
    fn test_labels_by_phase() {
        assert_eq!(Outcome::Passed.label(), "PASSED");
        assert_eq!(timeout_failure().label(), "FAILED");
        let setup = Outcome::failed(Phase::Setup, &UnitError::assertion("no db"));
        assert_eq!(setup.label(), "ERROR");
    }

    #[test]
    fn test_exit_codes() {
        let mut summary = RunSummary::default();
        summary.reports.push(report("s::a", Outcome::Passed));
        assert_eq!(summary.exit_code(), 0);

        summary.reports.push(report("s::b", timeout_failure()));
        assert_eq!(summary.exit_code(), EXIT_FAILED);

        summary.interrupted = true;
        assert_eq!(summary.exit_code(), EXIT_INTERRUPTED);
    }

    #[test]
    fn test_counts_line() {
        let summary = RunSummary {
            reports: vec![
                report("s::a", Outcome::Passed),
                report("s::b", timeout_failure()),
            ],
            not_run: vec!["s::c".to_string()],
            interrupted: true,
            elapsed: Duration::ZERO,
        };
        assert_eq!(summary.counts_line(), "1 failed, 1 passed, 1 not run");
        assert_eq!(RunSummary::default().counts_line(), "no units ran");
    }

    #[test]
    fn test_failure_section_and_short_summary() {
        let mut failed = report("s::b", timeout_failure());
        failed.captured.stdout = "sleeping\n".to_string();
        let summary = RunSummary {
            reports: vec![failed],
            ..RunSummary::default()
        };

        let mut reporter = Reporter::new(Vec::new(), ReportFormatter::new().with_width(40));
        reporter.summary(&summary);
        let text = String::from_utf8(reporter.into_inner()).unwrap();

        assert!(text.contains(" FAILURES "));
        assert!(text.contains(" Captured stdout call "));
        assert!(text.contains("sleeping\n"));
        assert!(text.contains("FAILED s::b - Failed: Timeout >1s\n"));
        assert!(text.contains(" 1 failed in 0.00s "));
    }

    #[test]
    fn test_setup_error_title() {
        let summary = RunSummary {
            reports: vec![report(
                "s::c",
                Outcome::failed(Phase::Setup, &UnitError::assertion("no db")),
            )],
            ..RunSummary::default()
        };
        let mut reporter = Reporter::new(Vec::new(), ReportFormatter::new().with_width(40));
        reporter.summary(&summary);
        let text = String::from_utf8(reporter.into_inner()).unwrap();

        assert!(text.contains(" ERROR at setup of s::c "));
        assert!(text.contains("ERROR s::c - AssertionError: no db\n"));
    }
}
