//! Host runner binary
//!
//! Parses arguments, assembles the layered configuration, builds the
//! watchdog and runs the chosen scenario.

use anyhow::{Context, Result, bail};
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use shared::logging;
use tester::runtime::report::EXIT_USAGE;
use tester::{Args, FdCapture, Reporter, RunnerConfig, Runner, config, find_scenario, scenarios};
use watchdog::Watchdog;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::from(EXIT_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    logging::init_tracing_with_level(Some(&args.log_level));
    config::deprecated_flags_used(std::env::args());

    if args.list {
        for scenario in scenarios::all() {
            println!("{:<20} {}", scenario.name, scenario.about);
        }
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(EXIT_USAGE)
        }
    }
}

fn run(args: &Args) -> Result<u8> {
    if !(args.time_unit.is_finite() && args.time_unit > 0.0) {
        bail!("--time-unit must be a positive number of seconds");
    }

    let dir = std::env::current_dir().context("reading working directory")?;
    let config = RunnerConfig::from_args(args, &dir)?;
    let scenario = find_scenario(&config.scenario)
        .with_context(|| format!("unknown scenario '{}' (see --list)", config.scenario))?;

    let capture = Arc::new(FdCapture::new(config.capture));
    let watchdog = Watchdog::builder()
        .with_sources(config.sources.clone())
        .with_capture(Arc::clone(&capture) as Arc<dyn watchdog::CaptureManager>)
        .build()
        .context("invalid timeout configuration")?;
    let _main = watchdog.register_current_thread("MainThread");

    logging::log_startup(&format!("scenario {}", scenario.name));
    let suite = scenario.suite(config.time_unit);
    let reporter = Reporter::new(std::io::stdout(), watchdog.formatter());
    let summary = Runner::new(&watchdog, capture, reporter, config.time_unit).run(&suite);
    logging::log_shutdown(&summary.counts_line());

    Ok(summary.exit_code())
}
