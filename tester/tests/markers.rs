//! Marker shapes, nested groups and configuration layers through the binary

mod common;
use common::{TesterRun, assert_lines, assert_no_line};

#[test]
fn test_malformed_markers_fail_their_own_units_before_the_body() {
    let output = TesterRun::scenario("marker_errors").args(["-s"]).run();

    output.assert_status(1);
    assert!(!output.stdout.contains("body ran"));
    assert_lines(
        &output.stdout,
        &[
            "marker_errors::test_nonnumeric ERROR",
            "marker_errors::test_too_many ERROR",
            "marker_errors::test_no_args ERROR",
            "marker_errors::test_unknown_keyword ERROR",
            "marker_errors::test_bad_method ERROR",
            "marker_errors::test_unaffected PASSED",
        ],
    );
    assert_lines(
        &output.stdout,
        &[
            "ERROR marker_errors::test_nonnumeric - ConfigValueError: Invalid timeout foo from marker",
            "ERROR marker_errors::test_too_many - ConfigShapeError: Too many arguments for timeout marker",
            "ERROR marker_errors::test_no_args - ConfigShapeError: Timeout marker must have at least one argument",
            "ERROR marker_errors::test_unknown_keyword - ConfigShapeError: Invalid keyword argument for timeout marker: seconds",
            "ERROR marker_errors::test_bad_method - ConfigValueError: Invalid method fork from marker",
            "*1 passed, 5 errors in *",
        ],
    );
}

#[test]
fn test_nested_markers_override_global_deadline() {
    let output = TesterRun::scenario("nested_groups")
        .args(["--time-unit", "0.5", "--timeout", "0.5"])
        .run();

    output.assert_status(0);
    assert_lines(
        &output.stdout,
        &[
            "nested_groups::test_inner PASSED",
            "nested_groups::test_sibling PASSED",
            "nested_groups::threaded::test_method_only PASSED",
            "*3 passed in *",
        ],
    );
}

#[cfg(unix)]
#[test]
fn test_command_line_beats_environment_and_config_file() {
    let output = TesterRun::scenario("sleep")
        .args(["--time-unit", "0.5", "--timeout", "0.5", "--timeout-method", "signal"])
        .env("WATCHDOG_TIMEOUT", "100")
        .config_file("timeout = 200\n")
        .run();

    output.assert_status(1);
    assert_lines(&output.stdout, &["timeout: 0.5s method: *", "*Failed: Timeout >0.5s"]);
}

#[cfg(unix)]
#[test]
fn test_environment_beats_config_file() {
    let output = TesterRun::scenario("sleep")
        .args(["--time-unit", "0.5", "--timeout-method", "signal"])
        .env("WATCHDOG_TIMEOUT", "0.5")
        .config_file("timeout = 200\ntimeout_method = \"thread\"\n")
        .run();

    output.assert_status(1);
    assert_lines(
        &output.stdout,
        &["timeout: 0.5s method: signal", "*Failed: Timeout >0.5s"],
    );
}

#[test]
fn test_config_file_supplies_every_key() {
    let output = TesterRun::scenario("passing")
        .config_file(
            r#"
timeout = 30
timeout_method = "thread"
timeout_func_only = true
session_timeout = 60
timeout_disable_debugger_detection = false
"#,
        )
        .run();

    output.assert_status(0);
    assert_lines(
        &output.stdout,
        &[
            "scenario: passing",
            "timeout: 30s method: thread",
            "session timeout: 60s",
            "passing::test_pass PASSED",
        ],
    );
}

#[test]
fn test_explicit_config_path() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("custom.toml");
    std::fs::write(&path, "timeout = 12\n").unwrap();

    let output = TesterRun::scenario("passing")
        .args([std::ffi::OsStr::new("--config"), path.as_os_str()])
        .run();

    output.assert_status(0);
    assert_lines(&output.stdout, &["timeout: 12s method: *"]);
}

#[test]
fn test_deprecated_method_flag_still_works() {
    let output = TesterRun::scenario("passing")
        .args(["--timeout", "5", "--timeout_method", "thread", "--log-level", "warn"])
        .run();

    output.assert_status(0);
    assert_lines(&output.stdout, &["timeout: 5s method: thread"]);
    assert!(output.stderr.contains("--timeout_method is deprecated"));
}

#[test]
fn test_no_deadline_means_no_header() {
    let output = TesterRun::scenario("passing").run();

    output.assert_status(0);
    assert_no_line(&output.stdout, "timeout*");
    assert_lines(&output.stdout, &["collected 1 unit", "passing::test_pass PASSED"]);
}

#[test]
fn test_invalid_command_line_value_is_usage_error() {
    let output = TesterRun::scenario("passing").args(["--timeout", "abc"]).run();

    output.assert_status(4);
    assert!(output.stderr.contains("Invalid timeout abc from command line"));
}

#[test]
fn test_invalid_config_file_value_is_usage_error() {
    let output = TesterRun::scenario("passing")
        .config_file("timeout_method = \"fork\"\n")
        .run();

    output.assert_status(4);
    assert!(output.stderr.contains("Invalid method fork from config file"));
}

#[test]
fn test_invalid_environment_value_is_usage_error() {
    let output = TesterRun::scenario("passing")
        .env("WATCHDOG_TIMEOUT", "soon")
        .run();

    output.assert_status(4);
    assert!(
        output
            .stderr
            .contains("Invalid timeout soon from WATCHDOG_TIMEOUT environment variable")
    );
}

#[test]
fn test_unknown_scenario_and_list() {
    let output = TesterRun::scenario("nope").run();
    output.assert_status(4);
    assert!(output.stderr.contains("unknown scenario 'nope'"));

    let output = TesterRun::scenario("passing").args(["--list"]).run();
    output.assert_status(0);
    assert_lines(&output.stdout, &["passing *", "sleep *", "debugger_pause *"]);
}

#[test]
fn test_glob_match() {
    use common::glob_match;

    assert!(glob_match("*Timeout >1s*", "Failed: Timeout >1s"));
    assert!(glob_match("a*c", "abc"));
    assert!(!glob_match("a*c", "abd"));
    assert!(glob_match("exact", "exact"));
    assert!(!glob_match("ab*ba", "aba"));
}
