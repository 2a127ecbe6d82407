//! Common test utilities and infrastructure
//!
//! Drives the `tester` binary as a subprocess from a scratch working
//! directory, so no stray `watchdog.toml` or `.env` leaks into a run.

#![allow(dead_code)]

use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// A configured invocation of the runner
pub struct TesterRun {
    command: Command,
    dir: TempDir,
}

impl TesterRun {
    pub fn scenario(name: &str) -> Self {
        let dir = TempDir::new().expect("scratch directory");
        let mut command = Command::new(env!("CARGO_BIN_EXE_tester"));
        command
            .current_dir(dir.path())
            .env_remove("WATCHDOG_TIMEOUT")
            .env_remove("RUST_LOG")
            .args(["--scenario", name]);
        Self { command, dir }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        self.command.args(args);
        self
    }

    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.command.env(key, value);
        self
    }

    /// Write `watchdog.toml` into the working directory
    pub fn config_file(self, content: &str) -> Self {
        fs::write(self.dir.path().join("watchdog.toml"), content).expect("write config");
        self
    }

    pub fn run(mut self) -> RunOutput {
        let output = self.command.output().expect("spawn tester");
        RunOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

/// Exit status and both streams of a finished run
#[derive(Debug)]
pub struct RunOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    pub fn assert_status(&self, expected: i32) {
        assert_eq!(
            self.status,
            Some(expected),
            "unexpected exit status\n--- stdout ---\n{}\n--- stderr ---\n{}",
            self.stdout,
            self.stderr
        );
    }
}

/// Glob match where `*` stands for any run of characters
pub fn glob_match(pattern: &str, line: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == line;
    }

    let (first, last) = (parts[0], parts[parts.len() - 1]);
    if !line.starts_with(first) || line.len() < first.len() + last.len() {
        return false;
    }
    let mut rest = &line[first.len()..];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(index) => rest = &rest[index + part.len()..],
            None => return false,
        }
    }
    rest.ends_with(last)
}

/// Assert that lines matching each pattern appear in `text`, in order
pub fn assert_lines(text: &str, patterns: &[&str]) {
    let mut lines = text.lines();
    for pattern in patterns {
        if !lines.any(|line| glob_match(pattern, line)) {
            panic!("no line matching {pattern:?} (in order) in:\n{text}");
        }
    }
}

/// Assert that no line of `text` matches `pattern`
pub fn assert_no_line(text: &str, pattern: &str) {
    if let Some(line) = text.lines().find(|line| glob_match(pattern, line)) {
        panic!("unexpected line {line:?} matching {pattern:?} in:\n{text}");
    }
}
