// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Sequences `header.scripts` in declaration order, honoring each action's
//! `run_if` gate, timeout, and hidden/show-in-ui flags.

use std::{path::Path, process::Command, time::Duration};

use inspa_config::RunIf;

use crate::{
    container::header::ScriptEntry,
    progress::{ProgressEvent, ProgressSink},
    shell, Error,
};

/// Outcome of a single post-install action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Skipped,
    Succeeded,
    Failed { exit_code: Option<i32> },
    TimedOut,
}

/// Result of running the full script list: the per-action outcomes plus
/// whether any non-skipped action failed or timed out (non-fatal by
/// default — see [`crate::error::Error::ScriptFailed`]).
pub struct RunReport {
    pub outcomes: Vec<ActionOutcome>,
    pub had_failure: bool,
}

/// Runs `scripts` in order inside `install_dir`, forwarding captured output
/// to `progress` for actions with `show_in_ui = true`. A non-zero exit or a
/// timeout does not abort the sequence; it is recorded and subsequent
/// actions are still gated by their own `run_if`.
pub fn run_all(scripts: &[ScriptEntry], install_dir: &Path, progress: &ProgressSink) -> RunReport {
    let mut outcomes = Vec::with_capacity(scripts.len());
    let mut any_prior_failed = false;

    for script in scripts {
        progress.send(ProgressEvent::PhaseChanged(format!(
            "running script: {}",
            script.command
        )));

        let should_run = match script.run_if {
            RunIf::Always => true,
            RunIf::Success => !any_prior_failed,
            RunIf::Failure => any_prior_failed,
        };

        if !should_run {
            outcomes.push(ActionOutcome::Skipped);
            continue;
        }

        let outcome = run_one(script, install_dir, progress);
        if matches!(
            outcome,
            ActionOutcome::Failed { .. } | ActionOutcome::TimedOut
        ) {
            any_prior_failed = true;
            let message = match &outcome {
                ActionOutcome::Failed { exit_code } => {
                    Error::ScriptFailed(*exit_code, script.command.clone()).to_string()
                }
                ActionOutcome::TimedOut => {
                    Error::ScriptTimedOut(script.timeout_sec, script.command.clone()).to_string()
                }
                _ => unreachable!(),
            };
            progress.send(ProgressEvent::LogLine(message));
        }
        outcomes.push(outcome);
    }

    RunReport {
        had_failure: any_prior_failed,
        outcomes,
    }
}

fn run_one(script: &ScriptEntry, install_dir: &Path, progress: &ProgressSink) -> ActionOutcome {
    let command = build_command(script, install_dir);
    let timeout = Duration::from_secs(script.timeout_sec);

    match shell::run_with_capture(command, timeout, script.show_in_ui, progress) {
        Ok(output) if output.timed_out => ActionOutcome::TimedOut,
        Ok(output) if output.status.map(|s| s.success()).unwrap_or(false) => {
            ActionOutcome::Succeeded
        }
        Ok(output) => ActionOutcome::Failed {
            exit_code: output.status.and_then(|s| s.code()),
        },
        Err(_) => ActionOutcome::Failed { exit_code: None },
    }
}

/// Builds the interpreter invocation for `script`, per the interpreter
/// selection contract: PowerShell gets `-NoProfile -ExecutionPolicy Bypass
/// -File <command>`, batch gets the command interpreter's `/C <command>`.
fn build_command(script: &ScriptEntry, install_dir: &Path) -> Command {
    let mut cmd = match script.kind {
        inspa_config::ScriptType::Powershell => {
            let mut c = Command::new(powershell_executable());
            c.arg("-NoProfile")
                .arg("-ExecutionPolicy")
                .arg("Bypass")
                .arg("-File")
                .arg(&script.command);
            c
        }
        inspa_config::ScriptType::Batch => {
            let mut c = Command::new(command_interpreter());
            c.arg("/C").arg(&script.command);
            c
        }
    };

    cmd.args(&script.args);
    cmd.current_dir(install_dir);
    cmd
}

#[cfg(target_os = "windows")]
fn powershell_executable() -> &'static str {
    "powershell.exe"
}

#[cfg(not(target_os = "windows"))]
fn powershell_executable() -> &'static str {
    "pwsh"
}

#[cfg(target_os = "windows")]
fn command_interpreter() -> &'static str {
    "cmd.exe"
}

#[cfg(not(target_os = "windows"))]
fn command_interpreter() -> &'static str {
    "sh"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn batch(command: &str, run_if: RunIf) -> ScriptEntry {
        ScriptEntry {
            kind: inspa_config::ScriptType::Batch,
            command: command.to_string(),
            args: vec![],
            timeout_sec: 5,
            run_if,
            hidden: true,
            show_in_ui: false,
        }
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn failure_does_not_abort_subsequent_always_actions() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![batch("exit 1", RunIf::Always), batch("exit 0", RunIf::Always)];
        let (tx, _rx) = mpsc::channel();
        let progress = ProgressSink::new(tx);

        let report = run_all(&scripts, dir.path(), &progress);
        assert!(report.had_failure);
        assert_eq!(report.outcomes.len(), 2);
        assert!(matches!(report.outcomes[1], ActionOutcome::Succeeded));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn run_if_failure_only_runs_after_a_prior_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![batch("exit 0", RunIf::Always), batch("exit 0", RunIf::Failure)];
        let (tx, _rx) = mpsc::channel();
        let progress = ProgressSink::new(tx);

        let report = run_all(&scripts, dir.path(), &progress);
        assert!(matches!(report.outcomes[1], ActionOutcome::Skipped));
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn run_if_success_skips_after_a_prior_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = vec![batch("exit 1", RunIf::Always), batch("exit 0", RunIf::Success)];
        let (tx, _rx) = mpsc::channel();
        let progress = ProgressSink::new(tx);

        let report = run_all(&scripts, dir.path(), &progress);
        assert!(matches!(report.outcomes[1], ActionOutcome::Skipped));
    }
}
