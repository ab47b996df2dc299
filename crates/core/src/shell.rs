// Copyright 2019-2023 Tauri Programme within The Commons Conservancy
// Copyright 2023-2023 CrabNebula Ltd.
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Line-buffered child process output capture, forwarded to a
//! [`crate::progress::ProgressSink`] instead of directly to stdout/stderr.

use std::{
    io::{BufRead, BufReader},
    process::{Child, ExitStatus, Stdio},
    sync::mpsc,
    time::{Duration, Instant},
};

use crate::progress::{ProgressEvent, ProgressSink};

/// Output captured from a finished or timed-out child process.
pub struct CapturedOutput {
    pub status: Option<ExitStatus>,
    pub timed_out: bool,
}

/// Spawns `command`, capturing stdout/stderr line-by-line on background
/// threads and forwarding each line to `progress` as a [`ProgressEvent::LogLine`]
/// when `show_in_ui` is set (always appended to the install log by the caller
/// regardless). Kills the process tree if it runs past `timeout`.
pub fn run_with_capture(
    mut command: std::process::Command,
    timeout: Duration,
    show_in_ui: bool,
    progress: &ProgressSink,
) -> std::io::Result<CapturedOutput> {
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    tracing::debug!("Running script `{command:?}`");
    let mut child = command.spawn()?;

    let stdout = child.stdout.take().map(BufReader::new);
    let stderr = child.stderr.take().map(BufReader::new);
    let (line_tx, line_rx) = mpsc::channel::<String>();

    if let Some(stdout) = stdout {
        spawn_line_reader(stdout, "stdout", line_tx.clone());
    }
    if let Some(stderr) = stderr {
        spawn_line_reader(stderr, "stderr", line_tx.clone());
    }
    drop(line_tx);

    let start = Instant::now();
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if start.elapsed() > timeout {
            kill_tree(&mut child);
            break None;
        }
        while let Ok(line) = line_rx.try_recv() {
            forward_line(&line, show_in_ui, progress);
        }
        std::thread::sleep(Duration::from_millis(20));
    };

    for line in line_rx.try_iter() {
        forward_line(&line, show_in_ui, progress);
    }

    Ok(CapturedOutput {
        timed_out: status.is_none(),
        status,
    })
}

fn forward_line(line: &str, show_in_ui: bool, progress: &ProgressSink) {
    tracing::debug!(shell = "script", "{line}");
    if show_in_ui {
        progress.send(ProgressEvent::LogLine(line.to_string()));
    }
}

fn spawn_line_reader(mut reader: impl BufRead + Send + 'static, _stream: &'static str, tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

#[cfg(target_os = "windows")]
fn kill_tree(child: &mut Child) {
    let pid = child.id();
    let _ = std::process::Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/T", "/F"])
        .output();
    let _ = child.kill();
}

#[cfg(not(target_os = "windows"))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;

    #[cfg(not(target_os = "windows"))]
    fn echo_command(text: &str) -> std::process::Command {
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg(format!("echo {text}"));
        cmd
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn captures_stdout_lines() {
        let (tx, _rx) = std_mpsc::channel();
        let progress = ProgressSink::new(tx);
        let output = run_with_capture(
            echo_command("hello-from-script"),
            Duration::from_secs(5),
            true,
            &progress,
        )
        .unwrap();
        assert!(!output.timed_out);
        assert!(output.status.unwrap().success());
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn timeout_kills_long_running_command() {
        let (tx, _rx) = std_mpsc::channel();
        let progress = ProgressSink::new(tx);
        let mut cmd = std::process::Command::new("sh");
        cmd.arg("-c").arg("sleep 5");
        let output =
            run_with_capture(cmd, Duration::from_millis(100), false, &progress).unwrap();
        assert!(output.timed_out);
    }
}
