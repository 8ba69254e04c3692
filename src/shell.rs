//! Shell command execution with timeout and formatted-blob assembly
//! (spec §4.5).

use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// The raw result of running a shell command.
#[derive(Debug, Clone)]
pub struct ExecResult {
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error (with a timeout notice appended, if any).
    pub stderr: String,
    /// Process exit code. On timeout this is the platform's
    /// terminated-process code (`124`, matching the POSIX `timeout(1)`
    /// convention, since the process is killed rather than exiting on its
    /// own).
    pub exit_code: i32,
}

/// The platform-independent "terminated by us" exit code used when a
/// command is killed after exceeding its timeout.
const TIMEOUT_EXIT_CODE: i32 = 124;

/// Runs `command` through a system shell, capturing stdout/stderr.
///
/// On timeout, the process is killed and `"\nCommand timed out after
/// <timeout>s"` is appended to stderr; whatever was captured before the
/// kill is still returned.
pub async fn run(command: &str, cwd: Option<&Path>, timeout_duration: Duration) -> ExecResult {
    let mut shell = TokioCommand::new("sh");
    shell
        .arg("-c")
        .arg(command)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        shell.current_dir(dir);
    }

    let Ok(mut child) = shell.spawn() else {
        return ExecResult {
            stdout: String::new(),
            stderr: "failed to spawn shell".to_string(),
            exit_code: -1,
        };
    };

    // Taken before awaiting `wait()` so they're still available to drain on
    // the happy path without needing to consume `child` by value (which
    // would make it unreachable for `kill()` on the timeout path).
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    match timeout(timeout_duration, child.wait()).await {
        Ok(Ok(status)) => {
            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stdout_buf).await;
            }
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stderr_buf).await;
            }
            ExecResult {
                stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_buf).into_owned(),
                exit_code: status.code().unwrap_or(-1),
            }
        }
        Ok(Err(_)) => ExecResult {
            stdout: String::new(),
            stderr: "failed to wait on shell process".to_string(),
            exit_code: -1,
        },
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;

            let mut stdout_buf = Vec::new();
            let mut stderr_buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stdout_buf).await;
            }
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut stderr_buf).await;
            }

            let mut stderr = String::from_utf8_lossy(&stderr_buf).into_owned();
            stderr.push_str(&format!("\nCommand timed out after {}s", timeout_duration.as_secs()));

            ExecResult {
                stdout: String::from_utf8_lossy(&stdout_buf).into_owned(),
                stderr,
                exit_code: TIMEOUT_EXIT_CODE,
            }
        }
    }
}

/// Formats `(stdout, stderr, exit_code)` plus timing into the blob the
/// chunker splits.
///
/// `received_at` marks when the controller's command frame was received;
/// `exec_start`/`exec_done` bracket the actual execution.
#[must_use]
pub fn format_blob(
    stdout: &str,
    stderr: &str,
    received_at: Instant,
    exec_start: Instant,
    exec_done: Instant,
) -> String {
    let mut combined = stdout.to_string();
    if !stderr.is_empty() {
        if !combined.is_empty() {
            combined.push('\n');
        }
        combined.push_str(stderr);
    }
    let combined = combined.trim();
    let combined = if combined.is_empty() { "<no output>" } else { combined };

    let total = exec_done.saturating_duration_since(received_at).as_secs_f64();
    let exec = exec_done.saturating_duration_since(exec_start).as_secs_f64();
    format!("{combined}\nTiming: total={total:.3}s exec={exec:.3}s\nDone")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let result = run("echo hello", None, Duration::from_secs(5)).await;
        assert_eq!(result.stdout.trim(), "hello");
        assert_eq!(result.exit_code, 0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_preserved() {
        let result = run("exit 7", None, Duration::from_secs(5)).await;
        assert_eq!(result.exit_code, 7);
    }

    #[tokio::test]
    async fn timeout_kills_process_and_annotates_stderr() {
        let result = run("sleep 5", None, Duration::from_millis(100)).await;
        assert_eq!(result.exit_code, TIMEOUT_EXIT_CODE);
        assert!(result.stderr.contains("Command timed out after"));
    }

    #[tokio::test]
    async fn runs_in_given_working_directory() {
        let dir = tempfile::tempdir().unwrap_or_else(|_| unreachable!());
        let result = run("pwd", Some(dir.path()), Duration::from_secs(5)).await;
        assert_eq!(result.stdout.trim(), dir.path().to_string_lossy());
    }

    #[test]
    fn format_blob_reports_no_output_when_empty() {
        let now = Instant::now();
        let blob = format_blob("", "", now, now, now);
        assert!(blob.starts_with("<no output>\nTiming:"));
        assert!(blob.ends_with("\nDone"));
    }

    #[test]
    fn format_blob_joins_stdout_and_stderr() {
        let now = Instant::now();
        let blob = format_blob("out", "err", now, now, now);
        assert!(blob.starts_with("out\nerr\nTiming:"));
    }
}
