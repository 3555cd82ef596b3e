// Shell runner
// Executes run steps in a subprocess with captured output, a deadline and
// cooperative cancellation.

use crate::execution::report::{FailReason, StepResult};

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

/// Shell types supported by the runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Shell {
    /// Default shell (sh on Unix, cmd on Windows)
    #[default]
    Default,
    /// Bash shell
    Bash,
    /// PowerShell Core (cross-platform)
    Pwsh,
}

impl Shell {
    /// Resolve a `shell:` name from a workflow file. Unknown names fall back
    /// to the default shell.
    pub fn from_name(name: &str) -> Shell {
        match name {
            "bash" => Shell::Bash,
            "pwsh" | "powershell" => Shell::Pwsh,
            _ => Shell::Default,
        }
    }

    /// Get the shell executable and arguments
    fn get_command(&self) -> (&'static str, &'static [&'static str]) {
        match self {
            Shell::Default => {
                if cfg!(target_os = "windows") {
                    ("cmd", &["/C"])
                } else {
                    ("sh", &["-c"])
                }
            }
            Shell::Bash => ("bash", &["-c"]),
            Shell::Pwsh => ("pwsh", &["-NoLogo", "-NoProfile", "-Command"]),
        }
    }
}

/// Per-stream capture limit. Output beyond this is dropped with a marker so a
/// chatty step cannot balloon the report.
const MAX_CAPTURED_BYTES: usize = 1 << 20;

/// Callback for handling output lines in real-time
pub type OutputLineFn = Arc<dyn Fn(&str, bool) + Send + Sync>;

/// Output collected from one command invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub terminated: bool,
    pub launch_error: Option<String>,
}

impl CommandOutput {
    /// Convert raw command output into a step result. All process-level
    /// failures become a `FailReason`; nothing here is an error to propagate.
    pub fn into_step_result(
        self,
        id: Option<String>,
        name: String,
        duration: Duration,
    ) -> StepResult {
        if let Some(message) = self.launch_error {
            return StepResult::failed(
                id,
                name,
                FailReason::LaunchError(message),
                self.stdout,
                self.stderr,
                None,
                duration,
            );
        }
        if self.timed_out {
            return StepResult::failed(
                id,
                name,
                FailReason::Timeout,
                self.stdout,
                self.stderr,
                None,
                duration,
            );
        }
        if self.terminated {
            return StepResult::failed(
                id,
                name,
                FailReason::Terminated,
                self.stdout,
                self.stderr,
                None,
                duration,
            );
        }
        match self.exit_code {
            Some(0) => {
                StepResult::succeeded(id, name, self.stdout, self.stderr, Some(0), duration)
            }
            Some(code) => StepResult::failed(
                id,
                name,
                FailReason::NonZeroExit(code),
                self.stdout,
                self.stderr,
                Some(code),
                duration,
            ),
            None => StepResult::failed(
                id,
                name,
                FailReason::Terminated,
                self.stdout,
                self.stderr,
                None,
                duration,
            ),
        }
    }
}

/// Shell runner for executing commands
#[derive(Debug, Clone, Copy, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        ShellRunner
    }

    /// Execute a command, returning its captured output. Never returns an
    /// error: spawn failures, timeouts and cancellation are all recorded in
    /// the output.
    #[allow(clippy::too_many_arguments)]
    pub async fn run(
        &self,
        command: &str,
        shell: Shell,
        env: &HashMap<String, String>,
        working_dir: &Path,
        timeout: Duration,
        cancel: &CancellationToken,
        on_line: Option<OutputLineFn>,
    ) -> CommandOutput {
        let (shell_cmd, shell_args) = shell.get_command();

        // Resolve the shell executable up front so a missing shell is a
        // launch error rather than an opaque spawn failure.
        if let Err(e) = which::which(shell_cmd) {
            return CommandOutput {
                launch_error: Some(format!("shell '{}' not found: {}", shell_cmd, e)),
                ..Default::default()
            };
        }

        let mut cmd = Command::new(shell_cmd);
        cmd.args(shell_args);
        cmd.arg(command);
        cmd.current_dir(working_dir);
        cmd.envs(env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CommandOutput {
                    launch_error: Some(format!(
                        "failed to spawn shell process '{}': {}",
                        shell_cmd, e
                    )),
                    ..Default::default()
                };
            }
        };

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");

        let stdout_handle = spawn_capture(stdout, false, on_line.clone());
        let stderr_handle = spawn_capture(stderr, true, on_line);

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                WaitOutcome::Terminated
            }
            result = tokio::time::timeout(timeout, child.wait()) => match result {
                Ok(Ok(status)) => WaitOutcome::Exited(status.code()),
                Ok(Err(_)) => WaitOutcome::Exited(None),
                Err(_) => {
                    let _ = child.kill().await;
                    WaitOutcome::TimedOut
                }
            },
        };

        let stdout = stdout_handle.await.unwrap_or_default();
        let stderr = stderr_handle.await.unwrap_or_default();

        match outcome {
            WaitOutcome::Exited(exit_code) => CommandOutput {
                stdout,
                stderr,
                exit_code,
                ..Default::default()
            },
            WaitOutcome::TimedOut => CommandOutput {
                stdout,
                stderr,
                timed_out: true,
                ..Default::default()
            },
            WaitOutcome::Terminated => CommandOutput {
                stdout,
                stderr,
                terminated: true,
                ..Default::default()
            },
        }
    }
}

enum WaitOutcome {
    Exited(Option<i32>),
    TimedOut,
    Terminated,
}

/// Read a stream line by line, forwarding each line to the callback and
/// capturing up to the per-stream limit.
fn spawn_capture(
    stream: impl AsyncRead + Unpin + Send + 'static,
    is_error: bool,
    on_line: Option<OutputLineFn>,
) -> tokio::task::JoinHandle<String> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        let mut captured = String::new();
        let mut truncated = false;
        while let Ok(Some(line)) = lines.next_line().await {
            if let Some(on_line) = &on_line {
                on_line(&line, is_error);
            }
            if captured.len() + line.len() > MAX_CAPTURED_BYTES {
                if !truncated {
                    captured.push_str("\n[output truncated]");
                    truncated = true;
                }
                continue;
            }
            if !captured.is_empty() {
                captured.push('\n');
            }
            captured.push_str(&line);
        }
        captured
    })
}
