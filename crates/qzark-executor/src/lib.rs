//! qzark-executor: runs one task's shell command and classifies the outcome.

use std::process::Stdio;
use std::time::Duration;

use tracing::debug;

use qzark_types::{ExecutionResult, Task};

/// Hard wall-clock bound on a single command when nothing overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Captured output is cut off past this many characters.
const MAX_OUTPUT_CHARS: usize = 200_000;

/// Runs shell commands with a fixed timeout. Holds no task state; retry
/// policy, if any, belongs to the caller.
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
}

impl Executor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute the task's command through `sh -c`, capturing stdout and
    /// stderr as text.
    ///
    /// Exit status 0 classifies as success; anything else — including spawn
    /// failure and timeout — classifies as failure with a descriptive
    /// message.
    pub async fn run(&self, task: &Task) -> ExecutionResult {
        debug!(task = %task.name, command = %task.shell_command, "Executing task command");

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c").arg(&task.shell_command);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return ExecutionResult::failure(format!("failed to start process: {e}")),
            Err(_) => {
                return ExecutionResult::failure(format!(
                    "execution timed out after {}s",
                    self.timeout.as_secs()
                ));
            }
        };

        let stdout = truncate(String::from_utf8_lossy(&output.stdout).into_owned());
        let stderr = truncate(String::from_utf8_lossy(&output.stderr).into_owned());

        ExecutionResult::classify(output.status.success(), stdout, stderr)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_OUTPUT_CHARS {
        // The cut must land on a char boundary or String::truncate panics.
        let mut cut = MAX_OUTPUT_CHARS;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("\n... [output truncated]");
    }
    text
}
