//! qzark-types: shared value types for the Qzark task runner.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Interval applied when a task definition omits `interval_seconds`.
pub const DEFAULT_INTERVAL_SECONDS: u64 = 60;

/// A named, interval-scheduled shell command.
///
/// Tasks are created once at load time and never mutated. The serde shape
/// (`{name, interval_seconds, shell_command}`) is shared by the task
/// definition file and the persistent queue backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Unique task identifier.
    pub name: String,
    /// Seconds between scheduled runs.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Command line executed through the shell.
    pub shell_command: String,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECONDS
}

impl Task {
    pub fn new(name: impl Into<String>, interval_seconds: u64, shell_command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval_seconds,
            shell_command: shell_command.into(),
        }
    }

    /// Scheduling interval as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Outcome of one command execution. Consumed immediately by the scheduler,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success {
        stdout: String,
        stderr: String,
    },
    Failure {
        message: String,
    },
}

impl ExecutionResult {
    /// Classify a finished process by exit status and captured output.
    ///
    /// A non-zero exit produces a failure whose message is the trimmed
    /// stderr, falling back to trimmed stdout, falling back to
    /// "Unknown error".
    pub fn classify(exited_zero: bool, stdout: String, stderr: String) -> Self {
        if exited_zero {
            return Self::Success { stdout, stderr };
        }
        let message = {
            let err = stderr.trim();
            if !err.is_empty() {
                err.to_string()
            } else {
                let out = stdout.trim();
                if !out.is_empty() {
                    out.to_string()
                } else {
                    "Unknown error".to_string()
                }
            }
        };
        Self::Failure { message }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Error message for a failed run, if any.
    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Failure { message } => Some(message),
            Self::Success { .. } => None,
        }
    }
}
