//! Task-definition file loading.
//!
//! The file is a YAML document with a top-level `tasks` list. Records
//! missing `name` or `shell_command` are skipped with a warning; valid
//! records are loaded in document order.

use std::path::Path;

use serde::Deserialize;
use tracing::{error, info, warn};

use qzark_types::{DEFAULT_INTERVAL_SECONDS, Task};

#[derive(Debug, Deserialize)]
struct TaskFile {
    #[serde(default)]
    tasks: Vec<RawTaskRecord>,
}

/// One record as it appears on disk. Every field is optional so a malformed
/// entry can be skipped instead of failing the whole document.
#[derive(Debug, Deserialize)]
struct RawTaskRecord {
    name: Option<String>,
    interval_seconds: Option<u64>,
    shell_command: Option<String>,
}

/// Load tasks from a YAML file. A missing or unparseable file yields an
/// empty list; the process keeps running with zero tasks.
pub fn load_tasks(path: &Path) -> Vec<Task> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read tasks file {}: {e}", path.display());
            return Vec::new();
        }
    };

    let tasks = parse_tasks(&content);
    info!("Loaded {} tasks from '{}'", tasks.len(), path.display());
    tasks
}

/// Parse a YAML task document, skipping invalid records.
pub fn parse_tasks(content: &str) -> Vec<Task> {
    let file: TaskFile = match serde_yaml::from_str(content) {
        Ok(file) => file,
        Err(e) => {
            error!("Failed to parse tasks YAML: {e}");
            return Vec::new();
        }
    };

    let mut tasks = Vec::new();
    for (idx, record) in file.tasks.into_iter().enumerate() {
        let (name, shell_command) = match (record.name, record.shell_command) {
            (Some(name), Some(cmd)) if !name.trim().is_empty() && !cmd.trim().is_empty() => {
                (name, cmd)
            }
            _ => {
                warn!("Skipping invalid task definition at index {idx}: name and shell_command are required");
                continue;
            }
        };
        let interval = record.interval_seconds.unwrap_or(DEFAULT_INTERVAL_SECONDS);
        tasks.push(Task::new(name, interval, shell_command));
    }
    tasks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_document() {
        let yaml = r#"
tasks:
  - name: heartbeat
    interval_seconds: 30
    shell_command: "curl -fsS https://example.com/ping"
  - name: cleanup
    shell_command: "rm -f /tmp/qzark-*.tmp"
"#;
        let tasks = parse_tasks(yaml);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "heartbeat");
        assert_eq!(tasks[0].interval_seconds, 30);
        assert_eq!(tasks[1].interval_seconds, 60, "interval defaults to 60s");
    }

    #[test]
    fn test_parse_skips_record_missing_name() {
        let yaml = r#"
tasks:
  - name: ok-task
    shell_command: "true"
  - interval_seconds: 10
    shell_command: "echo no name"
  - name: also-ok
    shell_command: "true"
"#;
        let tasks = parse_tasks(yaml);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].name, "ok-task");
        assert_eq!(tasks[1].name, "also-ok");
    }

    #[test]
    fn test_parse_skips_record_missing_command() {
        let yaml = r#"
tasks:
  - name: no-command
    interval_seconds: 10
"#;
        assert!(parse_tasks(yaml).is_empty());
    }

    #[test]
    fn test_parse_preserves_document_order() {
        let yaml = r#"
tasks:
  - {name: a, shell_command: "true"}
  - {name: b, shell_command: "true"}
  - {name: c, shell_command: "true"}
"#;
        let names: Vec<_> = parse_tasks(yaml).into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_bad_yaml_yields_empty() {
        assert!(parse_tasks("tasks: [unterminated").is_empty());
        assert!(parse_tasks("").is_empty());
    }

    #[test]
    fn test_load_missing_file_yields_empty() {
        let tasks = load_tasks(Path::new("/nonexistent/qzark-tasks.yaml"));
        assert!(tasks.is_empty());
    }
}
