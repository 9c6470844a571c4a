//! qzark-store: the task queue between scheduling cycles.
//!
//! Two backends satisfy the same push/pop/requeue contract: an ephemeral
//! in-process FIFO and a SQLite-backed FIFO that survives restarts.
//! Concurrent access to one SQLite queue from multiple scheduler processes
//! is assumed not to happen; nothing here enforces cross-process exclusion.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension};
use thiserror::Error;

use qzark_types::Task;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("corrupt queue entry: {0}")]
    CorruptEntry(#[from] serde_json::Error),
    #[error("unknown queue backend '{0}' (expected 'memory' or 'sqlite://<path>')")]
    UnknownBackend(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Which backend the queue runs on, parsed from the CLI `--queue` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueBackend {
    Memory,
    Sqlite(PathBuf),
}

impl FromStr for QueueBackend {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        if s.eq_ignore_ascii_case("memory") {
            Ok(Self::Memory)
        } else if let Some(path) = s.strip_prefix("sqlite://") {
            if path.is_empty() {
                return Err(StoreError::UnknownBackend(s.to_string()));
            }
            Ok(Self::Sqlite(PathBuf::from(path)))
        } else {
            Err(StoreError::UnknownBackend(s.to_string()))
        }
    }
}

/// The task queue, dispatching to one of the two backends.
pub enum TaskQueue {
    Memory(MemoryQueue),
    Sqlite(SqliteQueue),
}

impl TaskQueue {
    /// Open a queue for the selected backend.
    ///
    /// An unreachable persistent backend fails here, which callers treat as
    /// fatal at startup.
    pub fn open(backend: &QueueBackend) -> Result<Self> {
        match backend {
            QueueBackend::Memory => Ok(Self::Memory(MemoryQueue::new())),
            QueueBackend::Sqlite(path) => Ok(Self::Sqlite(SqliteQueue::open(path)?)),
        }
    }

    /// Append a task to the tail.
    pub fn push(&self, task: &Task) -> Result<()> {
        match self {
            Self::Memory(q) => q.push(task),
            Self::Sqlite(q) => q.push(task),
        }
    }

    /// Remove and return the head, or `None` when the queue is empty.
    /// Never blocks.
    pub fn pop(&self) -> Result<Option<Task>> {
        match self {
            Self::Memory(q) => Ok(q.pop()),
            Self::Sqlite(q) => q.pop(),
        }
    }

    /// Reinsert a task at the tail for a future cycle.
    pub fn requeue(&self, task: &Task) -> Result<()> {
        self.push(task)
    }

    pub fn len(&self) -> Result<usize> {
        match self {
            Self::Memory(q) => Ok(q.len()),
            Self::Sqlite(q) => q.len(),
        }
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Seed the queue with the loaded task list at startup.
    ///
    /// A persistent queue carrying entries from a previous run keeps them;
    /// seeding only fills an empty queue, so a restart does not duplicate
    /// tasks already on disk.
    pub fn seed(&self, tasks: &[Task]) -> Result<usize> {
        let existing = self.len()?;
        if existing > 0 {
            tracing::info!("Queue already holds {existing} entries, skipping seed");
            return Ok(0);
        }
        for task in tasks {
            self.push(task)?;
        }
        Ok(tasks.len())
    }
}

/// Ephemeral FIFO backed by a `VecDeque`, valid for one process lifetime.
pub struct MemoryQueue {
    inner: Mutex<VecDeque<Task>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
        }
    }

    fn push(&self, task: &Task) -> Result<()> {
        self.inner.lock().unwrap().push_back(task.clone());
        Ok(())
    }

    fn pop(&self) -> Option<Task> {
        self.inner.lock().unwrap().pop_front()
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable FIFO stored in a SQLite table, one JSON payload per row.
pub struct SqliteQueue {
    conn: Mutex<Connection>,
}

impl SqliteQueue {
    /// Open or create the queue database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;

             CREATE TABLE IF NOT EXISTS task_queue (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 payload TEXT NOT NULL,
                 enqueued_at TEXT NOT NULL
             );",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn push(&self, task: &Task) -> Result<()> {
        let payload = serde_json::to_string(task)?;
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO task_queue (payload, enqueued_at) VALUES (?1, ?2)",
            rusqlite::params![payload, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn pop(&self) -> Result<Option<Task>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT id, payload FROM task_queue ORDER BY id LIMIT 1",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((id, payload)) = row else {
            return Ok(None);
        };
        conn.execute("DELETE FROM task_queue WHERE id = ?1", rusqlite::params![id])?;
        let task: Task = serde_json::from_str(&payload)?;
        Ok(Some(task))
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM task_queue", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
