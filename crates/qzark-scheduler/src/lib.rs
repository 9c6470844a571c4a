//! qzark-scheduler: the poll loop driving task evaluation, execution and
//! notification.
//!
//! Each cycle pops one task, decides whether it is due against an in-memory
//! last-run cache, dispatches due tasks to a bounded worker pool, requeues
//! the task, then pauses. The queue therefore rotates round-robin. An
//! in-flight guard keeps at most one concurrent execution per task name even
//! when a task's interval is shorter than its run time.
//!
//! Check granularity is bounded below by the cycle pause; tasks with
//! intervals near the pause run at pause resolution, not exact intervals.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use qzark_executor::Executor;
use qzark_notify::Notifier;
use qzark_store::TaskQueue;
use qzark_types::Task;

/// Pause between poll cycles.
pub const DEFAULT_CYCLE_PAUSE: Duration = Duration::from_secs(1);

/// Worker-pool size when not overridden.
pub const DEFAULT_WORKERS: usize = 4;

/// Drives the scheduling loop. Owns the last-run cache; the queue, executor
/// and notifier are injected collaborators.
pub struct Scheduler {
    queue: Arc<TaskQueue>,
    executor: Arc<Executor>,
    notifier: Arc<Notifier>,
    last_run: HashMap<String, Instant>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    cycle_pause: Duration,
    workers: usize,
}

impl Scheduler {
    pub fn new(queue: Arc<TaskQueue>, executor: Executor, notifier: Notifier) -> Self {
        Self {
            queue,
            executor: Arc::new(executor),
            notifier: Arc::new(notifier),
            last_run: HashMap::new(),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            cycle_pause: DEFAULT_CYCLE_PAUSE,
            workers: DEFAULT_WORKERS,
        }
    }

    pub fn with_cycle_pause(mut self, pause: Duration) -> Self {
        self.cycle_pause = pause;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Run the loop until the token is cancelled. The in-flight cycle is
    /// finished before exiting, and running workers are joined (each bounded
    /// by the executor's own timeout).
    pub async fn run(mut self, cancel: CancellationToken) {
        info!(workers = self.workers, "Scheduler started");

        let (tx, rx) = mpsc::channel::<Task>(self.workers * 2);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let handles: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|_| {
                spawn_worker(
                    rx.clone(),
                    self.executor.clone(),
                    self.notifier.clone(),
                    self.in_flight.clone(),
                )
            })
            .collect();

        while !cancel.is_cancelled() {
            self.cycle(&tx).await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.cycle_pause) => {}
            }
        }

        // Closing the channel lets each worker finish its current task and
        // drain before exiting.
        drop(tx);
        for handle in handles {
            let _ = handle.await;
        }
        info!("Scheduler stopped");
    }

    /// One poll cycle: pop, due-check, dispatch when due, always requeue.
    /// Queue errors skip the cycle and are retried next time around.
    async fn cycle(&mut self, tx: &mpsc::Sender<Task>) {
        let task = match self.queue.pop() {
            Ok(Some(task)) => task,
            Ok(None) => return,
            Err(e) => {
                warn!("Queue pop failed, skipping cycle: {e}");
                return;
            }
        };

        let now = Instant::now();
        if self.should_dispatch(&task, now) {
            // Last-run is stamped at execution start, not completion.
            self.last_run.insert(task.name.clone(), now);
            self.in_flight.lock().unwrap().insert(task.name.clone());
            if tx.send(task.clone()).await.is_err() {
                self.in_flight.lock().unwrap().remove(&task.name);
                warn!(task = %task.name, "Worker pool is gone, dropping dispatch");
            }
        }

        if let Err(e) = self.queue.requeue(&task) {
            warn!(task = %task.name, "Failed to requeue task: {e}");
        }
    }

    /// A task is dispatched when it is due and not already running.
    /// An absent last-run entry counts as due immediately.
    fn should_dispatch(&self, task: &Task, now: Instant) -> bool {
        let due = self
            .last_run
            .get(&task.name)
            .is_none_or(|last| now.duration_since(*last) >= task.interval());
        due && !self.in_flight.lock().unwrap().contains(&task.name)
    }
}

fn spawn_worker(
    rx: Arc<tokio::sync::Mutex<mpsc::Receiver<Task>>>,
    executor: Arc<Executor>,
    notifier: Arc<Notifier>,
    in_flight: Arc<Mutex<HashSet<String>>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let task = { rx.lock().await.recv().await };
            let Some(task) = task else { break };

            info!(task = %task.name, command = %task.shell_command, "Running task");
            let result = executor.run(&task).await;
            match result.failure_message() {
                None => info!(task = %task.name, "Task completed successfully"),
                Some(message) => {
                    error!(task = %task.name, "Task failed: {message}");
                    notifier.notify(&task.name, message).await;
                }
            }

            in_flight.lock().unwrap().remove(&task.name);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use qzark_notify::NotifyChannel;
    use qzark_store::{MemoryQueue, TaskQueue};

    struct RecordingChannel {
        messages: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&self, message: &str) -> anyhow::Result<()> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
    }

    fn scheduler_with(
        tasks: &[Task],
        messages: Arc<Mutex<Vec<String>>>,
    ) -> (Scheduler, Arc<TaskQueue>) {
        let queue = Arc::new(TaskQueue::Memory(MemoryQueue::new()));
        for task in tasks {
            queue.push(task).unwrap();
        }
        let notifier = Notifier::new(vec![Box::new(RecordingChannel { messages })]);
        let scheduler = Scheduler::new(queue.clone(), Executor::default(), notifier)
            .with_cycle_pause(Duration::from_millis(20));
        (scheduler, queue)
    }

    async fn run_for(scheduler: Scheduler, duration: Duration) {
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            stop.cancel();
        });
        scheduler.run(cancel).await;
    }

    #[test]
    fn test_never_run_task_is_due() {
        let (scheduler, _) = scheduler_with(&[], Arc::new(Mutex::new(Vec::new())));
        let task = Task::new("fresh", 60, "true");
        assert!(scheduler.should_dispatch(&task, Instant::now()));
    }

    #[test]
    fn test_recently_run_task_is_not_due() {
        let (mut scheduler, _) = scheduler_with(&[], Arc::new(Mutex::new(Vec::new())));
        let task = Task::new("recent", 60, "true");
        let now = Instant::now();
        scheduler.last_run.insert(task.name.clone(), now);
        assert!(!scheduler.should_dispatch(&task, now));
    }

    #[test]
    fn test_elapsed_interval_makes_task_due() {
        let (mut scheduler, _) = scheduler_with(&[], Arc::new(Mutex::new(Vec::new())));
        let task = Task::new("stale", 1, "true");
        let now = Instant::now();
        scheduler
            .last_run
            .insert(task.name.clone(), now - Duration::from_secs(2));
        assert!(scheduler.should_dispatch(&task, now));
    }

    #[test]
    fn test_in_flight_task_is_not_dispatched() {
        let (scheduler, _) = scheduler_with(&[], Arc::new(Mutex::new(Vec::new())));
        let task = Task::new("running", 0, "true");
        scheduler
            .in_flight
            .lock()
            .unwrap()
            .insert(task.name.clone());
        assert!(!scheduler.should_dispatch(&task, Instant::now()));
    }

    #[tokio::test]
    async fn test_failing_task_notifies_and_successful_task_does_not() {
        let messages = Arc::new(Mutex::new(Vec::new()));
        let tasks = [
            Task::new("A", 0, "exit 0"),
            Task::new("B", 0, "echo boom >&2; exit 1"),
        ];
        let (scheduler, queue) = scheduler_with(&tasks, messages.clone());

        run_for(scheduler, Duration::from_millis(400)).await;

        let sent = messages.lock().unwrap();
        assert!(!sent.is_empty(), "B must have produced a notification");
        for message in sent.iter() {
            assert!(message.contains("Task 'B' failed."), "got: {message}");
            assert!(message.contains("boom"), "got: {message}");
        }

        // Requeue invariant: both tasks are still in the queue afterwards.
        let mut names = Vec::new();
        while let Some(t) = queue.pop().unwrap() {
            names.push(t.name);
        }
        names.sort();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_task_does_not_run_before_interval_elapses() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("runs.txt");
        let command = format!("echo run >> {}", marker.display());

        let messages = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler_with(&[Task::new("slow-interval", 60, &command)], messages);

        // ~15 cycles at a 20ms pause; the 60s interval allows only one run.
        run_for(scheduler, Duration::from_millis(300)).await;

        let runs = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(runs.lines().count(), 1);
    }

    #[tokio::test]
    async fn test_in_flight_guard_prevents_overlapping_runs() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("runs.txt");
        // Interval 0 makes the task due on every cycle, but it runs longer
        // than the scheduling window.
        let command = format!("echo run >> {}; sleep 1", marker.display());

        let messages = Arc::new(Mutex::new(Vec::new()));
        let (scheduler, _) = scheduler_with(&[Task::new("overlap", 0, &command)], messages);

        run_for(scheduler, Duration::from_millis(300)).await;

        let runs = std::fs::read_to_string(&marker).unwrap();
        assert_eq!(runs.lines().count(), 1, "guard must prevent a second run");
    }

    #[tokio::test]
    async fn test_empty_queue_cycles_idle() {
        let (scheduler, _) = scheduler_with(&[], Arc::new(Mutex::new(Vec::new())));
        // Must simply idle and stop on cancellation.
        run_for(scheduler, Duration::from_millis(100)).await;
    }
}
