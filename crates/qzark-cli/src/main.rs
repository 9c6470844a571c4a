//! qzark: crontab-like runner for interval-scheduled shell commands with
//! failure notifications.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use qzark_config::Settings;
use qzark_executor::Executor;
use qzark_notify::Notifier;
use qzark_scheduler::Scheduler;
use qzark_store::{QueueBackend, TaskQueue};

#[derive(Parser)]
#[command(
    name = "qzark",
    about = "Crontab-like task runner that executes shell commands on per-task intervals and alerts on failure"
)]
struct Cli {
    /// Path to the YAML task definition file
    #[arg(long, default_value = "tasks.yaml")]
    tasks_file: PathBuf,

    /// Timeout in seconds for command execution. Must be between 10 and 300.
    #[arg(long, value_parser = clap::value_parser!(u64).range(10..=300))]
    timeout: Option<u64>,

    /// Logging level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Queue backend: "memory" or "sqlite://<path>"
    #[arg(long, default_value = "memory")]
    queue: QueueBackend,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Info,
    Debug,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Debug => "debug",
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_directive = cli.log_level.map(LogLevel::directive).unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive)),
        )
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting qzark");

    let mut settings = Settings::from_env().context("failed to load settings")?;
    if let Some(secs) = cli.timeout {
        settings = settings
            .with_timeout_override(secs)
            .context("invalid timeout override")?;
    }

    // The executor's hard bound stays at its 300s default unless an explicit
    // timeout was supplied via the CLI or environment.
    let exec_timeout = settings
        .timeout_seconds
        .map(Duration::from_secs)
        .unwrap_or(qzark_executor::DEFAULT_TIMEOUT);
    info!("Using execution timeout: {}s", exec_timeout.as_secs());

    let tasks = qzark_config::load_tasks(&cli.tasks_file);
    if tasks.is_empty() {
        warn!(
            "No tasks loaded from '{}'; the scheduler will idle",
            cli.tasks_file.display()
        );
    }

    // An unreachable persistent backend is fatal here, before the loop starts.
    let queue = TaskQueue::open(&cli.queue).context("failed to open task queue")?;
    let seeded = queue.seed(&tasks).context("failed to seed task queue")?;
    info!("Seeded {seeded} tasks into the queue");

    let notifier = Notifier::from_settings(&settings);
    if notifier.channel_count() == 0 {
        warn!("No notification channels configured; failures will only be logged");
    } else {
        info!("{} notification channels enabled", notifier.channel_count());
    }

    let scheduler = Scheduler::new(
        std::sync::Arc::new(queue),
        Executor::new(exec_timeout),
        notifier,
    );

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping scheduler after the current cycle");
            stop.cancel();
        }
    });

    scheduler.run(cancel).await;
    info!("qzark finished");
    Ok(())
}
