use crate::db;
use crate::inspector::{self, Config, Inspector, SqliteInspector};
use crate::server::{self, QUEUE_HISTORY_DAYS};
use crate::transform::{to_daily_stats_list, to_queue_state_snapshot};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qscope CLI interface
#[derive(Parser, Debug)]
#[command(name = "qscope", about = "Inspect and administer task queues")]
pub struct Cli {
    /// Path to the shared queue database (default: ./qscope.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8888)]
        port: u16,
    },
    /// Queue administration commands
    #[command(subcommand)]
    Queue(QueueCommands),
}

/// Queue-related CLI subcommands
#[derive(Subcommand, Debug)]
pub enum QueueCommands {
    /// List queues with their current sizes
    List,
    /// Show a queue snapshot and its recent history
    Show {
        /// Queue name
        name: String,
    },
    /// Print daily stats for every queue as JSON
    Stats,
    /// Register a new, empty queue
    Add {
        /// Queue name
        name: String,
    },
    /// Remove a queue
    Remove {
        /// Queue name
        name: String,
        /// Also drop pending, scheduled, retry and archived tasks
        #[arg(long)]
        force: bool,
    },
    /// Pause processing of a queue
    Pause {
        /// Queue name
        name: String,
    },
    /// Resume processing of a paused queue
    Resume {
        /// Queue name
        name: String,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut cfg = Config::default();
        if let Some(db) = self.db {
            cfg.db_path = db;
        }
        match self.command {
            Commands::Serve { port } => server::run_server(port, cfg).await,
            Commands::Queue(cmd) => run_queue_command(cmd, &cfg).await,
        }
    }
}

/// Execute a queue command
pub async fn run_queue_command(cmd: QueueCommands, cfg: &Config) -> Result<()> {
    let pool = inspector::init_pool(cfg).await?;
    let inspector = SqliteInspector::new(pool.clone());

    match cmd {
        QueueCommands::List => {
            let names = inspector.queues().await.context("Error listing queues")?;
            if names.is_empty() {
                println!("No queues found");
                return Ok(());
            }
            println!("{:<20} {:<8} {:<8} {:<8} {:<8}", "NAME", "SIZE", "PENDING", "ACTIVE", "PAUSED");
            for name in names {
                let q = inspector
                    .queue_info(&name)
                    .await
                    .with_context(|| format!("Error fetching queue '{name}'"))?;
                println!(
                    "{:<20} {:<8} {:<8} {:<8} {:<8}",
                    q.queue, q.size, q.pending, q.active, q.paused
                );
            }
        }
        QueueCommands::Show { name } => {
            let info = inspector
                .queue_info(&name)
                .await
                .context("Error fetching queue")?;
            let snap = to_queue_state_snapshot(&info);
            println!("Queue '{}'{}", snap.queue, if snap.paused { " (paused)" } else { "" });
            println!(
                "  size={} pending={} active={} scheduled={} retry={} archived={} completed={}",
                snap.size,
                snap.pending,
                snap.active,
                snap.scheduled,
                snap.retry,
                snap.archived,
                snap.completed
            );
            println!("  latency={}", snap.display_latency);
            println!(
                "  today: processed={} succeeded={} failed={}",
                snap.processed, snap.succeeded, snap.failed
            );
            let history = inspector
                .history(&name, QUEUE_HISTORY_DAYS)
                .await
                .context("Error fetching history")?;
            for day in to_daily_stats_list(&history) {
                println!(
                    "  {} processed={} succeeded={} failed={}",
                    day.date, day.processed, day.succeeded, day.failed
                );
            }
        }
        QueueCommands::Stats => {
            let stats = server::collect_queue_stats(&inspector)
                .await
                .context("Error collecting queue stats")?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        QueueCommands::Add { name } => {
            anyhow::ensure!(!name.is_empty(), "Queue name must not be empty");
            if db::get_queue_by_name(&pool, &name).await?.is_some() {
                anyhow::bail!("Queue '{}' already exists", name);
            }
            let now = chrono::Utc::now().timestamp_millis();
            db::create_queue(&pool, &name, now)
                .await
                .context("Error creating queue")?;
            println!("Created queue '{}'", name);
        }
        QueueCommands::Remove { name, force } => {
            inspector
                .delete_queue(&name, force)
                .await
                .context("Error removing queue")?;
            println!("Removed queue '{}'", name);
        }
        QueueCommands::Pause { name } => {
            inspector
                .pause_queue(&name)
                .await
                .context("Error pausing queue")?;
            println!("Paused queue '{}'", name);
        }
        QueueCommands::Resume { name } => {
            inspector
                .unpause_queue(&name)
                .await
                .context("Error resuming queue")?;
            println!("Resumed queue '{}'", name);
        }
    }
    Ok(())
}
