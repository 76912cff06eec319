//! Cycle runner for the escalation engine.
//!
//! Designed to be invoked by an external timer (cron, systemd timer). One
//! invocation runs one full evaluation cycle and prints the run report as
//! JSON on stdout; logs go to stderr.
//!
//! ```bash
//! # Run one cycle against the local stores
//! escalation-cycle --requests requests.json --directory directory.json
//!
//! # Dry run at a fixed instant (no outbox writes)
//! escalation-cycle --dry-run --now 2026-03-04T09:00:00Z
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;

use escalation::engine::{EngineConfig, EscalationEngine};
use escalation::ports::NotificationSender;
use escalation::store::{JsonStore, LogNotifier, OutboxNotifier};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the service-request store
    #[arg(long, default_value = "requests.json")]
    requests: PathBuf,

    /// Path to the directory file (contacts keyed by requester_ref)
    #[arg(long, default_value = "directory.json")]
    directory: PathBuf,

    /// Append dispatched notices to this JSONL outbox
    #[arg(long, default_value = "outbox.jsonl")]
    outbox: PathBuf,

    /// Log notices instead of writing the outbox
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Evaluation instant override (RFC 3339); defaults to now
    #[arg(long)]
    now: Option<DateTime<Utc>>,

    /// Maximum candidates processed in parallel
    #[arg(long, default_value_t = 4)]
    max_parallel: usize,

    /// Whole-cycle deadline in seconds
    #[arg(long, default_value_t = 180)]
    deadline_secs: u64,

    /// Sender label on outbound notices
    #[arg(long, default_value = "Service Desk <noreply@servicedesk.local>")]
    from_label: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "escalation=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let store = JsonStore::open(&args.requests, &args.directory)
        .with_context(|| format!("opening store at {}", args.requests.display()))?
        .shared();

    let notifier: Arc<dyn NotificationSender> = if args.dry_run {
        tracing::info!("dry run: notices will be logged, not written");
        Arc::new(LogNotifier)
    } else {
        Arc::new(
            OutboxNotifier::open(&args.outbox)
                .with_context(|| format!("opening outbox at {}", args.outbox.display()))?,
        )
    };

    let config = EngineConfig {
        max_parallel: args.max_parallel,
        cycle_deadline: Duration::from_secs(args.deadline_secs),
        from_label: args.from_label,
    };
    let engine = EscalationEngine::with_config(store.clone(), store, notifier, config);

    let report = match args.now {
        Some(now) => engine.run_cycle_at(now).await,
        None => engine.run_cycle().await,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);

    if !report.success {
        std::process::exit(1);
    }
    Ok(())
}
