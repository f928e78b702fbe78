use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Config, MessageSink, RunResult};
use strategy::{run_named, RunContext, ScheduleFile, Scheduler, StrategyRegistry, SystemClock};
use telegram_notify::{ConsoleSink, TelegramSink};

/// SEC Form 4 insider purchase alerts.
#[derive(Debug, Parser)]
#[command(name = "insiderbot", version)]
struct Cli {
    /// Run this strategy now, ignoring its schedule. Without it, every
    /// strategy due today runs.
    strategy: Option<String>,

    /// Schedule and strategy settings file. Overrides SCHEDULE_CONFIG_PATH.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print messages to stdout instead of sending them to Telegram.
    #[arg(long)]
    dry_run: bool,

    /// Print each run result as one JSON line.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // ── Config ────────────────────────────────────────────────────────────────
    let mut cfg = Config::from_env()?;
    if let Some(path) = cli.config {
        cfg.schedule_config_path = path;
    }
    let file = ScheduleFile::load(&cfg.schedule_config_path)?;
    info!(
        config = %cfg.schedule_config_path.display(),
        schedules = file.schedules.len(),
        malformed = file.malformed().len(),
        dry_run = cli.dry_run,
        "InsiderBot starting"
    );

    // ── Delivery ──────────────────────────────────────────────────────────────
    let sink: Arc<dyn MessageSink> = if cli.dry_run {
        Arc::new(ConsoleSink)
    } else {
        Arc::new(TelegramSink::from_env().context("Telegram delivery is not configured (use --dry-run to print instead)")?)
    };

    let ctx = RunContext {
        settings: file.strategies.clone(),
        utc_offset: file.offset()?,
        config: cfg,
        sink,
        clock: Arc::new(SystemClock),
    };
    let registry = StrategyRegistry::default();

    // ── Run ───────────────────────────────────────────────────────────────────
    let results: Vec<RunResult> = match cli.strategy {
        Some(name) => {
            if !registry.contains(&name) {
                let known: Vec<&str> = registry.names().collect();
                bail!("unknown strategy '{name}' (registered: {})", known.join(", "));
            }
            let notify_on_failure = file.entry(&name).is_some_and(|e| e.notify_on_failure);
            vec![run_named(&registry, &name, &ctx, notify_on_failure).await?]
        }
        None => Scheduler::from_file(&file, registry).run_due(&ctx).await.runs,
    };

    for r in &results {
        if cli.json {
            println!("{}", serde_json::to_string(r)?);
        } else {
            println!(
                "{} {}: {} records, {} candidates, {} messages, {} errors ({})",
                r.strategy,
                r.status,
                r.records_processed,
                r.candidates_selected,
                r.messages_delivered,
                r.errors.len(),
                r.run_id
            );
            for e in &r.errors {
                println!("  {e}");
            }
        }
    }
    Ok(())
}
