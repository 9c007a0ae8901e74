use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::TimeDelta;
use clap::{Parser, Subcommand};
use tagpulse_sync::{
    build_cycle_scheduler, Experiment, IngestConfig, IngestMetrics, PassSummary, StoreMode,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::level_filters::LevelFilter;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Roughly a century; keeps `now - days` well inside chrono's range.
const MAX_PASS_DAYS: i64 = 36_500;

#[derive(Debug, Parser)]
#[command(name = "tagpulse")]
#[command(about = "Ingest Stack Overflow threads and GitHub issues for tracked projects")]
struct Cli {
    /// Keep ingested rows in memory instead of PostgreSQL.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the 2, 7 and 45 day passes, then keep serving metrics.
    Run,
    /// Run a single pass with a custom lookback.
    Pass {
        #[arg(long, default_value_t = 2, value_parser = clap::value_parser!(i64).range(1..=MAX_PASS_DAYS))]
        days: i64,
    },
    /// Create every roster entity's tables and exit.
    Provision,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    if let Err(err) = dispatch(cli).await {
        error!(error = %format!("{err:#}"), "tagpulse stopped");
        return Err(err);
    }
    Ok(())
}

async fn dispatch(cli: Cli) -> Result<()> {
    let config = IngestConfig::from_env()?;
    let mode = if cli.dry_run {
        StoreMode::Memory
    } else {
        StoreMode::Postgres
    };
    let metrics = Arc::new(IngestMetrics::new().context("registering metrics")?);
    let experiment = Arc::new(Experiment::connect(&config, metrics.clone(), mode).await?);
    info!(
        entities = experiment.roster().len(),
        dry_run = cli.dry_run,
        "roster loaded"
    );

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(&config, experiment, metrics).await,
        Commands::Pass { days } => {
            let summary = experiment.run_pass(TimeDelta::days(days)).await?;
            print_summary(&summary)
        }
        Commands::Provision => {
            let count = experiment.provision_all().await?;
            println!("provisioned {count} entities");
            Ok(())
        }
    }
}

async fn run(
    config: &IngestConfig,
    experiment: Arc<Experiment>,
    metrics: Arc<IngestMetrics>,
) -> Result<()> {
    let addr = config.metrics_addr;
    let mut server: JoinHandle<Result<()>> =
        tokio::spawn(async move { tagpulse_web::serve(addr, metrics).await });

    for summary in experiment.run_windows().await? {
        print_summary(&summary)?;
    }

    let (failures_tx, mut failures_rx) = mpsc::unbounded_channel();
    let mut scheduler = match &config.schedule_cron {
        Some(cron) => {
            let sched = build_cycle_scheduler(experiment.clone(), cron, failures_tx).await?;
            sched.start().await.context("starting scheduler")?;
            info!(cron = cron.as_str(), "ingestion cycle scheduled");
            Some(sched)
        }
        None => {
            drop(failures_tx);
            info!("initial cycle complete; serving metrics until interrupted");
            None
        }
    };

    let outcome = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for shutdown signal")?;
            warn!("shutdown requested");
            Ok(())
        }
        Some(err) = failures_rx.recv() => Err(anyhow::Error::new(err)),
        joined = &mut server => match joined {
            Ok(Ok(())) => Err(anyhow::anyhow!("metrics endpoint stopped unexpectedly")),
            Ok(Err(err)) => Err(err.context("metrics endpoint failed")),
            Err(err) => Err(anyhow::Error::new(err).context("metrics endpoint task panicked")),
        },
    };

    if let Some(sched) = scheduler.as_mut() {
        if let Err(err) = sched.shutdown().await {
            warn!(error = %err, "scheduler shutdown failed");
        }
    }
    server.abort();
    outcome
}

fn print_summary(summary: &PassSummary) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string(summary).context("serializing pass summary")?
    );
    Ok(())
}
