use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;
use linewatch::cli::{Cli, Commands};
use linewatch::config::{AppConfig, LoggingConfig, NotifiedBackend, NotifierKind};
use linewatch::coordination::{shutdown_signal, ShutdownHandle};
use linewatch::strategy::{CsvNotifiedStore, CycleOutcome, CycleRunner, NotifiedStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = AppConfig::load_from(&cli.config_dir).with_context(|| {
        format!("failed to load configuration from {}", cli.config_dir.display())
    })?;
    init_logging(&config.logging);

    match cli.command {
        Commands::CheckConfig => check_config(&config, cli.dry_run),
        Commands::Prune => prune(&config),
        Commands::Once => run_once(&config, cli.dry_run).await,
        Commands::Run => run(&config, cli.dry_run).await,
    }
}

fn init_logging(logging: &LoggingConfig) {
    let default_directives = if logging.level == "info" {
        "info,linewatch=debug".to_string()
    } else {
        logging.level.clone()
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .init();
    }
}

/// Validate as the given mode would run; dry runs need no chat credentials
fn validated(config: &AppConfig, dry_run: bool) -> Result<AppConfig> {
    let mut effective = config.clone();
    if dry_run {
        effective.notifier.kind = NotifierKind::Log;
    }
    if let Err(errors) = effective.validate() {
        for e in &errors {
            warn!("Config: {}", e);
        }
        bail!("configuration has {} problem(s)", errors.len());
    }
    Ok(effective)
}

fn check_config(config: &AppConfig, dry_run: bool) -> Result<()> {
    let config = validated(config, dry_run)?;
    println!("Configuration OK");
    println!("  feed:      {:?}", config.provider.source());
    println!("  notifier:  {:?}", config.notifier.kind);
    println!("  data dir:  {}", config.storage.data_dir.display());
    println!(
        "  detector:  pivot {} / disagreement {} / band {}",
        config.detector.money_pivot,
        config.detector.disagreement_threshold,
        config.detector.opening_band
    );
    println!("  interval:  {}s", config.schedule.poll_interval_secs);
    Ok(())
}

fn prune(config: &AppConfig) -> Result<()> {
    if config.storage.notified_backend == NotifiedBackend::Memory {
        println!("Notified store is in memory, nothing to prune");
        return Ok(());
    }

    let path = config.storage.notified_path();
    let mut store = CsvNotifiedStore::open(&path)?;
    let removed = store.prune_before(Utc::now());
    store.flush()?;
    println!(
        "Pruned {} identifiers from {}, {} remain",
        removed,
        path.display(),
        store.len()
    );
    Ok(())
}

async fn run_once(config: &AppConfig, dry_run: bool) -> Result<()> {
    let config = validated(config, dry_run)?;
    let (handle, mut listener) = ShutdownHandle::new();
    let mut runner = CycleRunner::from_config(&config, dry_run, listener.clone())?;

    tokio::spawn(async move {
        shutdown_signal().await;
        handle.trigger();
    });

    match runner.run_cycle_with_retry(&mut listener).await? {
        CycleOutcome::Bootstrapped => println!("Baseline snapshots stored, no comparison yet"),
        CycleOutcome::Completed(summary) => println!(
            "{} reverse line movements, {} disagreements, new alerts sent: {}",
            summary.reverse_moves, summary.disagreements, summary.new_alerts
        ),
    }
    Ok(())
}

async fn run(config: &AppConfig, dry_run: bool) -> Result<()> {
    let config = validated(config, dry_run)?;
    let (handle, listener) = ShutdownHandle::new();
    let mut runner = CycleRunner::from_config(&config, dry_run, listener.clone())?;

    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        handle.trigger();
    });

    runner.run_loop(listener).await?;
    Ok(())
}
