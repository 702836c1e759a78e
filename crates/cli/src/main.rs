//! Roadmap CLI - project health from PM and source-control exports.

mod config;
mod report;
mod source;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use roadmap_storage::{JsonSnapshotStore, SnapshotStore};
use roadmap_sync::{SourceAdapter, SyncCoordinator, SyncScheduler, TriggerOutcome};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::source::FileAdapter;

#[derive(Parser)]
#[command(name = "roadmap")]
#[command(about = "Roadmap health engine", long_about = None)]
struct Cli {
    /// Config file (defaults to ./roadmap.toml or ./roadmap.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync cycle and print the result
    Sync {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run sync cycles on the configured interval until Ctrl-C
    Watch {
        /// Override the configured interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Print the last persisted snapshot
    Show {
        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Write a starter config file
    Init {
        /// Where to write it
        #[arg(default_value = "roadmap.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { path, force } => init(&path, force),
        Commands::Sync { json } => {
            let config = Config::load(cli.config.as_deref())?;
            sync_once(&config, json).await
        }
        Commands::Watch { interval } => {
            let config = Config::load(cli.config.as_deref())?;
            watch(&config, interval).await
        }
        Commands::Show { json } => {
            let config = Config::load(cli.config.as_deref())?;
            show(&config, json).await
        }
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::template().save(path)?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn build_coordinator(config: &Config) -> Result<Arc<SyncCoordinator>> {
    if config.sources.is_empty() {
        warn!("No sources configured; snapshots will be empty");
    }

    let store = JsonSnapshotStore::new(&config.storage.state_dir)
        .await
        .with_context(|| format!("Failed to open state dir {}", config.storage.state_dir.display()))?;
    let adapters = config
        .sources
        .iter()
        .map(|source| Arc::new(FileAdapter::from(source)) as Arc<dyn SourceAdapter>);

    let coordinator = SyncCoordinator::new(config.engine.clone())?
        .with_adapters(adapters)
        .with_store(Arc::new(store));

    if coordinator.restore().await? {
        info!("Restored snapshot from {}", config.storage.state_dir.display());
    }
    Ok(Arc::new(coordinator))
}

async fn sync_once(config: &Config, json: bool) -> Result<()> {
    let coordinator = build_coordinator(config).await?;

    match coordinator.trigger().await {
        TriggerOutcome::Completed { cycle_id, adapter_failures } => {
            info!("Cycle {} completed with {} adapter failures", cycle_id, adapter_failures);
        }
        TriggerOutcome::Coalesced => {}
        TriggerOutcome::Failed(e) => bail!("Sync failed: {}", e),
    }

    let view = coordinator.view();
    if json {
        println!("{}", serde_json::to_string_pretty(view.snapshot.as_ref())?);
    } else {
        print!("{}", report::render(&view.snapshot, view.state, view.last_sync_error.as_deref()));
    }
    Ok(())
}

async fn watch(config: &Config, interval: Option<u64>) -> Result<()> {
    let coordinator = build_coordinator(config).await?;
    let period = interval
        .map(|secs| std::time::Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.engine.sync.interval());

    let mut snapshots = coordinator.subscribe();
    let scheduler = SyncScheduler::spawn(coordinator.clone(), period);

    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = coordinator.view();
                print!("{}", report::render(&view.snapshot, view.state, view.last_sync_error.as_deref()));
                println!();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break;
            }
        }
    }

    scheduler.stop().await;
    Ok(())
}

async fn show(config: &Config, json: bool) -> Result<()> {
    let store = JsonSnapshotStore::new(&config.storage.state_dir).await?;

    let Some(snapshot) = store.load_snapshot().await? else {
        println!("No snapshot in {}", config.storage.state_dir.display());
        return Ok(());
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        let meta = store.load_meta().await?;
        if let Some(meta) = meta {
            println!("Snapshot version {} saved {}", meta.version, meta.updated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        print!("{}", report::render(&snapshot, roadmap_core::SyncState::Ready, None));
    }
    Ok(())
}
