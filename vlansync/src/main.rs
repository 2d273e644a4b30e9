use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use vlansync::config::{Config, DEFAULT_CONFIG_PATH, ProviderConfig};
use vlansync::provider::{AnsibleProvider, DeviceProvider, FileProvider};
use vlansync::reconciler::{Reconcile, Reconciler};
use vlansync::scheduler::Scheduler;
use vlansync::seed::{SeedAction, load_seed_file, seed};
use vlansync::service::VlanService;
use vlansync::store::SqliteStore;
use vlansync::SyncError;

#[derive(Parser)]
#[command(name = "vlansync")]
#[command(about = "Keeps a persisted VLAN inventory in sync with a network device")]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "VLANSYNC_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Use an ephemeral in-memory store instead of the configured database
    #[arg(long)]
    dev: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile on the configured interval until SIGINT/SIGTERM
    Run,
    /// Run a single reconciliation cycle
    Sync,
    /// Override the device with the stored inventory
    Push,
    /// Print the stored inventory as JSON
    List,
    /// Load seed records from a JSON file
    Seed {
        file: PathBuf,
        /// Remove the listed records instead of adding them
        #[arg(long)]
        delete: bool,
    },
}

fn build_provider(config: &ProviderConfig) -> Arc<dyn DeviceProvider> {
    match config {
        ProviderConfig::Ansible(ansible) => Arc::new(AnsibleProvider::new(
            ansible.runner.clone(),
            ansible.private_data_dir.clone(),
            ansible.fetch_playbook.clone(),
            ansible.edit_playbook.clone(),
            Duration::from_secs(ansible.timeout_secs),
        )),
        ProviderConfig::File(file) => {
            Arc::new(FileProvider::new(file.path.clone(), file.host.clone()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("vlansync=info".parse()?))
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config).map_err(SyncError::from)?;
    info!(config = %args.config.display(), "Loaded configuration");

    let store = Arc::new(if args.dev {
        info!("Development mode: using in-memory store");
        SqliteStore::in_memory().await?
    } else {
        SqliteStore::open(&config.database.url)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?
    });
    let provider = build_provider(&config.provider);

    match args.command {
        Command::Run => {
            let reconciler = Reconciler::new(
                Arc::clone(&store),
                Arc::clone(&provider),
                config.synchronizer.host_selection(),
            );

            let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
            let mut scheduler =
                Scheduler::new(reconciler, config.synchronizer.interval(), shutdown_rx);
            let scheduler_handle = tokio::spawn(async move { scheduler.run().await });

            let ctrl_c = signal::ctrl_c();
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .context("Failed to install SIGTERM handler")?;

            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT"),
                _ = sigterm.recv() => info!("Received SIGTERM"),
            }

            // Lets an in-flight cycle finish, then stops
            let _ = shutdown_tx.send(true);
            scheduler_handle.await?;
            info!("Shutdown complete");
        }
        Command::Sync => {
            let reconciler =
                Reconciler::new(store, provider, config.synchronizer.host_selection());
            let report = reconciler.reconcile().await?;
            info!(
                host = %report.host,
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                skipped = report.skipped,
                "Sync complete"
            );
        }
        Command::Push => {
            let service = VlanService::new(store, provider);
            service.push_all().await?;
        }
        Command::List => {
            let service = VlanService::new(store, provider);
            let records = service.list().await?;
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        Command::Seed { file, delete } => {
            let records = load_seed_file(&file)
                .await
                .with_context(|| format!("Failed to load seed file {}", file.display()))?;
            let action = if delete {
                SeedAction::Delete
            } else {
                SeedAction::Create
            };
            let count = seed(store.as_ref(), &records, action).await?;
            info!(count, action = ?action, "Seed applied");
        }
    }

    Ok(())
}
