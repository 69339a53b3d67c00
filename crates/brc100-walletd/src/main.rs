//! brc100-walletd: runs the BRC-100 identity engine with background expiry
//! sweeps, restoring and saving state across restarts.

use std::path::PathBuf;
use std::sync::Arc;

use brc100_auth::{spawn_sweeper, Sweep};
use brc100_primitives::ec::PrivateKey;
use brc100_wallet::{LocalKeyService, WalletKeyService};
use brc100_walletd::{Brc100Service, JsonFileStateStore, MemoryStateStore, ServiceError, StateStore, WalletdConfig};
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "brc100-walletd")]
#[command(about = "BRC-100 wallet identity and authentication daemon")]
#[command(version)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level, overridden by RUST_LOG.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Identity private key, hex.
    #[arg(long, env = "BRC100_IDENTITY_KEY", hide_env_values = true)]
    identity_key: Option<String>,
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(filter).with(fmt::layer()).init();
}

fn load_wallet(identity_key: Option<&str>) -> Result<Arc<dyn WalletKeyService>, ServiceError> {
    let wallet = match identity_key {
        Some(hex_key) => {
            let key = PrivateKey::from_hex(hex_key).map_err(|e| ServiceError::Config(format!("identity key: {}", e)))?;
            LocalKeyService::new(key)
        }
        None => {
            warn!("no identity key configured, using an ephemeral key");
            LocalKeyService::random()
        }
    };
    Ok(Arc::new(wallet))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);
    if let Err(e) = run(args).await {
        error!(error = %e, "walletd failed");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ServiceError> {
    let config = match &args.config {
        Some(path) => WalletdConfig::from_file(path)?,
        None => WalletdConfig::default(),
    };
    let wallet = load_wallet(args.identity_key.as_deref())?;
    info!(identity_key = %wallet.identity_key()?.to_hex(), "wallet loaded");

    let service = Arc::new(Brc100Service::new(&config, wallet)?);
    info!(providers = ?service.spv_client().provider_names(), "blockchain providers configured");

    let store: Box<dyn StateStore> = match &config.state.path {
        Some(path) => Box::new(JsonFileStateStore::new(path)),
        None => Box::new(MemoryStateStore::new()),
    };
    if let Some(snapshot) = store.load_state()? {
        service.restore(snapshot)?;
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let targets: [(Arc<dyn Sweep>, _); 3] = [
        (service.challenge_store() as Arc<dyn Sweep>, config.challenge.sweep_interval()),
        (Arc::clone(&service) as Arc<dyn Sweep>, config.session.sweep_interval()),
        (service.handshake_controller() as Arc<dyn Sweep>, config.handshake.sweep_interval()),
    ];
    let sweepers: Vec<_> = targets
        .into_iter()
        .map(|(target, period)| spawn_sweeper(target, period, shutdown_rx.clone()))
        .collect();
    info!("walletd running");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    for handle in sweepers {
        if let Err(e) = handle.await {
            warn!(error = %e, "sweeper task failed");
        }
    }

    store.save_state(&service.snapshot()?)?;
    info!("state saved");
    Ok(())
}
