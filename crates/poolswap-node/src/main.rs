//! poolswap-node — the swap coordinator daemon.
//!
//! Startup sequence:
//!   1. Load configuration (JSON file, or the built-in dev config with
//!      `--mock-chains`)
//!   2. Open the store and seed pool liquidity for newly configured tokens
//!   3. Connect one chain adapter per configured chain
//!   4. Replay chain logs from the stored cursors (crash recovery)
//!   5. Spawn the watchers, resolver workers and the relayer executor
//!   6. Serve the HTTP API until interrupted

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use poolswap_api::{ApiServer, ApiState};
use poolswap_chain::{EvmChain, HtlcChain, LogWatcher, MockChain, WatcherHandle};
use poolswap_core::{NodeConfig, PoolswapError};
use poolswap_crypto::HotWallet;
use poolswap_liquidity::LiquidityManager;
use poolswap_relayer::Relayer;
use poolswap_resolver::{DestinationFunder, FundingDetector, ResolverCtx, TimeoutSweeper};
use poolswap_service::{FixedRates, SwapService};
use poolswap_store::Store;

mod devconfig;

#[derive(Parser, Debug)]
#[command(
    name = "poolswap-node",
    version,
    about = "PoolSwap coordinator — gasless cross-chain swaps against a liquidity pool"
)]
struct Args {
    /// Path to the node configuration JSON. Not required with --mock-chains.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the persistent store.
    #[arg(long, default_value = "~/.poolswap/data")]
    data_dir: PathBuf,

    /// HTTP API listen address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    http_addr: SocketAddr,

    /// Run against in-memory mock chains with a built-in dev config.
    #[arg(long)]
    mock_chains: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,poolswap=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    info!("PoolSwap node starting");

    // ── Configuration ─────────────────────────────────────────────────────────
    let config = Arc::new(load_config(&args)?);

    // ── Store ─────────────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let store = Arc::new(Store::open(&data_dir).context("opening store")?);

    // ── Liquidity seeding ─────────────────────────────────────────────────────
    let liquidity = Arc::new(LiquidityManager::new(Arc::clone(&store)));
    seed_liquidity(&config, &store, &liquidity)?;

    // ── Chain adapters ────────────────────────────────────────────────────────
    let mut chains: HashMap<u64, Arc<dyn HtlcChain>> = HashMap::new();
    for chain_cfg in &config.chains {
        let adapter: Arc<dyn HtlcChain> = if args.mock_chains {
            Arc::new(MockChain::new(chain_cfg.chain_id, chain_cfg.htlc_contract))
        } else {
            let wallet = relayer_wallet()?;
            Arc::new(
                EvmChain::connect(chain_cfg, wallet)
                    .with_context(|| format!("connecting chain {}", chain_cfg.name))?,
            )
        };
        info!(
            chain = chain_cfg.chain_id,
            name = %chain_cfg.name,
            wallet = %adapter.wallet_address(),
            "chain adapter ready"
        );
        chains.insert(chain_cfg.chain_id, adapter);
    }

    // ── Shutdown signal ───────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Watchers: replay from cursors, then follow the tips ───────────────────
    let (events_tx, watcher_handle) = WatcherHandle::channel(256);
    for adapter in chains.values() {
        let chain_cfg = config
            .chain(adapter.chain_id())
            .ok_or_else(|| anyhow::anyhow!("missing config for chain {}", adapter.chain_id()))?;
        let mut watcher = LogWatcher::new(
            Arc::clone(adapter),
            Arc::clone(&store),
            Duration::from_secs(chain_cfg.poll_interval_secs),
            events_tx.clone(),
            shutdown_rx.clone(),
        );
        // Catch-up pass before serving traffic, so outcomes submitted by a
        // previous run are recovered rather than patched by hand.
        match watcher.poll_once().await {
            Ok(replayed) if replayed > 0 => {
                info!(chain = adapter.chain_id(), replayed, "replayed chain events")
            }
            Ok(_) => {}
            Err(e) => warn!(chain = adapter.chain_id(), error = %e, "startup replay failed"),
        }
        tokio::spawn(watcher.run());
    }
    drop(events_tx);

    // ── Resolver workers ──────────────────────────────────────────────────────
    let ctx = Arc::new(ResolverCtx::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&liquidity),
        chains.clone(),
    ));
    let sweep_interval = Duration::from_secs(config.resolver.sweep_interval_secs);
    tokio::spawn(
        FundingDetector::new(Arc::clone(&ctx), watcher_handle.events_rx, shutdown_rx.clone())
            .run(),
    );
    tokio::spawn(
        DestinationFunder::new(Arc::clone(&ctx), Duration::from_secs(5), shutdown_rx.clone())
            .run(),
    );
    tokio::spawn(TimeoutSweeper::new(Arc::clone(&ctx), sweep_interval, shutdown_rx.clone()).run());

    // ── Relayer ───────────────────────────────────────────────────────────────
    let relayer = Arc::new(Relayer::new(
        Arc::clone(&config),
        Arc::clone(&store),
        chains,
    ));
    tokio::spawn(Arc::clone(&relayer).run(Duration::from_secs(5), shutdown_rx.clone()));

    // ── HTTP API ──────────────────────────────────────────────────────────────
    let prices = Arc::new(FixedRates::new(Arc::clone(&config)));
    let service = Arc::new(SwapService::new(
        Arc::clone(&config),
        Arc::clone(&store),
        Arc::clone(&liquidity),
        prices,
    ));
    let api_state = Arc::new(ApiState {
        config: Arc::clone(&config),
        store: Arc::clone(&store),
        service,
        liquidity,
        relayer,
        started_at: chrono::Utc::now().timestamp(),
    });
    let (_bound, http_handle) = ApiServer::new(api_state)
        .start(args.http_addr, shutdown_rx)
        .await
        .context("starting HTTP API")?;

    info!("node ready");

    // ── Run until interrupted ─────────────────────────────────────────────────
    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    info!("shutting down");
    let _ = shutdown_tx.send(true);
    let _ = http_handle.await;
    store.flush().map_err(|e| anyhow::anyhow!("final flush: {e}"))?;
    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<NodeConfig> {
    if args.mock_chains {
        info!("using built-in dev configuration (mock chains)");
        return Ok(devconfig::dev_config());
    }
    let path = args
        .config
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("--config is required without --mock-chains"))?;
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    serde_json::from_str(&json).context("parsing config JSON")
}

/// Register configured tokens and seed their initial liquidity exactly once.
fn seed_liquidity(
    config: &NodeConfig,
    store: &Store,
    liquidity: &LiquidityManager,
) -> Result<(), PoolswapError> {
    for token in &config.tokens {
        if store.get_supported_token(&token.key())?.is_some() {
            continue;
        }
        store.put_supported_token(token)?;
        liquidity.deposit(token.key(), token.initial_liquidity, token.min_threshold)?;
        info!(
            token = %token.key(), symbol = %token.symbol,
            seeded = %token.initial_liquidity, "token registered"
        );
    }
    Ok(())
}

/// The pool/relayer signing key, from `POOLSWAP_RELAYER_KEY`.
fn relayer_wallet() -> anyhow::Result<HotWallet> {
    let hex = std::env::var("POOLSWAP_RELAYER_KEY")
        .context("POOLSWAP_RELAYER_KEY must be set for real chains")?;
    HotWallet::from_hex(&hex).map_err(|e| anyhow::anyhow!("invalid relayer key: {e}"))
}

/// Resolve a `~/`-prefixed path against the home directory. Paths without
/// the prefix (and environments without a home) pass through untouched.
fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
        Some(home) => PathBuf::from(home).join(rest),
        None => path.to_path_buf(),
    }
}
