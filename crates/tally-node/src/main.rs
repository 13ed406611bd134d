//! tally-node: the tally ledger node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database
//!   2. Apply genesis if the DB is fresh
//!   3. Start the JSON-RPC 2.0 server
//!   4. Run the main loop: apply submitted transactions one at a time, in
//!      arrival order, until interrupted

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use tally_core::transaction::Transaction;
use tally_genesis::{apply_genesis, GenesisParams};
use tally_rpc::server::RpcServerState;
use tally_rpc::RpcServer;
use tally_state::{StateDb, StateEngine};

#[derive(Parser, Debug)]
#[command(
    name = "tally-node",
    version,
    about = "Tally node: token ledger with stake-weighted price governance"
)]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.tally/data")]
    data_dir: PathBuf,

    /// JSON-RPC listen address.
    #[arg(long, default_value = "127.0.0.1:8545")]
    rpc_addr: SocketAddr,

    /// Path to genesis params JSON (only read on first run).
    #[arg(long)]
    genesis_params: Option<PathBuf>,

    /// Capacity of the inbound transaction queue.
    #[arg(long, default_value_t = 512)]
    queue_depth: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tally=debug")),
        )
        .init();

    let args = Args::parse();
    info!("tally node starting");

    // ── State database ────────────────────────────────────────────────────────
    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;

    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    // ── Genesis if fresh ──────────────────────────────────────────────────────
    if !db.is_initialised() {
        info!("fresh database, applying genesis");
        let params = load_genesis_params(args.genesis_params.as_deref())?;
        let summary = apply_genesis(&db, &params).context("applying genesis")?;
        info!(accounts = summary.accounts, total_issued = summary.total_issued, "genesis applied");
    } else {
        info!("existing database found, skipping genesis");
    }

    // ── State engine ──────────────────────────────────────────────────────────
    let engine = StateEngine::new(Arc::clone(&db));

    // ── Inbound transaction queue ─────────────────────────────────────────────
    let (tx_sender, mut tx_receiver) = tokio::sync::mpsc::channel::<Transaction>(args.queue_depth);

    // ── RPC server ────────────────────────────────────────────────────────────
    let rpc_state = Arc::new(RpcServerState {
        db: Arc::clone(&db),
        tx_sender: Some(tx_sender),
    });
    let rpc_handle = RpcServer::new(rpc_state)
        .start(args.rpc_addr)
        .await
        .context("starting RPC server")?;

    // ── Main loop: apply in arrival order ─────────────────────────────────────
    info!("node ready");
    loop {
        tokio::select! {
            next = tx_receiver.recv() => {
                let Some(tx) = next else { break };
                let now = chrono::Utc::now().timestamp();
                if let Err(e) = engine.apply(&tx, now) {
                    if e.is_stale() {
                        warn!(tx_id = %tx.tx_id, error = %e, "stale position, caller should re-locate");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    rpc_handle.stop().ok();
    db.flush().context("flushing state database")?;
    info!("node stopped");
    Ok(())
}

/// Load genesis parameters from a JSON file, or fall back to defaults with no
/// allocations.
fn load_genesis_params(path: Option<&Path>) -> anyhow::Result<GenesisParams> {
    if let Some(p) = path {
        let json = std::fs::read_to_string(p)
            .with_context(|| format!("reading genesis params from {}", p.display()))?;
        return GenesisParams::from_json(&json).context("parsing genesis params JSON");
    }
    warn!("no --genesis-params provided, starting with default parameters and no allocations");
    Ok(GenesisParams::default())
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
