//! tally-wallet
//!
//! CLI client for a tally node. Builds transactions, computes position hints
//! against a fresh snapshot of the candidate list, and submits them via
//! JSON-RPC.
//!
//! Usage:
//!   tally-wallet account-id  --name <label>
//!   tally-wallet balance     --account <b58>
//!   tally-wallet transfer    --from <b58> --to <b58> --amount <n> [--release]
//!   tally-wallet buy         --from <b58> --payment <n>
//!   tally-wallet sell        --from <b58> --amount <n> [--release]
//!   tally-wallet commit      --from <b58> --price <n> --amount <n> [--engine-locate]
//!   tally-wallet finalize    --from <b58>
//!   tally-wallet candidates | epoch | info
//!   tally-wallet genesis-params --out <path> --alloc <b58>:<balance> ...

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use tally_core::transaction::{Action, Transaction};
use tally_core::types::{AccountId, Balance};
use tally_genesis::{Allocation, GenesisParams};
use tally_query::{plan_commit, plan_lock_aware};

mod rpc_client;
use rpc_client::WalletRpcClient;

// ── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "tally-wallet",
    version,
    about = "Tally wallet: build and submit ledger transactions"
)]
struct Args {
    /// Node RPC endpoint.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8545")]
    rpc: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Derive a deterministic account ID from a label (BLAKE3 of the label).
    AccountId {
        #[arg(long)]
        name: String,
    },

    /// Print an account's balance, lock and commitment.
    Balance {
        #[arg(long)]
        account: String,
    },

    /// Transfer tokens to another account.
    Transfer {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: Balance,
        /// Allow the transfer to consume locked vote weight.
        #[arg(long, default_value_t = false)]
        release: bool,
    },

    /// Mint tokens for a payment at the current price.
    Buy {
        #[arg(long)]
        from: String,
        #[arg(long)]
        payment: Balance,
    },

    /// Redeem tokens at the current price.
    Sell {
        #[arg(long)]
        from: String,
        #[arg(long)]
        amount: Balance,
        /// Allow the sale to consume locked vote weight.
        #[arg(long, default_value_t = false)]
        release: bool,
    },

    /// Commit stake behind a candidate price.
    Commit {
        #[arg(long)]
        from: String,
        #[arg(long)]
        price: u128,
        #[arg(long)]
        amount: Balance,
        /// Let the node locate the list position instead of sending hints.
        #[arg(long, default_value_t = false)]
        engine_locate: bool,
    },

    /// Close the running epoch and publish the winner.
    Finalize {
        #[arg(long)]
        from: String,
    },

    /// List candidates in weight order.
    Candidates,

    /// Print the voting epoch state.
    Epoch,

    /// Print protocol parameters and market totals.
    Info,

    /// Write a genesis params file for `tally-node --genesis-params`.
    GenesisParams {
        #[arg(long)]
        out: PathBuf,
        /// Opening balance as `<b58 account>:<balance>`; repeatable.
        #[arg(long = "alloc")]
        allocations: Vec<String>,
        #[arg(long)]
        initial_price: Option<u128>,
        #[arg(long, default_value_t = 0)]
        initial_reserve: Balance,
    },
}

// ── Main ─────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("warn,tally_wallet=info")
        .init();

    let args = Args::parse();
    let client = WalletRpcClient::new(&args.rpc);

    match args.command {
        Command::AccountId { name } => {
            let id = AccountId::from_bytes(*blake3::hash(name.as_bytes()).as_bytes());
            println!("{}", id.to_b58());
            Ok(())
        }

        Command::Balance { account } => {
            let id = parse_account(&account)?;
            let acc = client.get_account(&id).await?;
            println!("Account:    {}", id);
            println!("Balance:    {}", acc.balance);
            println!("Spendable:  {}", acc.spendable_balance());
            match &acc.vote {
                Some(v) => println!(
                    "Commitment: {} locked behind price {} (slot {})",
                    v.locked_weight, v.price, v.node_index
                ),
                None => println!("Commitment: none"),
            }
            Ok(())
        }

        Command::Transfer { from, to, amount, release } => {
            let from = parse_account(&from)?;
            let to = parse_account(&to)?;
            let action = if release {
                let acc = client.get_account(&from).await?;
                let (position_hint, residual_weight) = plan_lock_aware(&acc, amount);
                Action::LockAwareTransfer { to, amount, position_hint, residual_weight }
            } else {
                Action::Transfer { to, amount }
            };
            submit(&client, &from, vec![action]).await
        }

        Command::Buy { from, payment } => {
            let from = parse_account(&from)?;
            submit(&client, &from, vec![Action::Buy { payment }]).await
        }

        Command::Sell { from, amount, release } => {
            let from = parse_account(&from)?;
            let action = if release {
                let acc = client.get_account(&from).await?;
                let (position_hint, residual_weight) = plan_lock_aware(&acc, amount);
                Action::LockAwareSell { amount, position_hint, residual_weight }
            } else {
                Action::Sell { amount }
            };
            submit(&client, &from, vec![action]).await
        }

        Command::Commit { from, price, amount, engine_locate } => {
            let from = parse_account(&from)?;
            let action = if engine_locate {
                Action::Commit { price, amount }
            } else {
                let snapshot = client.get_snapshot().await?;
                let plan = plan_commit(&snapshot, price, amount);
                info!(?plan, "planned commitment");
                plan
            };
            submit(&client, &from, vec![action]).await
        }

        Command::Finalize { from } => {
            let from = parse_account(&from)?;
            submit(&client, &from, vec![Action::Finalize]).await
        }

        Command::Candidates => {
            for c in client.get_ordered_candidates().await?.iter().filter(|c| !c.is_head) {
                println!("slot {:>4}  price {:>12}  weight {:>16}", c.index, c.price, c.weight);
            }
            Ok(())
        }

        Command::Epoch => {
            let epoch = client.get_epoch().await?;
            println!("{}", client.describe_epoch().await?);
            if let Some(closes_at) = epoch.closes_at {
                println!("Closes at:  {}", format_ts(closes_at));
            }
            if let Some(last) = epoch.last_finalized_at {
                println!("Last final: {}", format_ts(last));
            }
            Ok(())
        }

        Command::Info => {
            let info = client.get_protocol_info().await?;
            println!("Dwell:          {} s", info.dwell_secs);
            println!("Min vote:       {} bps of issued supply", info.min_vote_bps);
            println!("Trade fee:      {} bps", info.trade_fee_bps);
            println!("Min purchase:   {}", info.min_purchase);
            println!("Total issued:   {}", info.total_issued);
            println!("Reserve:        {}", info.reserve);
            println!("Fees collected: {}", info.fees_collected);
            println!("Candidate slots:{}", info.candidate_slots);
            Ok(())
        }

        Command::GenesisParams { out, allocations, initial_price, initial_reserve } => {
            cmd_genesis_params(&out, &allocations, initial_price, initial_reserve)
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_genesis_params(
    out: &PathBuf,
    allocations: &[String],
    initial_price: Option<u128>,
    initial_reserve: Balance,
) -> anyhow::Result<()> {
    if out.exists() {
        bail!("{} already exists. Delete it first to avoid overwriting a previous genesis.", out.display());
    }
    let mut params = GenesisParams {
        initial_reserve,
        allocations: allocations
            .iter()
            .map(|s| parse_allocation(s))
            .collect::<anyhow::Result<Vec<_>>>()?,
        ..GenesisParams::default()
    };
    if let Some(price) = initial_price {
        params.initial_price = price;
    }
    std::fs::write(out, serde_json::to_string_pretty(&params)?)
        .with_context(|| format!("writing {}", out.display()))?;
    println!("genesis params written to: {}", out.display());
    Ok(())
}

// ── Transaction builder ───────────────────────────────────────────────────────

async fn submit(client: &WalletRpcClient, from: &AccountId, actions: Vec<Action>) -> anyhow::Result<()> {
    let nonce = client.get_account(from).await?.nonce;
    let timestamp = chrono::Utc::now().timestamp();
    let tx = Transaction::new(from.clone(), nonce, timestamp, actions);
    let tx_id = client.send_transaction(&tx).await?;
    println!("Submitted: {}", tx_id);
    Ok(())
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_account(s: &str) -> anyhow::Result<AccountId> {
    AccountId::from_b58(s).map_err(|e| anyhow::anyhow!("invalid account: {e}"))
}

fn parse_allocation(s: &str) -> anyhow::Result<Allocation> {
    let (account, balance) = s
        .split_once(':')
        .with_context(|| format!("allocation {s:?} must be <account>:<balance>"))?;
    parse_account(account)?;
    Ok(Allocation {
        account: account.to_string(),
        balance: balance.parse().with_context(|| format!("parsing balance in {s:?}"))?,
    })
}

fn format_ts(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ts.to_string())
}
