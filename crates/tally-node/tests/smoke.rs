//! End-to-end smoke test for tally-node.
//!
//! Starts a real node process with a fresh genesis, submits transactions via
//! JSON-RPC, and asserts the candidate list and balances reflect them.
//!
//! Run with:
//!   cargo test -p tally-node --test smoke

use std::net::TcpListener;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use tally_core::candidate::CandidateNode;
use tally_core::constants::NO_NEIGHBOR;
use tally_core::transaction::{Action, Transaction};
use tally_core::types::AccountId;
use tally_genesis::{Allocation, GenesisParams};
use tally_query::{plan_commit, CandidateSnapshot};

// ── Node lifecycle ────────────────────────────────────────────────────────────

struct NodeGuard {
    child: Child,
    data_dir: PathBuf,
}

impl Drop for NodeGuard {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

/// Find a free TCP port on loopback.
fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

// ── RPC helpers ───────────────────────────────────────────────────────────────

async fn rpc_call(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
        "params": params,
        "id": 1
    });
    let resp = client
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap_or_else(|e| panic!("RPC call {method} failed: {e}"));
    let json: serde_json::Value = resp.json().await.expect("parse RPC JSON");
    if let Some(err) = json.get("error") {
        panic!("RPC error from {method}: {err}");
    }
    json["result"].clone()
}

/// Poll until the RPC server responds or the timeout elapses.
async fn wait_for_rpc(client: &reqwest::Client, url: &str, timeout: Duration) -> bool {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": "tally_getProtocolInfo",
        "params": [],
        "id": 1
    });
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if let Ok(resp) = client.post(url).json(&body).send().await {
            if resp.status().is_success() {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }
    false
}

async fn get_balance(client: &reqwest::Client, url: &str, account: &AccountId) -> u128 {
    let result =
        rpc_call(client, url, "tally_getBalance", serde_json::json!([account.to_b58()])).await;
    result.as_str().unwrap().parse().expect("parse balance")
}

async fn get_account(client: &reqwest::Client, url: &str, account: &AccountId) -> serde_json::Value {
    rpc_call(client, url, "tally_getAccount", serde_json::json!([account.to_b58()])).await
}

async fn get_snapshot(client: &reqwest::Client, url: &str) -> CandidateSnapshot {
    let result = rpc_call(client, url, "tally_getCandidates", serde_json::json!([])).await;
    let nodes = result
        .as_array()
        .expect("candidate array")
        .iter()
        .map(|c| CandidateNode {
            index: c["index"].as_u64().unwrap(),
            price: c["price"].as_str().unwrap().parse().unwrap(),
            weight: c["weight"].as_str().unwrap().parse().unwrap(),
            prev: c["prev"].as_u64().unwrap_or(NO_NEIGHBOR),
            next: c["next"].as_u64().unwrap_or(NO_NEIGHBOR),
        })
        .collect();
    CandidateSnapshot::new(nodes)
}

async fn send(client: &reqwest::Client, url: &str, from: &AccountId, actions: Vec<Action>) {
    let account = get_account(client, url, from).await;
    let nonce = if account.is_null() { 0 } else { account["nonce"].as_u64().expect("nonce field") };
    let tx = Transaction::new(from.clone(), nonce, chrono::Utc::now().timestamp(), actions);
    let tx_hex = hex::encode(bincode::serialize(&tx).expect("serialize tx"));
    let result =
        rpc_call(client, url, "tally_sendTransaction", serde_json::json!([tx_hex])).await;
    assert_eq!(result.as_str(), Some(tx.tx_id.to_hex().as_str()));

    // Allow time for the node's main loop to process the tx.
    tokio::time::sleep(Duration::from_millis(600)).await;
}

// ── Smoke test ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn smoke_commit_transfer_and_release() {
    // ── 1. Prepare temp dir and genesis params ────────────────────────────────
    let data_dir = std::env::temp_dir().join(format!("tally_e2e_{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&data_dir);
    std::fs::create_dir_all(&data_dir).unwrap();

    let alice = AccountId::from_bytes([1; 32]);
    let bob = AccountId::from_bytes([2; 32]);
    let params = GenesisParams {
        allocations: vec![
            Allocation { account: alice.to_b58(), balance: 10_000 },
            Allocation { account: bob.to_b58(), balance: 10_000 },
        ],
        ..GenesisParams::default()
    };
    let params_path = data_dir.join("genesis-params.json");
    std::fs::write(&params_path, serde_json::to_string(&params).unwrap()).unwrap();

    // ── 2. Start node ─────────────────────────────────────────────────────────
    let rpc_port = free_port();
    let rpc_url = format!("http://127.0.0.1:{}", rpc_port);

    let node_bin = env!("CARGO_BIN_EXE_tally-node");
    let child = Command::new(node_bin)
        .args([
            "--data-dir",       data_dir.join("state").to_str().unwrap(),
            "--rpc-addr",       &format!("127.0.0.1:{}", rpc_port),
            "--genesis-params", params_path.to_str().unwrap(),
        ])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("failed to spawn tally-node");

    let _guard = NodeGuard { child, data_dir };

    // ── 3. Wait for RPC ready ─────────────────────────────────────────────────
    let http = reqwest::Client::new();
    assert!(
        wait_for_rpc(&http, &rpc_url, Duration::from_secs(20)).await,
        "tally-node did not become ready within 20 seconds"
    );
    assert_eq!(get_balance(&http, &rpc_url, &alice).await, 10_000);

    // ── 4. Alice commits 700 behind price 60 using client-side hints ──────────
    let snapshot = get_snapshot(&http, &rpc_url).await;
    send(&http, &rpc_url, &alice, vec![plan_commit(&snapshot, 60, 700)]).await;

    let tail = rpc_call(&http, &rpc_url, "tally_getTail", serde_json::json!([])).await;
    assert_eq!(tail["price"], "60");
    assert_eq!(tail["weight"], "700");
    let epoch = rpc_call(&http, &rpc_url, "tally_getEpoch", serde_json::json!([])).await;
    assert_eq!(epoch["active"], true);

    // ── 5. Plain transfer into locked weight is rejected ──────────────────────
    send(&http, &rpc_url, &alice, vec![Action::Transfer { to: bob.clone(), amount: 9_500 }]).await;
    assert_eq!(get_balance(&http, &rpc_url, &bob).await, 10_000);

    // ── 6. Lock-aware transfer releases 200 of the commitment ─────────────────
    let account = get_account(&http, &rpc_url, &alice).await;
    let position_hint = account["commitment"]["node_index"].as_u64().expect("node index");
    send(
        &http,
        &rpc_url,
        &alice,
        vec![Action::LockAwareTransfer {
            to: bob.clone(),
            amount: 9_500,
            position_hint,
            residual_weight: 500,
        }],
    )
    .await;

    assert_eq!(get_balance(&http, &rpc_url, &alice).await, 500);
    assert_eq!(get_balance(&http, &rpc_url, &bob).await, 19_500);
    let tail = rpc_call(&http, &rpc_url, "tally_getTail", serde_json::json!([])).await;
    assert_eq!(tail["weight"], "500");
    let account = get_account(&http, &rpc_url, &alice).await;
    assert_eq!(account["locked"], "500");
}
