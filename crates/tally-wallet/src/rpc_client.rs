use anyhow::{bail, Context};

use tally_core::account::{Account, VoteRecord};
use tally_core::candidate::CandidateNode;
use tally_core::constants::NO_NEIGHBOR;
use tally_core::transaction::Transaction;
use tally_core::types::AccountId;
use tally_query::CandidateSnapshot;
use tally_rpc::{RpcAccount, RpcCandidate, RpcEpoch, RpcProtocolInfo};

/// Simple JSON-RPC 2.0 client used by the wallet to talk to a running node.
///
/// Uses raw HTTP POST with serde_json rather than the full jsonrpsee client.
pub struct WalletRpcClient {
    url: String,
    client: reqwest::Client,
}

impl WalletRpcClient {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Call a JSON-RPC method and return the `result` field.
    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("connecting to node at {}", self.url))?;

        let json: serde_json::Value = resp.json().await.context("parsing RPC response")?;

        if let Some(err) = json.get("error") {
            bail!("RPC error: {}", err);
        }

        Ok(json["result"].clone())
    }

    /// Full account state; unknown accounts come back empty.
    pub async fn get_account(&self, account_id: &AccountId) -> anyhow::Result<Account> {
        let result = self
            .call("tally_getAccount", serde_json::json!([account_id.to_b58()]))
            .await?;
        if result.is_null() {
            return Ok(Account::new(account_id.clone()));
        }
        let rpc: RpcAccount = serde_json::from_value(result).context("parsing account response")?;
        account_from_rpc(account_id, &rpc)
    }

    pub async fn get_balance(&self, account_id: &str) -> anyhow::Result<u128> {
        let result = self
            .call("tally_getBalance", serde_json::json!([account_id]))
            .await?;
        let bal_str = result.as_str().context("expected string balance")?;
        bal_str.parse().context("parsing balance")
    }

    /// Slot-order copy of the candidate list for the locate phase.
    pub async fn get_snapshot(&self) -> anyhow::Result<CandidateSnapshot> {
        let result = self.call("tally_getCandidates", serde_json::json!([])).await?;
        let nodes: Vec<RpcCandidate> =
            serde_json::from_value(result).context("parsing candidates response")?;
        let nodes = nodes.iter().map(node_from_rpc).collect::<anyhow::Result<Vec<_>>>()?;
        Ok(CandidateSnapshot::new(nodes))
    }

    pub async fn get_ordered_candidates(&self) -> anyhow::Result<Vec<RpcCandidate>> {
        let result = self
            .call("tally_getOrderedCandidates", serde_json::json!([]))
            .await?;
        serde_json::from_value(result).context("parsing candidates response")
    }

    pub async fn get_epoch(&self) -> anyhow::Result<RpcEpoch> {
        let result = self.call("tally_getEpoch", serde_json::json!([])).await?;
        serde_json::from_value(result).context("parsing epoch response")
    }

    pub async fn describe_epoch(&self) -> anyhow::Result<String> {
        let result = self.call("tally_describeEpoch", serde_json::json!([])).await?;
        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected string from describeEpoch")
    }

    pub async fn get_protocol_info(&self) -> anyhow::Result<RpcProtocolInfo> {
        let result = self.call("tally_getProtocolInfo", serde_json::json!([])).await?;
        serde_json::from_value(result).context("parsing protocol info")
    }

    /// Submit a transaction. Returns the TxId hex.
    pub async fn send_transaction(&self, tx: &Transaction) -> anyhow::Result<String> {
        let bytes = bincode::serialize(tx).context("serializing transaction")?;
        let tx_hex = hex::encode(&bytes);

        let result = self
            .call("tally_sendTransaction", serde_json::json!([tx_hex]))
            .await?;

        result
            .as_str()
            .map(|s| s.to_string())
            .context("expected tx_id string from sendTransaction")
    }
}

fn parse_u128(field: &str, s: &str) -> anyhow::Result<u128> {
    s.parse().with_context(|| format!("parsing {field} {s:?}"))
}

fn node_from_rpc(c: &RpcCandidate) -> anyhow::Result<CandidateNode> {
    Ok(CandidateNode {
        index: c.index,
        price: parse_u128("price", &c.price)?,
        weight: parse_u128("weight", &c.weight)?,
        prev: c.prev.unwrap_or(NO_NEIGHBOR),
        next: c.next.unwrap_or(NO_NEIGHBOR),
    })
}

fn account_from_rpc(id: &AccountId, rpc: &RpcAccount) -> anyhow::Result<Account> {
    let vote = match &rpc.commitment {
        Some(v) => Some(VoteRecord {
            price: parse_u128("price", &v.price)?,
            locked_weight: parse_u128("locked_weight", &v.locked_weight)?,
            node_index: v.node_index,
            committed_at: v.committed_at,
        }),
        None => None,
    };
    Ok(Account {
        account_id: id.clone(),
        balance: parse_u128("balance", &rpc.balance)?,
        nonce: rpc.nonce,
        vote,
    })
}
