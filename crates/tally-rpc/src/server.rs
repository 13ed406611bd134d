use std::net::SocketAddr;
use std::sync::Arc;

use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObject;
use tracing::{debug, info, warn};

use tally_core::error::TallyError;
use tally_core::transaction::Transaction;
use tally_core::types::AccountId;
use tally_query::CandidateQuery;
use tally_state::StateDb;

use crate::api::TallyApiServer;
use crate::types::{RpcAccount, RpcCandidate, RpcEpoch, RpcProtocolInfo, RpcVoteRecord};

fn rpc_err(code: i32, msg: impl Into<String>) -> ErrorObject<'static> {
    ErrorObject::owned(code, msg.into(), None::<()>)
}

fn internal(e: TallyError) -> ErrorObject<'static> {
    rpc_err(-32603, e.to_string())
}

fn parse_account(s: &str) -> Result<AccountId, ErrorObject<'static>> {
    AccountId::from_b58(s).map_err(|e| rpc_err(-32602, e.to_string()))
}

fn parse_u128(field: &str, s: &str) -> Result<u128, ErrorObject<'static>> {
    s.parse::<u128>()
        .map_err(|e| rpc_err(-32602, format!("invalid {field}: {e}")))
}

/// Shared state passed to the RPC server.
pub struct RpcServerState {
    pub db: Arc<StateDb>,
    /// Sender into the node's ordered apply queue.
    pub tx_sender: Option<tokio::sync::mpsc::Sender<Transaction>>,
}

/// The RPC server implementation.
pub struct RpcServer {
    state: Arc<RpcServerState>,
}

impl RpcServer {
    pub fn new(state: Arc<RpcServerState>) -> Self {
        Self { state }
    }

    /// Start the JSON-RPC server on `addr`. Returns a handle to stop it.
    pub async fn start(self, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
        let server = Server::builder().build(addr).await?;
        let module = self.into_rpc();
        let handle = server.start(module);
        info!(%addr, "RPC server started");
        Ok(handle)
    }

    fn query(&self) -> CandidateQuery<'_> {
        CandidateQuery::new(&self.state.db)
    }
}

#[async_trait]
impl TallyApiServer for RpcServer {
    async fn get_account(&self, account_id: String) -> RpcResult<Option<RpcAccount>> {
        let id = parse_account(&account_id)?;
        let acc = self.state.db.get_account(&id).map_err(internal)?;
        Ok(acc.as_ref().map(RpcAccount::from))
    }

    async fn get_balance(&self, account_id: String) -> RpcResult<String> {
        let id = parse_account(&account_id)?;
        let balance = self
            .state
            .db
            .get_account(&id)
            .map_err(internal)?
            .map(|a| a.balance)
            .unwrap_or(0);
        Ok(balance.to_string())
    }

    async fn send_transaction(&self, tx_hex: String) -> RpcResult<String> {
        let tx_bytes =
            hex::decode(&tx_hex).map_err(|e| rpc_err(-32602, format!("invalid hex: {e}")))?;

        let tx: Transaction = bincode::deserialize(&tx_bytes)
            .map_err(|e| rpc_err(-32602, format!("invalid transaction encoding: {e}")))?;

        if tx.compute_id() != tx.tx_id {
            return Err(rpc_err(-32602, TallyError::TxIdMismatch.to_string()));
        }
        let tx_id = tx.tx_id.to_hex();

        if let Some(sender) = &self.state.tx_sender {
            sender
                .send(tx)
                .await
                .map_err(|_| rpc_err(-32603, "transaction queue closed"))?;
        } else {
            warn!("RPC: sendTransaction called but no tx pipeline configured");
            return Err(rpc_err(-32603, "node tx pipeline not connected"));
        }

        debug!(%tx_id, "transaction queued");
        Ok(tx_id)
    }

    async fn get_candidates(&self) -> RpcResult<Vec<RpcCandidate>> {
        let snapshot = self.query().snapshot().map_err(internal)?;
        Ok(snapshot.nodes.iter().map(RpcCandidate::from).collect())
    }

    async fn get_ordered_candidates(&self) -> RpcResult<Vec<RpcCandidate>> {
        let nodes = self.query().ordered().map_err(internal)?;
        Ok(nodes.iter().map(RpcCandidate::from).collect())
    }

    async fn get_head(&self) -> RpcResult<RpcCandidate> {
        Ok(RpcCandidate::from(&self.query().head().map_err(internal)?))
    }

    async fn get_tail(&self) -> RpcResult<RpcCandidate> {
        Ok(RpcCandidate::from(&self.query().tail().map_err(internal)?))
    }

    async fn get_commitment(&self, account_id: String) -> RpcResult<Option<RpcVoteRecord>> {
        let id = parse_account(&account_id)?;
        let vote = self.query().commitment(&id).map_err(internal)?;
        Ok(vote.as_ref().map(RpcVoteRecord::from))
    }

    async fn locate_insert(&self, weight: String) -> RpcResult<u64> {
        let weight = parse_u128("weight", &weight)?;
        Ok(self.query().locate_insert(weight).map_err(internal)?)
    }

    async fn locate_candidate(&self, price: String) -> RpcResult<Option<u64>> {
        let price = parse_u128("price", &price)?;
        Ok(self.query().locate_candidate(price).map_err(internal)?)
    }

    async fn get_current_price(&self) -> RpcResult<String> {
        Ok(self.query().current_price().map_err(internal)?.to_string())
    }

    async fn get_epoch(&self) -> RpcResult<RpcEpoch> {
        let q = self.query();
        let epoch = q.epoch().map_err(internal)?;
        let params = q.params().map_err(internal)?;
        Ok(RpcEpoch::new(&epoch, params.dwell_secs))
    }

    async fn describe_epoch(&self) -> RpcResult<String> {
        let now = chrono::Utc::now().timestamp();
        Ok(self.query().describe_epoch(now).map_err(internal)?)
    }

    async fn get_protocol_info(&self) -> RpcResult<RpcProtocolInfo> {
        let q = self.query();
        let params = q.params().map_err(internal)?;
        let market = q.market().map_err(internal)?;
        let slots = self.state.db.get_list_header().map_err(internal)?.len;
        Ok(RpcProtocolInfo {
            dwell_secs: params.dwell_secs,
            min_vote_bps: params.min_vote_bps.to_string(),
            trade_fee_bps: params.trade_fee_bps.to_string(),
            min_purchase: params.min_purchase.to_string(),
            total_issued: market.total_issued.to_string(),
            reserve: market.reserve.to_string(),
            fees_collected: market.fees_collected.to_string(),
            candidate_slots: slots,
            accounts: self.state.db.account_count() as u64,
            applied_transactions: self.state.db.applied_count() as u64,
        })
    }
}
