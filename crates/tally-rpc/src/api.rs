use jsonrpsee::core::RpcResult;
use jsonrpsee::proc_macros::rpc;

use crate::types::{RpcAccount, RpcCandidate, RpcEpoch, RpcProtocolInfo, RpcVoteRecord};

/// Tally JSON-RPC 2.0 API definition.
///
/// All method names are prefixed with "tally_" via `namespace = "tally"`.
/// Amounts and prices travel as decimal strings.
#[rpc(server, namespace = "tally")]
pub trait TallyApi {
    /// Get full account state by base-58 account ID.
    #[method(name = "getAccount")]
    async fn get_account(&self, account_id: String) -> RpcResult<Option<RpcAccount>>;

    /// Get gross balance by base-58 account ID.
    #[method(name = "getBalance")]
    async fn get_balance(&self, account_id: String) -> RpcResult<String>;

    /// Submit a transaction. `tx_hex` is hex-encoded bincode(Transaction).
    /// Returns the TxId hex once queued; the outcome is visible in state.
    #[method(name = "sendTransaction")]
    async fn send_transaction(&self, tx_hex: String) -> RpcResult<String>;

    // ── Candidate list ────────────────────────────────────────────────────────

    /// Every allocated node in slot order, head at index 0.
    #[method(name = "getCandidates")]
    async fn get_candidates(&self) -> RpcResult<Vec<RpcCandidate>>;

    /// Nodes in ascending weight order, head first.
    #[method(name = "getOrderedCandidates")]
    async fn get_ordered_candidates(&self) -> RpcResult<Vec<RpcCandidate>>;

    #[method(name = "getHead")]
    async fn get_head(&self) -> RpcResult<RpcCandidate>;

    /// The current leader; equals the head while no candidate exists.
    #[method(name = "getTail")]
    async fn get_tail(&self) -> RpcResult<RpcCandidate>;

    #[method(name = "getCommitment")]
    async fn get_commitment(&self, account_id: String) -> RpcResult<Option<RpcVoteRecord>>;

    /// Predecessor slot for a new candidate of `weight`.
    #[method(name = "locateInsert")]
    async fn locate_insert(&self, weight: String) -> RpcResult<u64>;

    /// Slot of the existing candidate for `price`, or null.
    #[method(name = "locateCandidate")]
    async fn locate_candidate(&self, price: String) -> RpcResult<Option<u64>>;

    // ── Epoch ─────────────────────────────────────────────────────────────────

    #[method(name = "getCurrentPrice")]
    async fn get_current_price(&self) -> RpcResult<String>;

    #[method(name = "getEpoch")]
    async fn get_epoch(&self) -> RpcResult<RpcEpoch>;

    /// One-line human-readable summary of the voting epoch.
    #[method(name = "describeEpoch")]
    async fn describe_epoch(&self) -> RpcResult<String>;

    /// Protocol parameters and market totals.
    #[method(name = "getProtocolInfo")]
    async fn get_protocol_info(&self) -> RpcResult<RpcProtocolInfo>;
}
