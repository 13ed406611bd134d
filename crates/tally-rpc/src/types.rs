use serde::{Deserialize, Serialize};
use tally_core::account::{Account, VoteRecord};
use tally_core::candidate::CandidateNode;
use tally_core::protocol::EpochState;
use tally_core::types::Timestamp;

/// An account's active price commitment (u128 fields as strings).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcVoteRecord {
    pub price: String,
    pub locked_weight: String,
    pub node_index: u64,
    pub committed_at: i64,
}

impl From<&VoteRecord> for RpcVoteRecord {
    fn from(v: &VoteRecord) -> Self {
        Self {
            price: v.price.to_string(),
            locked_weight: v.locked_weight.to_string(),
            node_index: v.node_index,
            committed_at: v.committed_at,
        }
    }
}

/// JSON-serializable account summary returned by `tally_getAccount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcAccount {
    pub account_id: String,
    /// Gross balance including locked weight (u128 as string).
    pub balance: String,
    /// Balance available to plain outflows (u128 as string).
    pub spendable: String,
    pub locked: String,
    pub nonce: u64,
    pub commitment: Option<RpcVoteRecord>,
}

impl From<&Account> for RpcAccount {
    fn from(a: &Account) -> Self {
        Self {
            account_id: a.account_id.to_b58(),
            balance: a.balance.to_string(),
            spendable: a.spendable_balance().to_string(),
            locked: a.locked_weight().to_string(),
            nonce: a.nonce,
            commitment: a.vote.as_ref().map(RpcVoteRecord::from),
        }
    }
}

/// One candidate node. `prev`/`next` are `null` at the list ends.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcCandidate {
    pub index: u64,
    pub price: String,
    pub weight: String,
    pub prev: Option<u64>,
    pub next: Option<u64>,
    pub is_head: bool,
}

impl From<&CandidateNode> for RpcCandidate {
    fn from(n: &CandidateNode) -> Self {
        Self {
            index: n.index,
            price: n.price.to_string(),
            weight: n.weight.to_string(),
            prev: n.prev(),
            next: n.next(),
            is_head: n.is_head(),
        }
    }
}

/// Voting epoch state returned by `tally_getEpoch`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcEpoch {
    /// Completed epochs so far.
    pub epoch: u64,
    pub active: bool,
    pub active_since: Option<i64>,
    /// Earliest finalize time of the running epoch.
    pub closes_at: Option<i64>,
    pub last_finalized_at: Option<i64>,
    pub current_price: String,
}

impl RpcEpoch {
    pub fn new(e: &EpochState, dwell_secs: i64) -> Self {
        Self {
            epoch: e.epoch,
            active: e.is_active(),
            active_since: e.active_since,
            closes_at: e.active_since.map(|s: Timestamp| s.saturating_add(dwell_secs)),
            last_finalized_at: e.last_finalized_at,
            current_price: e.current_price.to_string(),
        }
    }
}

/// Protocol parameters and market totals returned by `tally_getProtocolInfo`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RpcProtocolInfo {
    pub dwell_secs: i64,
    pub min_vote_bps: String,
    pub trade_fee_bps: String,
    pub min_purchase: String,
    pub total_issued: String,
    pub reserve: String,
    pub fees_collected: String,
    pub candidate_slots: u64,
    pub accounts: u64,
    pub applied_transactions: u64,
}
