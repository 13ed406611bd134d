use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Balance, NodeIndex, Nonce, Price, Timestamp};

// ── VoteRecord ────────────────────────────────────────────────────────────────

/// The single active price commitment an account holds.
///
/// `locked_weight` is exactly what this account contributed to the weight
/// of the candidate node at `price`; it is exempt from plain outflows.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRecord {
    pub price: Price,
    pub locked_weight: Balance,
    /// Slot of the candidate node backing `price`. Slots never move, so this
    /// stays valid for the lifetime of the record.
    pub node_index: NodeIndex,
    pub committed_at: Timestamp,
}

// ── Account ───────────────────────────────────────────────────────────────────

/// Full account state as stored in the state DB.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub account_id: AccountId,
    /// Gross balance, including any weight locked by `vote`.
    pub balance: Balance,
    pub nonce: Nonce,
    /// `None` = no commitment.
    #[serde(default)]
    pub vote: Option<VoteRecord>,
}

impl Account {
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            balance: 0,
            nonce: 0,
            vote: None,
        }
    }

    pub fn locked_weight(&self) -> Balance {
        self.vote.as_ref().map(|v| v.locked_weight).unwrap_or(0)
    }

    /// Balance available to plain outflows (gross minus locked weight).
    pub fn spendable_balance(&self) -> Balance {
        self.balance.saturating_sub(self.locked_weight())
    }

    pub fn is_committed(&self) -> bool {
        self.vote.is_some()
    }
}
