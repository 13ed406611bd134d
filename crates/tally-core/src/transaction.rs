use serde::{Deserialize, Serialize};

use crate::types::{AccountId, Balance, NodeIndex, Nonce, Price, Timestamp, TxId};

// ── Action ────────────────────────────────────────────────────────────────────

/// Every state-changing operation is one of these variants.
///
/// Actions that depend on list topology carry the caller's believed position;
/// the engine re-verifies it against live state before mutating anything.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Action {
    // ── Ledger ───────────────────────────────────────────────────────────────

    /// Plain transfer. Fails `TokensLocked` if it would dip into locked weight.
    Transfer {
        to: AccountId,
        amount: Balance,
    },

    /// Transfer that may consume locked weight, shrinking the sender's
    /// commitment. `position_hint` claims the committed node's slot and
    /// `residual_weight` the locked weight left after the outflow.
    LockAwareTransfer {
        to: AccountId,
        amount: Balance,
        position_hint: NodeIndex,
        residual_weight: Balance,
    },

    /// Mint tokens against `payment` reserve units at the current price.
    Buy {
        payment: Balance,
    },

    /// Plain sell. Fails `TokensLocked` if it would dip into locked weight.
    Sell {
        amount: Balance,
    },

    /// Sell that may consume locked weight (see `LockAwareTransfer`).
    LockAwareSell {
        amount: Balance,
        position_hint: NodeIndex,
        residual_weight: Balance,
    },

    // ── Voting ───────────────────────────────────────────────────────────────

    /// Commit `amount` behind `price`; the engine locates the list position
    /// itself against live state.
    Commit {
        price: Price,
        amount: Balance,
    },

    /// Low-level commit with explicit position proofs.
    /// `is_update = false` inserts a new candidate after `position_hint`;
    /// `is_update = true` adds weight to the node at `existing_candidate`.
    CommitAt {
        position_hint: NodeIndex,
        existing_candidate: NodeIndex,
        price: Price,
        amount: Balance,
        is_update: bool,
    },

    /// Close the running epoch and publish the winning candidate.
    Finalize,
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// A submitted operation bundle. All actions apply atomically.
///
/// `tx_id` is BLAKE3 of the canonical bincode serialization of the body
/// (every field except `tx_id`).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub tx_id: TxId,
    /// UTC Unix timestamp when the caller built this transaction.
    pub timestamp: Timestamp,
    /// Per-account counter (replay protection).
    pub nonce: Nonce,
    pub from: AccountId,
    pub actions: Vec<Action>,
}

/// The body bytes that are hashed to produce tx_id.
#[derive(Serialize)]
pub struct TransactionBody<'a> {
    pub timestamp: Timestamp,
    pub nonce: Nonce,
    pub from: &'a AccountId,
    pub actions: &'a Vec<Action>,
}

impl Transaction {
    /// Build a transaction and derive its id.
    pub fn new(from: AccountId, nonce: Nonce, timestamp: Timestamp, actions: Vec<Action>) -> Self {
        let mut tx = Self {
            tx_id: TxId::from_bytes([0u8; 32]),
            timestamp,
            nonce,
            from,
            actions,
        };
        tx.tx_id = tx.compute_id();
        tx
    }

    pub fn body(&self) -> TransactionBody<'_> {
        TransactionBody {
            timestamp: self.timestamp,
            nonce: self.nonce,
            from: &self.from,
            actions: &self.actions,
        }
    }

    /// Serialize the body to canonical bytes (bincode).
    pub fn body_bytes(&self) -> Vec<u8> {
        bincode::serialize(&self.body()).expect("body serialization is infallible")
    }

    pub fn compute_id(&self) -> TxId {
        TxId::from_bytes(*blake3::hash(&self.body_bytes()).as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_commits_to_body() {
        let from = AccountId::from_bytes([2u8; 32]);
        let tx = Transaction::new(from.clone(), 0, 100, vec![Action::Commit { price: 60, amount: 20 }]);
        assert_eq!(tx.tx_id, tx.compute_id());

        let other = Transaction::new(from, 0, 100, vec![Action::Commit { price: 60, amount: 21 }]);
        assert_ne!(tx.tx_id, other.tx_id);
    }
}
