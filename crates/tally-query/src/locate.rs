//! Locate phase: derive position hints from a point-in-time copy of the list.

use serde::{Deserialize, Serialize};
use tally_core::account::Account;
use tally_core::candidate::CandidateNode;
use tally_core::constants::HEAD_INDEX;
use tally_core::transaction::Action;
use tally_core::types::{Balance, NodeIndex, Price};
use tracing::debug;

/// Every node of the candidate list in slot order, as read at one instant.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateSnapshot {
    pub nodes: Vec<CandidateNode>,
}

impl CandidateSnapshot {
    pub fn new(nodes: Vec<CandidateNode>) -> Self {
        Self { nodes }
    }

    fn get(&self, index: NodeIndex) -> Option<&CandidateNode> {
        self.nodes.get(usize::try_from(index).ok()?)
    }

    /// Nodes in link order, head first. Stops at a dangling link or a cycle.
    pub fn ordered(&self) -> Vec<&CandidateNode> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut cursor = self.get(HEAD_INDEX);
        while let Some(node) = cursor {
            out.push(node);
            if out.len() > self.nodes.len() {
                break;
            }
            cursor = node.next().and_then(|n| self.get(n));
        }
        out
    }

    /// Predecessor for a new candidate of `weight`: the last node, walking
    /// from the head, whose weight does not exceed it. Equal weights stay in
    /// arrival order.
    pub fn locate_insert(&self, weight: Balance) -> NodeIndex {
        let index = self
            .ordered()
            .into_iter()
            .take_while(|n| n.is_head() || n.weight <= weight)
            .last()
            .map_or(HEAD_INDEX, |n| n.index);
        debug!(weight, after = index, "located insert position");
        index
    }

    /// Slot of the existing candidate for `price`.
    pub fn locate_candidate(&self, price: Price) -> Option<NodeIndex> {
        self.nodes
            .iter()
            .find(|n| !n.is_head() && n.price == price)
            .map(|n| n.index)
    }
}

/// Low-level commit carrying the hints this snapshot implies.
pub fn plan_commit(snapshot: &CandidateSnapshot, price: Price, amount: Balance) -> Action {
    match snapshot.locate_candidate(price) {
        Some(index) => Action::CommitAt {
            position_hint: HEAD_INDEX,
            existing_candidate: index,
            price,
            amount,
            is_update: true,
        },
        None => Action::CommitAt {
            position_hint: snapshot.locate_insert(amount),
            existing_candidate: HEAD_INDEX,
            price,
            amount,
            is_update: false,
        },
    }
}

/// `(position_hint, residual_weight)` for a lock-aware outflow of `amount`.
/// Accounts without a commitment get `(0, 0)`, which the engine ignores.
pub fn plan_lock_aware(account: &Account, amount: Balance) -> (NodeIndex, Balance) {
    match &account.vote {
        Some(v) => (v.node_index, v.locked_weight.min(account.balance.saturating_sub(amount))),
        None => (HEAD_INDEX, 0),
    }
}
