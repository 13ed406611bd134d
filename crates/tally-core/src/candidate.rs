use serde::{Deserialize, Serialize};

use crate::constants::{HEAD_INDEX, NO_NEIGHBOR};
use crate::types::{Balance, NodeIndex, Price};

/// One slot of the candidate arena.
///
/// Nodes form a doubly linked list ordered ascending by `weight` from the
/// sentinel head to the tail. Slots are append-only and never reused.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CandidateNode {
    pub index: NodeIndex,
    pub price: Price,
    pub weight: Balance,
    pub prev: NodeIndex,
    pub next: NodeIndex,
}

impl CandidateNode {
    /// The permanent sentinel at slot 0. Its price is not a candidate.
    pub fn head() -> Self {
        Self {
            index: HEAD_INDEX,
            price: 0,
            weight: 0,
            prev: NO_NEIGHBOR,
            next: NO_NEIGHBOR,
        }
    }

    pub fn is_head(&self) -> bool {
        self.index == HEAD_INDEX
    }

    pub fn prev(&self) -> Option<NodeIndex> {
        (self.prev != NO_NEIGHBOR).then_some(self.prev)
    }

    pub fn next(&self) -> Option<NodeIndex> {
        (self.next != NO_NEIGHBOR).then_some(self.next)
    }
}

/// Arena bookkeeping: the next free slot and the current tail.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListHeader {
    /// Number of allocated slots (head included); the next insert lands here.
    pub len: u64,
    pub tail: NodeIndex,
}

impl Default for ListHeader {
    fn default() -> Self {
        Self { len: 1, tail: HEAD_INDEX }
    }
}
