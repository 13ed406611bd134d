//! The sorted candidate list.
//!
//! Nodes live in an append-only arena keyed by slot index and are linked
//! ascending by weight from the sentinel head (slot 0) to the tail. Callers
//! name the position a mutation should happen at; the list re-verifies that
//! claim against the four neighbouring pointers/weights before touching
//! anything, so a stale claim is rejected instead of corrupting the order.
//!
//! `CandidateList` is a staging overlay over `StateDb`: reads fall through
//! to the db, writes stay in memory until `commit`. Dropping it discards
//! every staged change.

use std::collections::BTreeMap;

use tally_core::candidate::{CandidateNode, ListHeader};
use tally_core::constants::{HEAD_INDEX, NO_NEIGHBOR};
use tally_core::error::TallyError;
use tally_core::types::{Balance, NodeIndex, Price};
use tracing::debug;

use crate::db::{StateDb, WriteBatch};

// ── Position predicates ───────────────────────────────────────────────────────

/// Can a node of `weight` be spliced directly after a node weighing
/// `pred_weight`, whose current successor weighs `next_weight`?
pub fn insert_position_holds(
    pred_weight: Balance,
    next_weight: Option<Balance>,
    weight: Balance,
) -> bool {
    pred_weight <= weight && next_weight.map_or(true, |next| next >= weight)
}

/// Does a node of `weight` sit in order between its neighbours?
pub fn node_in_order(
    prev_weight: Option<Balance>,
    weight: Balance,
    next_weight: Option<Balance>,
) -> bool {
    prev_weight.map_or(true, |prev| prev <= weight) && next_weight.map_or(true, |next| next >= weight)
}

// ── CandidateList ─────────────────────────────────────────────────────────────

pub struct CandidateList<'a> {
    db: &'a StateDb,
    header: ListHeader,
    staged_nodes: BTreeMap<NodeIndex, CandidateNode>,
    staged_prices: BTreeMap<Price, NodeIndex>,
    header_dirty: bool,
}

impl<'a> CandidateList<'a> {
    pub fn open(db: &'a StateDb) -> Result<Self, TallyError> {
        Ok(Self {
            db,
            header: db.get_list_header()?,
            staged_nodes: BTreeMap::new(),
            staged_prices: BTreeMap::new(),
            header_dirty: false,
        })
    }

    pub fn header(&self) -> &ListHeader {
        &self.header
    }

    /// Allocated slots, head included.
    pub fn len(&self) -> u64 {
        self.header.len
    }

    /// True when only the sentinel head exists.
    pub fn is_empty(&self) -> bool {
        self.header.len <= 1
    }

    /// Node at `index`, or `None` for an unallocated slot.
    pub fn node(&self, index: NodeIndex) -> Result<Option<CandidateNode>, TallyError> {
        if index >= self.header.len {
            return Ok(None);
        }
        if let Some(n) = self.staged_nodes.get(&index) {
            return Ok(Some(n.clone()));
        }
        match self.db.get_node(index)? {
            Some(n) => Ok(Some(n)),
            None if index == HEAD_INDEX => Ok(Some(CandidateNode::head())),
            None => Err(TallyError::Storage(format!("candidate slot {index} allocated but missing"))),
        }
    }

    /// Node at an index reached by following links; absence means corruption.
    fn linked(&self, index: NodeIndex) -> Result<CandidateNode, TallyError> {
        self.node(index)?
            .ok_or_else(|| TallyError::Storage(format!("dangling link to candidate slot {index}")))
    }

    pub fn head(&self) -> Result<CandidateNode, TallyError> {
        self.linked(HEAD_INDEX)
    }

    /// The maximum-weight candidate, or the head when no candidate exists.
    pub fn tail(&self) -> Result<CandidateNode, TallyError> {
        self.linked(self.header.tail)
    }

    pub fn index_of(&self, price: Price) -> Result<Option<NodeIndex>, TallyError> {
        if let Some(i) = self.staged_prices.get(&price) {
            return Ok(Some(*i));
        }
        self.db.get_price_index(price)
    }

    fn stage(&mut self, node: CandidateNode) {
        self.staged_nodes.insert(node.index, node);
    }

    fn set_tail(&mut self, index: NodeIndex) {
        self.header.tail = index;
        self.header_dirty = true;
    }

    // ── Verified mutations ──────────────────────────────────────────────────

    /// Insert a new candidate for an unseen `price` directly after
    /// `claimed_predecessor`. Returns the new node's slot.
    pub fn propose_insert(
        &mut self,
        claimed_predecessor: NodeIndex,
        price: Price,
        weight: Balance,
    ) -> Result<NodeIndex, TallyError> {
        if self.index_of(price)?.is_some() {
            return Err(TallyError::CandidateExists(price));
        }
        let stale = TallyError::StaleOrInvalidPosition { index: claimed_predecessor };
        let mut pred = self.node(claimed_predecessor)?.ok_or(stale.clone())?;
        let next = match pred.next() {
            Some(n) => Some(self.linked(n)?),
            None => None,
        };
        if !insert_position_holds(pred.weight, next.as_ref().map(|n| n.weight), weight) {
            return Err(stale);
        }

        let index = self.header.len;
        self.header.len += 1;
        self.header_dirty = true;

        let node = CandidateNode {
            index,
            price,
            weight,
            prev: pred.index,
            next: pred.next,
        };
        pred.next = index;
        self.stage(pred);
        match next {
            Some(mut n) => {
                n.prev = index;
                self.stage(n);
            }
            None => self.set_tail(index),
        }
        self.stage(node);
        self.staged_prices.insert(price, index);

        debug!(index, price, weight, after = claimed_predecessor, "candidate inserted");
        Ok(index)
    }

    /// Set the weight of the existing candidate at `claimed_index` and walk it
    /// to its sorted position. Ties never move a node, so equal weights keep
    /// arrival order.
    pub fn propose_reweight(
        &mut self,
        claimed_index: NodeIndex,
        price: Price,
        new_weight: Balance,
    ) -> Result<(), TallyError> {
        let mismatch = TallyError::MismatchedCandidate { index: claimed_index, price };
        let mut node = self.node(claimed_index)?.ok_or(mismatch.clone())?;
        if node.is_head() || node.price != price {
            return Err(mismatch);
        }
        let old_weight = node.weight;
        node.weight = new_weight;
        let prev = node.prev;
        let next = node.next;
        self.stage(node);

        let prev_weight = self.linked(prev)?.weight;
        let next_weight = match (next != NO_NEIGHBOR).then_some(next) {
            Some(n) => Some(self.linked(n)?.weight),
            None => None,
        };
        if node_in_order(Some(prev_weight), new_weight, next_weight) {
            debug!(index = claimed_index, old_weight, new_weight, "candidate reweighted in place");
            return Ok(());
        }

        if let Some(next_index) = (next != NO_NEIGHBOR).then_some(next) {
            let mut cursor = self.linked(next_index)?;
            if cursor.weight < new_weight {
                while let Some(after) = cursor.next() {
                    let candidate = self.linked(after)?;
                    if candidate.weight >= new_weight {
                        break;
                    }
                    cursor = candidate;
                }
                self.unlink(claimed_index)?;
                self.link_after(claimed_index, cursor.index)?;
                debug!(index = claimed_index, old_weight, new_weight, after = cursor.index, "candidate moved up");
                return Ok(());
            }
        }

        // The head weighs zero, so a backward walk always stops before it.
        let mut cursor = self.linked(prev)?;
        if cursor.weight > new_weight {
            while let Some(before) = cursor.prev() {
                let candidate = self.linked(before)?;
                if candidate.weight <= new_weight {
                    break;
                }
                cursor = candidate;
            }
            self.unlink(claimed_index)?;
            self.link_after(claimed_index, cursor.prev)?;
            debug!(index = claimed_index, old_weight, new_weight, before = cursor.index, "candidate moved down");
        }
        Ok(())
    }

    fn unlink(&mut self, index: NodeIndex) -> Result<(), TallyError> {
        let node = self.linked(index)?;
        let mut prev = self.linked(node.prev)?;
        prev.next = node.next;
        self.stage(prev);
        match node.next() {
            Some(n) => {
                let mut next = self.linked(n)?;
                next.prev = node.prev;
                self.stage(next);
            }
            None => self.set_tail(node.prev),
        }
        Ok(())
    }

    fn link_after(&mut self, index: NodeIndex, after: NodeIndex) -> Result<(), TallyError> {
        let mut anchor = self.linked(after)?;
        let old_next = anchor.next;
        anchor.next = index;
        self.stage(anchor);

        let mut node = self.linked(index)?;
        node.prev = after;
        node.next = old_next;
        self.stage(node);

        if old_next == NO_NEIGHBOR {
            self.set_tail(index);
        } else {
            let mut next = self.linked(old_next)?;
            next.prev = index;
            self.stage(next);
        }
        Ok(())
    }

    // ── Reads ────────────────────────────────────────────────────────────────

    /// Predecessor slot for a new candidate of `weight`: the last node, walking
    /// from the head, whose weight does not exceed it.
    pub fn locate_insert(&self, weight: Balance) -> Result<NodeIndex, TallyError> {
        let mut cursor = self.head()?;
        while let Some(n) = cursor.next() {
            let next = self.linked(n)?;
            if next.weight > weight {
                break;
            }
            cursor = next;
        }
        Ok(cursor.index)
    }

    /// Every node, head first, in sorted (link) order.
    pub fn ordered(&self) -> Result<Vec<CandidateNode>, TallyError> {
        let mut out = Vec::with_capacity(self.header.len as usize);
        let mut cursor = Some(HEAD_INDEX);
        while let Some(i) = cursor {
            let node = self.linked(i)?;
            cursor = node.next();
            out.push(node);
            if out.len() as u64 > self.header.len {
                return Err(TallyError::Storage("candidate list contains a cycle".into()));
            }
        }
        Ok(out)
    }

    /// Every allocated node in slot order.
    pub fn slots(&self) -> Result<Vec<CandidateNode>, TallyError> {
        (0..self.header.len).map(|i| self.linked(i)).collect()
    }

    /// Queue staged nodes, price entries and the header into `batch`.
    pub fn write_to(&self, batch: &mut WriteBatch) -> Result<(), TallyError> {
        for node in self.staged_nodes.values() {
            batch.put_node(node)?;
        }
        for (price, index) in &self.staged_prices {
            batch.put_price_index(*price, *index);
        }
        if self.header_dirty {
            batch.put_list_header(&self.header)?;
        }
        Ok(())
    }

    /// Write staged nodes, price entries and the header to the db.
    pub fn commit(self) -> Result<(), TallyError> {
        let mut batch = WriteBatch::new();
        self.write_to(&mut batch)?;
        self.db.apply_batch(&batch)
    }
}
