//! Vote commitments and the locked-balance guard.
//!
//! An account holds at most one `VoteRecord`. Its `locked_weight` is part of
//! the candidate node's weight and cannot leave the account through plain
//! outflows; lock-aware outflows shrink the commitment and reposition the
//! node in the same staged step.

use tally_core::account::VoteRecord;
use tally_core::constants::BPS_DENOMINATOR;
use tally_core::error::TallyError;
use tally_core::types::{AccountId, Balance, NodeIndex, Price, Timestamp};
use tracing::debug;

use crate::epoch::open_if_idle;
use crate::staged::Staged;

/// Where a commitment lands in the candidate list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    /// Resolve against live state: add to the existing candidate for the
    /// price, or insert after the last node not heavier than the amount.
    Locate,
    /// New candidate directly after this claimed predecessor.
    After(NodeIndex),
    /// Add weight to the candidate claimed to live at this slot.
    Existing(NodeIndex),
}

/// Smallest commitment accepted against `total_issued`.
pub fn min_commitment(total_issued: Balance, min_vote_bps: u128) -> Balance {
    let scaled = total_issued.saturating_mul(min_vote_bps);
    scaled / BPS_DENOMINATOR + u128::from(scaled % BPS_DENOMINATOR != 0)
}

/// Lock `amount` of `account`'s balance behind `price`.
///
/// Returns the slot of the candidate node that now carries the weight.
pub fn commit(
    staged: &mut Staged<'_>,
    account: &AccountId,
    price: Price,
    amount: Balance,
    position: Position,
    now: Timestamp,
) -> Result<NodeIndex, TallyError> {
    if amount == 0 || price == 0 {
        return Err(TallyError::NonPositiveInput);
    }
    if staged.ledger.account(account)?.is_committed() {
        return Err(TallyError::AlreadyCommitted);
    }
    let spendable = staged.ledger.spendable_balance(account)?;
    if amount > spendable {
        return Err(TallyError::InsufficientPower { need: amount, have: spendable });
    }
    let min = min_commitment(staged.ledger.total_issued(), staged.params.min_vote_bps);
    if amount < min {
        return Err(TallyError::BelowThreshold { min });
    }

    let node_index = match position {
        Position::Locate => match staged.list.index_of(price)? {
            Some(index) => add_weight(staged, index, price, amount)?,
            None => {
                let pred = staged.list.locate_insert(amount)?;
                staged.list.propose_insert(pred, price, amount)?
            }
        },
        Position::After(pred) => staged.list.propose_insert(pred, price, amount)?,
        Position::Existing(index) => add_weight(staged, index, price, amount)?,
    };

    staged.ledger.account(account)?.vote = Some(VoteRecord {
        price,
        locked_weight: amount,
        node_index,
        committed_at: now,
    });
    open_if_idle(&mut staged.epoch, now);

    debug!(%account, price, amount, node_index, "vote committed");
    Ok(node_index)
}

fn add_weight(
    staged: &mut Staged<'_>,
    index: NodeIndex,
    price: Price,
    amount: Balance,
) -> Result<NodeIndex, TallyError> {
    let node = staged
        .list
        .node(index)?
        .ok_or(TallyError::MismatchedCandidate { index, price })?;
    let weight = node.weight.checked_add(amount).ok_or(TallyError::Overflow)?;
    staged.list.propose_reweight(index, price, weight)?;
    Ok(index)
}

/// Plain-outflow guard: `amount` must fit in the unlocked balance.
pub fn guard_outflow(
    staged: &mut Staged<'_>,
    account: &AccountId,
    amount: Balance,
) -> Result<(), TallyError> {
    if amount == 0 {
        return Err(TallyError::NonPositiveInput);
    }
    let acc = staged.ledger.account(account)?;
    if amount > acc.balance {
        return Err(TallyError::InsufficientBalance { need: amount, have: acc.balance });
    }
    if amount > acc.spendable_balance() {
        return Err(TallyError::TokensLocked {
            locked: acc.locked_weight(),
            spendable: acc.spendable_balance(),
        });
    }
    Ok(())
}

/// Lock-aware outflow guard: releases as much locked weight as the outflow
/// needs before it is debited.
///
/// `position_hint` claims the slot of the account's candidate and
/// `residual_weight` the locked weight left afterwards; both are checked
/// against live state. Accounts without a commitment skip the claims.
pub fn prepare_lock_aware_outflow(
    staged: &mut Staged<'_>,
    account: &AccountId,
    amount: Balance,
    position_hint: NodeIndex,
    residual_weight: Balance,
) -> Result<(), TallyError> {
    if amount == 0 {
        return Err(TallyError::NonPositiveInput);
    }
    let acc = staged.ledger.account(account)?;
    if amount > acc.balance {
        return Err(TallyError::InsufficientBalance { need: amount, have: acc.balance });
    }
    let Some(record) = acc.vote.clone() else {
        return Ok(());
    };

    if position_hint != record.node_index {
        return Err(TallyError::MismatchedCandidate { index: position_hint, price: record.price });
    }
    let remaining = record.locked_weight.min(acc.balance - amount);
    if residual_weight != remaining {
        return Err(TallyError::StaleOrInvalidPosition { index: position_hint });
    }
    release_weight(staged, account, remaining)
}

/// Shrink `account`'s commitment to `remaining` and reposition its node.
/// Reaching zero clears the record; the node stays in the list.
pub fn release_weight(
    staged: &mut Staged<'_>,
    account: &AccountId,
    remaining: Balance,
) -> Result<(), TallyError> {
    let Some(record) = staged.ledger.account(account)?.vote.clone() else {
        return Ok(());
    };
    if remaining >= record.locked_weight {
        return Ok(());
    }
    let released = record.locked_weight - remaining;
    let node = staged
        .list
        .node(record.node_index)?
        .ok_or(TallyError::MismatchedCandidate { index: record.node_index, price: record.price })?;
    let weight = node.weight.checked_sub(released).ok_or(TallyError::Overflow)?;
    staged.list.propose_reweight(record.node_index, record.price, weight)?;

    let acc = staged.ledger.account(account)?;
    acc.vote = if remaining == 0 {
        None
    } else {
        Some(VoteRecord { locked_weight: remaining, ..record })
    };
    debug!(%account, released, remaining, "vote weight released");
    Ok(())
}
