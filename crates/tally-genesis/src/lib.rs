//! tally-genesis
//!
//! Builds the opening ledger state from a `GenesisParams` file, writing
//! directly into a `StateDb` without going through the transaction engine
//! (genesis has no sender and no nonce).
//!
//! Genesis sets:
//!
//! 1. Opening balances, minted into `total_issued`
//! 2. The market reserve backing them
//! 3. Protocol parameters (dwell, minimum stake, trade fee, minimum purchase)
//! 4. The initial reference price, with the voting epoch idle

pub mod params;

pub use params::{Allocation, GenesisParams};

use tally_core::error::TallyError;
use tally_core::protocol::EpochState;
use tally_core::types::{AccountId, Balance};
use tally_state::{Staged, StateDb};
use tracing::info;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenesisSummary {
    pub accounts: usize,
    pub total_issued: Balance,
}

/// Apply the genesis state to an empty `StateDb`.
///
/// Fails if the db already holds protocol parameters: genesis may only be
/// applied once. Parameters are validated and every allocation parsed before
/// anything is written; the whole state then lands in one atomic commit.
pub fn apply_genesis(db: &StateDb, params: &GenesisParams) -> Result<GenesisSummary, TallyError> {
    if db.is_initialised() {
        return Err(TallyError::Other("genesis already applied".into()));
    }
    if params.initial_price == 0 {
        return Err(TallyError::NonPositiveInput);
    }
    params.protocol.validate()?;
    info!(initial_price = params.initial_price, "applying genesis state");

    let allocations = params
        .allocations
        .iter()
        .map(|a| Ok((AccountId::from_b58(&a.account)?, a.balance)))
        .collect::<Result<Vec<_>, TallyError>>()?;

    let mut staged = Staged::open(db)?;

    // ── 1. Opening balances ──────────────────────────────────────────────────
    for (id, balance) in &allocations {
        staged.ledger.mint(id, *balance)?;
        info!(account = %id, balance, "genesis: allocation");
    }

    // ── 2. Market reserve ────────────────────────────────────────────────────
    staged.ledger.market_mut().reserve = params.initial_reserve;

    // ── 3. Epoch and reference price ─────────────────────────────────────────
    staged.epoch = EpochState::new(params.initial_price);

    // ── 4. Protocol parameters (marks the db initialised) ────────────────────
    staged.set_params(params.protocol.clone());

    let expected: Balance = allocations
        .iter()
        .try_fold(0u128, |acc, (_, b)| acc.checked_add(*b))
        .ok_or(TallyError::Overflow)?;
    let total_issued = staged.ledger.total_issued();
    if total_issued != expected {
        return Err(TallyError::Other(format!(
            "genesis supply mismatch: expected {expected}, got {total_issued}"
        )));
    }

    staged.commit()?;
    db.flush()?;
    let summary = GenesisSummary { accounts: db.account_count(), total_issued };
    info!(accounts = summary.accounts, total_issued, "genesis state committed to disk");
    Ok(summary)
}
