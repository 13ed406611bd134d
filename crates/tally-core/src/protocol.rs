use serde::{Deserialize, Serialize};

use crate::constants::{
    BPS_DENOMINATOR, DEFAULT_DWELL_SECS, DEFAULT_INITIAL_PRICE, DEFAULT_MIN_PURCHASE, DEFAULT_MIN_VOTE_BPS,
    DEFAULT_TRADE_FEE_BPS,
};
use crate::error::TallyError;
use crate::types::{Balance, Price, Timestamp};

// ── ProtocolParams ────────────────────────────────────────────────────────────

/// Per-deployment parameters, fixed at genesis and persisted in the meta tree.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolParams {
    /// Seconds an epoch must stay open before it can be finalized.
    pub dwell_secs: i64,
    /// Minimum commitment in basis points of total issued supply.
    pub min_vote_bps: u128,
    pub trade_fee_bps: u128,
    pub min_purchase: Balance,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            dwell_secs: DEFAULT_DWELL_SECS,
            min_vote_bps: DEFAULT_MIN_VOTE_BPS,
            trade_fee_bps: DEFAULT_TRADE_FEE_BPS,
            min_purchase: DEFAULT_MIN_PURCHASE,
        }
    }
}

impl ProtocolParams {
    /// Reject parameters the market and vote paths cannot work with:
    /// basis-point fields above 100% and a negative dwell.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.dwell_secs < 0 {
            return Err(TallyError::InvalidParams(format!(
                "dwell_secs must not be negative (got {})",
                self.dwell_secs
            )));
        }
        if self.min_vote_bps > BPS_DENOMINATOR {
            return Err(TallyError::InvalidParams(format!(
                "min_vote_bps must be at most {BPS_DENOMINATOR} (got {})",
                self.min_vote_bps
            )));
        }
        if self.trade_fee_bps > BPS_DENOMINATOR {
            return Err(TallyError::InvalidParams(format!(
                "trade_fee_bps must be at most {BPS_DENOMINATOR} (got {})",
                self.trade_fee_bps
            )));
        }
        Ok(())
    }
}

// ── EpochState ────────────────────────────────────────────────────────────────

/// Voting-epoch timer and the published reference price.
///
/// Idle while `active_since` is `None`; Active from the first accepted
/// commitment of a cycle until `finalize`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EpochState {
    pub active_since: Option<Timestamp>,
    pub current_price: Price,
    /// Number of completed (finalized while active) epochs.
    pub epoch: u64,
    pub last_finalized_at: Option<Timestamp>,
}

impl EpochState {
    pub fn new(initial_price: Price) -> Self {
        Self {
            active_since: None,
            current_price: initial_price,
            epoch: 0,
            last_finalized_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active_since.is_some()
    }
}

impl Default for EpochState {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_PRICE)
    }
}

// ── MarketState ───────────────────────────────────────────────────────────────

/// Issuance totals maintained by the buy/sell path.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MarketState {
    /// Sum of all account balances.
    pub total_issued: Balance,
    /// Reserve units held against outstanding supply.
    pub reserve: Balance,
    /// Fees withheld from buys and sells (reserve units).
    pub fees_collected: Balance,
}
