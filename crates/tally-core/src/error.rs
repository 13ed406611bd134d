use thiserror::Error;

use crate::types::{NodeIndex, Price, Timestamp};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TallyError {
    // ── Input validity ───────────────────────────────────────────────────────
    #[error("amount and price must be greater than zero")]
    NonPositiveInput,

    #[error("self-transfer not allowed")]
    SelfTransfer,

    #[error("payment below minimum ({min} required)")]
    PaymentTooSmall { min: u128 },

    #[error("invalid account id: {0}")]
    InvalidAccountId(String),

    #[error("invalid protocol parameters: {0}")]
    InvalidParams(String),

    // ── State conflict / staleness ───────────────────────────────────────────
    #[error("stale or invalid list position: node {index}")]
    StaleOrInvalidPosition { index: NodeIndex },

    #[error("node {index} does not hold candidate price {price}")]
    MismatchedCandidate { index: NodeIndex, price: Price },

    #[error("candidate for price {0} already exists")]
    CandidateExists(Price),

    #[error("account already holds a vote commitment")]
    AlreadyCommitted,

    // ── Authorization / threshold ────────────────────────────────────────────
    #[error("insufficient voting power: need {need}, have {have}")]
    InsufficientPower { need: u128, have: u128 },

    #[error("commitment below minimum stake ({min} required)")]
    BelowThreshold { min: u128 },

    // ── Balance / lock ───────────────────────────────────────────────────────
    #[error("insufficient balance: need {need}, have {have}")]
    InsufficientBalance { need: u128, have: u128 },

    #[error("tokens locked by vote: {locked} locked, {spendable} spendable")]
    TokensLocked { locked: u128, spendable: u128 },

    #[error("market reserve cannot cover payout of {need} (reserve {have})")]
    InsufficientReserve { need: u128, have: u128 },

    // ── Timing ───────────────────────────────────────────────────────────────
    #[error("voting epoch still open (closes at {closes_at})")]
    TooEarly { closes_at: Timestamp },

    // ── Transaction envelope ─────────────────────────────────────────────────
    #[error("invalid nonce: expected {expected}, got {got}")]
    InvalidNonce { expected: u64, got: u64 },

    #[error("transaction already applied: {0}")]
    DuplicateTransaction(String),

    #[error("transaction id does not match its body")]
    TxIdMismatch,

    #[error("arithmetic overflow")]
    Overflow,

    // ── Serialization / storage ──────────────────────────────────────────────
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Other(String),
}

impl TallyError {
    /// True for rejections caused by a caller acting on an outdated view of
    /// the candidate list. The caller can re-locate against fresh state and
    /// resubmit; nothing is retried on its behalf.
    pub fn is_stale(&self) -> bool {
        matches!(
            self,
            TallyError::StaleOrInvalidPosition { .. }
                | TallyError::MismatchedCandidate { .. }
                | TallyError::CandidateExists(_)
        )
    }
}
