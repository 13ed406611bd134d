/// ─── Tally Protocol Constants ───────────────────────────────────────────────
///
/// Defaults for a fresh deployment. Every value here can be overridden per
/// deployment through `ProtocolParams` in the genesis params file.

// ── Candidate list ───────────────────────────────────────────────────────────

/// Slot of the permanent sentinel head node.
pub const HEAD_INDEX: u64 = 0;

/// "No neighbor" marker for `prev` / `next` slot references.
pub const NO_NEIGHBOR: u64 = u64::MAX;

// ── Voting epoch ─────────────────────────────────────────────────────────────

/// Dwell time between the first commitment of an epoch and the earliest
/// finalization (seconds). Default: 24 hours.
pub const DEFAULT_DWELL_SECS: i64 = 24 * 3600;

// ── Thresholds & fees ────────────────────────────────────────────────────────

pub const BPS_DENOMINATOR: u128 = 10_000;

/// Minimum commitment as a share of total issued supply: 5 bps = 0.05%.
pub const DEFAULT_MIN_VOTE_BPS: u128 = 5;

/// Fee charged on buys and sells, in basis points of the payment / payout.
pub const DEFAULT_TRADE_FEE_BPS: u128 = 100;

/// Smallest accepted purchase payment (reserve units).
pub const DEFAULT_MIN_PURCHASE: u128 = 1_000;

/// Reference price before the first finalization.
pub const DEFAULT_INITIAL_PRICE: u128 = 1_000;
