//! tally-query
//!
//! Read-only views over the ledger and the client side of the two-phase
//! position protocol. State transitions live in tally-state's StateEngine;
//! this crate computes the position hints callers attach to them, from a
//! snapshot that may already be stale by the time it is submitted.

pub mod locate;
pub mod query;

pub use locate::{plan_commit, plan_lock_aware, CandidateSnapshot};
pub use query::CandidateQuery;
