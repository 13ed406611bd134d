use std::sync::Arc;

use tally_core::error::TallyError;
use tally_core::transaction::{Action, Transaction};
use tally_core::types::{AccountId, Timestamp};
use tracing::{info, warn};

use crate::db::StateDb;
use crate::epoch;
use crate::market;
use crate::staged::Staged;
use crate::vote::{self, Position};

// ── StateEngine ───────────────────────────────────────────────────────────────

/// The state transition engine.
///
/// Validates and applies transactions to the persistent state database.
/// Each `apply` call is atomic: either all actions succeed or none do.
/// Callers must serialise `apply` calls; the node runs them from a single
/// queue in arrival order.
pub struct StateEngine {
    pub db: Arc<StateDb>,
}

impl StateEngine {
    pub fn new(db: Arc<StateDb>) -> Self {
        Self { db }
    }

    /// Validate and apply a transaction. Returns `Ok(())` on success.
    pub fn apply(&self, tx: &Transaction, now: Timestamp) -> Result<(), TallyError> {
        let result = self.apply_inner(tx, now);
        if let Err(e) = &result {
            warn!(tx_id = %tx.tx_id, from = %tx.from, error = %e, stale = e.is_stale(), "rejected transaction");
        }
        result
    }

    fn apply_inner(&self, tx: &Transaction, now: Timestamp) -> Result<(), TallyError> {
        // ── Envelope ──────────────────────────────────────────────────────────
        if tx.compute_id() != tx.tx_id {
            return Err(TallyError::TxIdMismatch);
        }
        if self.db.is_applied(&tx.tx_id) {
            return Err(TallyError::DuplicateTransaction(tx.tx_id.to_hex()));
        }

        let mut staged = Staged::open(&self.db)?;

        // ── Nonce check ───────────────────────────────────────────────────────
        let expected = staged.ledger.account(&tx.from)?.nonce;
        if tx.nonce != expected {
            return Err(TallyError::InvalidNonce { expected, got: tx.nonce });
        }

        // ── Apply each action ─────────────────────────────────────────────────
        for action in &tx.actions {
            self.apply_action(action, &tx.from, &mut staged, now)?;
        }

        // Increment nonce after all actions succeed.
        staged.ledger.account(&tx.from)?.nonce += 1;

        // ── Commit ────────────────────────────────────────────────────────────
        staged.mark_applied(tx.tx_id.clone());
        staged.commit()?;

        info!(tx_id = %tx.tx_id, from = %tx.from, actions = tx.actions.len(), "applied transaction");
        Ok(())
    }

    // ── Action dispatch ───────────────────────────────────────────────────────

    fn apply_action(
        &self,
        action: &Action,
        sender: &AccountId,
        staged: &mut Staged<'_>,
        now: Timestamp,
    ) -> Result<(), TallyError> {
        match action {
            // ── Ledger ───────────────────────────────────────────────────────
            Action::Transfer { to, amount } => {
                if to == sender {
                    return Err(TallyError::SelfTransfer);
                }
                vote::guard_outflow(staged, sender, *amount)?;
                staged.ledger.debit(sender, *amount)?;
                staged.ledger.credit(to, *amount)?;
            }

            Action::LockAwareTransfer { to, amount, position_hint, residual_weight } => {
                if to == sender {
                    return Err(TallyError::SelfTransfer);
                }
                vote::prepare_lock_aware_outflow(staged, sender, *amount, *position_hint, *residual_weight)?;
                staged.ledger.debit(sender, *amount)?;
                staged.ledger.credit(to, *amount)?;
            }

            Action::Buy { payment } => {
                market::buy(staged, sender, *payment)?;
            }

            Action::Sell { amount } => {
                vote::guard_outflow(staged, sender, *amount)?;
                market::sell(staged, sender, *amount)?;
            }

            Action::LockAwareSell { amount, position_hint, residual_weight } => {
                vote::prepare_lock_aware_outflow(staged, sender, *amount, *position_hint, *residual_weight)?;
                market::sell(staged, sender, *amount)?;
            }

            // ── Voting ───────────────────────────────────────────────────────
            Action::Commit { price, amount } => {
                vote::commit(staged, sender, *price, *amount, Position::Locate, now)?;
            }

            Action::CommitAt { position_hint, existing_candidate, price, amount, is_update } => {
                let position = if *is_update {
                    Position::Existing(*existing_candidate)
                } else {
                    Position::After(*position_hint)
                };
                vote::commit(staged, sender, *price, *amount, position, now)?;
            }

            Action::Finalize => {
                let dwell = staged.params.dwell_secs;
                epoch::finalize(&mut staged.epoch, &staged.list, dwell, now)?;
            }
        }
        Ok(())
    }
}
