use tally_core::error::TallyError;
use tally_core::protocol::{EpochState, ProtocolParams};
use tally_core::types::TxId;

use crate::candidates::CandidateList;
use crate::db::{StateDb, WriteBatch};
use crate::ledger::Ledger;

/// Every mutable piece of state one transaction can touch, staged in memory.
///
/// Nothing reaches the db until `commit`; dropping a `Staged` after an error
/// reverts the whole transaction. `commit` writes everything in one sled
/// transaction, so a crash never leaves a half-spliced list on disk.
pub struct Staged<'a> {
    pub ledger: Ledger<'a>,
    pub list: CandidateList<'a>,
    pub epoch: EpochState,
    pub params: ProtocolParams,
    params_dirty: bool,
    applied: Option<TxId>,
    db: &'a StateDb,
}

impl<'a> Staged<'a> {
    pub fn open(db: &'a StateDb) -> Result<Self, TallyError> {
        Ok(Self {
            ledger: Ledger::open(db)?,
            list: CandidateList::open(db)?,
            epoch: db.get_epoch()?,
            params: db.get_params()?,
            params_dirty: false,
            applied: None,
            db,
        })
    }

    /// Replace the protocol parameters; written on `commit`.
    pub fn set_params(&mut self, params: ProtocolParams) {
        self.params = params;
        self.params_dirty = true;
    }

    /// Record `tx_id` as applied in the same write as its effects.
    pub fn mark_applied(&mut self, tx_id: TxId) {
        self.applied = Some(tx_id);
    }

    pub fn commit(self) -> Result<(), TallyError> {
        let mut batch = WriteBatch::new();
        self.ledger.write_to(&mut batch)?;
        self.list.write_to(&mut batch)?;
        batch.put_epoch(&self.epoch)?;
        if self.params_dirty {
            batch.put_params(&self.params)?;
        }
        if let Some(tx_id) = &self.applied {
            batch.mark_applied(tx_id);
        }
        self.db.apply_batch(&batch)
    }
}
