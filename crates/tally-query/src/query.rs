use tally_core::account::{Account, VoteRecord};
use tally_core::candidate::CandidateNode;
use tally_core::error::TallyError;
use tally_core::protocol::{EpochState, MarketState, ProtocolParams};
use tally_core::types::{AccountId, Balance, NodeIndex, Price, Timestamp};
use tally_state::{CandidateList, StateDb};

use crate::locate::CandidateSnapshot;

/// Read-only views over committed state.
pub struct CandidateQuery<'a> {
    db: &'a StateDb,
}

impl<'a> CandidateQuery<'a> {
    pub fn new(db: &'a StateDb) -> Self {
        Self { db }
    }

    fn list(&self) -> Result<CandidateList<'a>, TallyError> {
        CandidateList::open(self.db)
    }

    /// Raw slot-order node array, head at index 0.
    pub fn snapshot(&self) -> Result<CandidateSnapshot, TallyError> {
        Ok(CandidateSnapshot::new(self.list()?.slots()?))
    }

    /// Nodes in sorted order, head first.
    pub fn ordered(&self) -> Result<Vec<CandidateNode>, TallyError> {
        self.list()?.ordered()
    }

    pub fn head(&self) -> Result<CandidateNode, TallyError> {
        self.list()?.head()
    }

    pub fn tail(&self) -> Result<CandidateNode, TallyError> {
        self.list()?.tail()
    }

    pub fn account(&self, id: &AccountId) -> Result<Account, TallyError> {
        Ok(self.db.get_account(id)?.unwrap_or_else(|| Account::new(id.clone())))
    }

    pub fn commitment(&self, id: &AccountId) -> Result<Option<VoteRecord>, TallyError> {
        Ok(self.account(id)?.vote)
    }

    pub fn locate_insert(&self, weight: Balance) -> Result<NodeIndex, TallyError> {
        self.list()?.locate_insert(weight)
    }

    pub fn locate_candidate(&self, price: Price) -> Result<Option<NodeIndex>, TallyError> {
        self.list()?.index_of(price)
    }

    pub fn epoch(&self) -> Result<EpochState, TallyError> {
        self.db.get_epoch()
    }

    pub fn current_price(&self) -> Result<Price, TallyError> {
        Ok(self.db.get_epoch()?.current_price)
    }

    pub fn params(&self) -> Result<ProtocolParams, TallyError> {
        self.db.get_params()
    }

    pub fn market(&self) -> Result<MarketState, TallyError> {
        self.db.get_market()
    }

    /// Human-readable summary of the voting epoch.
    pub fn describe_epoch(&self, now: Timestamp) -> Result<String, TallyError> {
        let epoch = self.epoch()?;
        let dwell = self.params()?.dwell_secs;
        let tail = self.tail()?;

        let status = match epoch.active_since {
            None => "Idle, waiting for the first commitment".to_string(),
            Some(since) => {
                let remaining = since.saturating_add(dwell).saturating_sub(now);
                if remaining > 0 {
                    format!("Active since {}, closes in {} s", since, remaining)
                } else {
                    format!("Active since {}, ready to finalize", since)
                }
            }
        };
        let leader = if tail.is_head() {
            "no candidates".to_string()
        } else {
            format!("leader {} with weight {}", tail.price, tail.weight)
        };

        Ok(format!(
            "Epoch {} | price {} | {} | {}",
            epoch.epoch + 1,
            epoch.current_price,
            status,
            leader
        ))
    }
}
