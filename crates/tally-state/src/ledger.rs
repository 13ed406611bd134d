use std::collections::HashMap;

use tally_core::account::Account;
use tally_core::error::TallyError;
use tally_core::protocol::MarketState;
use tally_core::types::{AccountId, Balance};

use crate::db::{StateDb, WriteBatch};

/// Token ledger collaborator: balances and issued supply.
///
/// Staged like `CandidateList`: accounts are loaded on first touch, mutated
/// in memory, and written back only by `commit`. Unknown accounts start
/// empty.
pub struct Ledger<'a> {
    db: &'a StateDb,
    accounts: HashMap<AccountId, Account>,
    market: MarketState,
    market_dirty: bool,
}

impl<'a> Ledger<'a> {
    pub fn open(db: &'a StateDb) -> Result<Self, TallyError> {
        Ok(Self {
            db,
            accounts: HashMap::new(),
            market: db.get_market()?,
            market_dirty: false,
        })
    }

    /// Mutable handle to a staged account, loading or creating it.
    pub fn account(&mut self, id: &AccountId) -> Result<&mut Account, TallyError> {
        if !self.accounts.contains_key(id) {
            let acc = self
                .db
                .get_account(id)?
                .unwrap_or_else(|| Account::new(id.clone()));
            self.accounts.insert(id.clone(), acc);
        }
        self.accounts
            .get_mut(id)
            .ok_or_else(|| TallyError::Other(format!("account {id} not staged")))
    }

    pub fn gross_balance(&mut self, id: &AccountId) -> Result<Balance, TallyError> {
        Ok(self.account(id)?.balance)
    }

    pub fn spendable_balance(&mut self, id: &AccountId) -> Result<Balance, TallyError> {
        Ok(self.account(id)?.spendable_balance())
    }

    pub fn total_issued(&self) -> Balance {
        self.market.total_issued
    }

    pub fn market(&self) -> &MarketState {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut MarketState {
        self.market_dirty = true;
        &mut self.market
    }

    /// Remove `amount` from the gross balance. Lock checks are the caller's.
    pub fn debit(&mut self, id: &AccountId, amount: Balance) -> Result<(), TallyError> {
        let acc = self.account(id)?;
        if acc.balance < amount {
            return Err(TallyError::InsufficientBalance { need: amount, have: acc.balance });
        }
        acc.balance -= amount;
        Ok(())
    }

    pub fn credit(&mut self, id: &AccountId, amount: Balance) -> Result<(), TallyError> {
        let acc = self.account(id)?;
        acc.balance = acc.balance.checked_add(amount).ok_or(TallyError::Overflow)?;
        Ok(())
    }

    /// Credit newly issued tokens.
    pub fn mint(&mut self, id: &AccountId, amount: Balance) -> Result<(), TallyError> {
        let total = self.market.total_issued.checked_add(amount).ok_or(TallyError::Overflow)?;
        self.credit(id, amount)?;
        self.market_mut().total_issued = total;
        Ok(())
    }

    /// Debit and retire tokens.
    pub fn burn(&mut self, id: &AccountId, amount: Balance) -> Result<(), TallyError> {
        self.debit(id, amount)?;
        let market = self.market_mut();
        market.total_issued = market.total_issued.saturating_sub(amount);
        Ok(())
    }

    /// Queue staged accounts and market totals into `batch`.
    pub fn write_to(&self, batch: &mut WriteBatch) -> Result<(), TallyError> {
        for acc in self.accounts.values() {
            batch.put_account(acc)?;
        }
        if self.market_dirty {
            batch.put_market(&self.market)?;
        }
        Ok(())
    }

    pub fn commit(self) -> Result<(), TallyError> {
        let mut batch = WriteBatch::new();
        self.write_to(&mut batch)?;
        self.db.apply_batch(&batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("tally_ledger_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    fn id(b: u8) -> AccountId {
        AccountId::from_bytes([b; 32])
    }

    #[test]
    fn mint_and_burn_track_supply() {
        let db = temp_db("supply");
        let mut ledger = Ledger::open(&db).unwrap();
        ledger.mint(&id(1), 500).unwrap();
        ledger.mint(&id(2), 300).unwrap();
        ledger.burn(&id(1), 200).unwrap();
        assert_eq!(ledger.total_issued(), 600);
        assert_eq!(ledger.gross_balance(&id(1)).unwrap(), 300);
        ledger.commit().unwrap();

        assert_eq!(db.get_market().unwrap().total_issued, 600);
        assert_eq!(db.get_account(&id(2)).unwrap().unwrap().balance, 300);
    }

    #[test]
    fn debit_beyond_balance_fails() {
        let db = temp_db("overdraw");
        let mut ledger = Ledger::open(&db).unwrap();
        ledger.credit(&id(1), 10).unwrap();
        assert_eq!(
            ledger.debit(&id(1), 11).unwrap_err(),
            TallyError::InsufficientBalance { need: 11, have: 10 }
        );
    }

    #[test]
    fn uncommitted_changes_are_discarded() {
        let db = temp_db("discard");
        {
            let mut ledger = Ledger::open(&db).unwrap();
            ledger.mint(&id(1), 500).unwrap();
        }
        assert!(db.get_account(&id(1)).unwrap().is_none());
        assert_eq!(db.get_market().unwrap().total_issued, 0);
    }
}
