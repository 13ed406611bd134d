use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::path::Path;

use tally_core::account::Account;
use tally_core::candidate::{CandidateNode, ListHeader};
use tally_core::error::TallyError;
use tally_core::protocol::{EpochState, MarketState, ProtocolParams};
use tally_core::types::{AccountId, NodeIndex, Price, TxId};

const META_LIST_HEADER: &str = "list_header";
const META_EPOCH: &str = "epoch";
const META_PARAMS: &str = "params";
const META_MARKET: &str = "market";

fn storage(e: sled::Error) -> TallyError {
    TallyError::Storage(e.to_string())
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, TallyError> {
    bincode::deserialize(bytes).map_err(|e| TallyError::Serialization(e.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, TallyError> {
    bincode::serialize(value).map_err(|e| TallyError::Serialization(e.to_string()))
}

type Entries = Vec<(Vec<u8>, Vec<u8>)>;

/// Writes gathered from one staged transaction, applied by
/// `StateDb::apply_batch` in a single sled transaction across every tree.
#[derive(Default)]
pub struct WriteBatch {
    accounts: Entries,
    nodes: Entries,
    prices: Entries,
    meta: Entries,
    applied: Vec<Vec<u8>>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
            && self.nodes.is_empty()
            && self.prices.is_empty()
            && self.meta.is_empty()
            && self.applied.is_empty()
    }

    pub fn put_account(&mut self, account: &Account) -> Result<(), TallyError> {
        self.accounts.push((account.account_id.as_bytes().to_vec(), encode(account)?));
        Ok(())
    }

    pub fn put_node(&mut self, node: &CandidateNode) -> Result<(), TallyError> {
        self.nodes.push((node.index.to_be_bytes().to_vec(), encode(node)?));
        Ok(())
    }

    pub fn put_price_index(&mut self, price: Price, index: NodeIndex) {
        self.prices.push((price.to_be_bytes().to_vec(), index.to_be_bytes().to_vec()));
    }

    fn put_meta<T: Serialize>(&mut self, key: &str, value: &T) -> Result<(), TallyError> {
        self.meta.push((key.as_bytes().to_vec(), encode(value)?));
        Ok(())
    }

    pub fn put_list_header(&mut self, header: &ListHeader) -> Result<(), TallyError> {
        self.put_meta(META_LIST_HEADER, header)
    }

    pub fn put_epoch(&mut self, epoch: &EpochState) -> Result<(), TallyError> {
        self.put_meta(META_EPOCH, epoch)
    }

    pub fn put_params(&mut self, params: &ProtocolParams) -> Result<(), TallyError> {
        self.put_meta(META_PARAMS, params)
    }

    pub fn put_market(&mut self, market: &MarketState) -> Result<(), TallyError> {
        self.put_meta(META_MARKET, market)
    }

    pub fn mark_applied(&mut self, tx_id: &TxId) {
        self.applied.push(tx_id.as_bytes().to_vec());
    }
}

/// Persistent state database backed by sled (pure-Rust, no C dependencies).
///
/// Named trees (analogous to column families):
///   accounts — AccountId bytes   → bincode(Account)
///   nodes    — NodeIndex BE      → bincode(CandidateNode)
///   prices   — Price BE          → NodeIndex BE
///   applied  — TxId bytes        → [] (membership set)
///   meta     — utf8 key bytes    → bincode(ListHeader | EpochState | ...)
pub struct StateDb {
    _db: sled::Db,
    accounts: sled::Tree,
    nodes: sled::Tree,
    prices: sled::Tree,
    applied: sled::Tree,
    meta: sled::Tree,
}

impl StateDb {
    /// Open or create the state database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TallyError> {
        let db = sled::open(path).map_err(storage)?;
        let accounts = db.open_tree("accounts").map_err(storage)?;
        let nodes    = db.open_tree("nodes").map_err(storage)?;
        let prices   = db.open_tree("prices").map_err(storage)?;
        let applied  = db.open_tree("applied").map_err(storage)?;
        let meta     = db.open_tree("meta").map_err(storage)?;
        Ok(Self { _db: db, accounts, nodes, prices, applied, meta })
    }

    /// Apply every write in `batch` atomically: either all trees see the
    /// batch or none do, including across a crash.
    pub fn apply_batch(&self, batch: &WriteBatch) -> Result<(), TallyError> {
        if batch.is_empty() {
            return Ok(());
        }
        (&self.accounts, &self.nodes, &self.prices, &self.meta, &self.applied)
            .transaction(|(accounts, nodes, prices, meta, applied)| {
                for (k, v) in &batch.accounts {
                    accounts.insert(k.as_slice(), v.as_slice())?;
                }
                for (k, v) in &batch.nodes {
                    nodes.insert(k.as_slice(), v.as_slice())?;
                }
                for (k, v) in &batch.prices {
                    prices.insert(k.as_slice(), v.as_slice())?;
                }
                for (k, v) in &batch.meta {
                    meta.insert(k.as_slice(), v.as_slice())?;
                }
                for k in &batch.applied {
                    applied.insert(k.as_slice(), b"".as_ref())?;
                }
                Ok::<(), ConflictableTransactionError<TallyError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => storage(e),
            })
    }

    // ── Accounts ─────────────────────────────────────────────────────────────

    pub fn get_account(&self, id: &AccountId) -> Result<Option<Account>, TallyError> {
        match self.accounts.get(id.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    // ── Candidate nodes ──────────────────────────────────────────────────────

    pub fn get_node(&self, index: NodeIndex) -> Result<Option<CandidateNode>, TallyError> {
        match self.nodes.get(index.to_be_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put_node(&self, node: &CandidateNode) -> Result<(), TallyError> {
        self.nodes
            .insert(node.index.to_be_bytes(), encode(node)?)
            .map_err(storage)?;
        Ok(())
    }

    /// All stored nodes in slot order. The head is only stored once it has
    /// been linked to something.
    pub fn iter_nodes(&self) -> Result<Vec<CandidateNode>, TallyError> {
        let mut out = Vec::new();
        for item in self.nodes.iter() {
            let (_, bytes) = item.map_err(storage)?;
            out.push(decode(&bytes)?);
        }
        Ok(out)
    }

    pub fn get_price_index(&self, price: Price) -> Result<Option<NodeIndex>, TallyError> {
        match self.prices.get(price.to_be_bytes()).map_err(storage)? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes
                    .as_ref()
                    .try_into()
                    .map_err(|_| TallyError::Serialization("price index entry is not 8 bytes".into()))?;
                Ok(Some(NodeIndex::from_be_bytes(arr)))
            }
            None => Ok(None),
        }
    }

    pub fn put_price_index(&self, price: Price, index: NodeIndex) -> Result<(), TallyError> {
        self.prices
            .insert(price.to_be_bytes(), index.to_be_bytes().to_vec())
            .map_err(storage)?;
        Ok(())
    }

    // ── Applied transactions ─────────────────────────────────────────────────

    pub fn is_applied(&self, tx_id: &TxId) -> bool {
        self.applied.contains_key(tx_id.as_bytes()).unwrap_or(false)
    }

    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    // ── Meta ──────────────────────────────────────────────────────────────────

    fn get_meta<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, TallyError> {
        match self.meta.get(key.as_bytes()).map_err(storage)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put_meta<T: Serialize>(&self, key: &str, value: &T) -> Result<(), TallyError> {
        self.meta.insert(key.as_bytes(), encode(value)?).map_err(storage)?;
        Ok(())
    }

    /// Header of the candidate arena; a fresh db holds only the head slot.
    pub fn get_list_header(&self) -> Result<ListHeader, TallyError> {
        Ok(self.get_meta(META_LIST_HEADER)?.unwrap_or_default())
    }

    pub fn get_epoch(&self) -> Result<EpochState, TallyError> {
        Ok(self.get_meta(META_EPOCH)?.unwrap_or_default())
    }

    pub fn put_epoch(&self, epoch: &EpochState) -> Result<(), TallyError> {
        self.put_meta(META_EPOCH, epoch)
    }

    pub fn get_params(&self) -> Result<ProtocolParams, TallyError> {
        Ok(self.get_meta(META_PARAMS)?.unwrap_or_default())
    }

    pub fn put_params(&self, params: &ProtocolParams) -> Result<(), TallyError> {
        self.put_meta(META_PARAMS, params)
    }

    pub fn get_market(&self) -> Result<MarketState, TallyError> {
        Ok(self.get_meta(META_MARKET)?.unwrap_or_default())
    }

    /// True once genesis has written protocol params.
    pub fn is_initialised(&self) -> bool {
        self.meta.contains_key(META_PARAMS.as_bytes()).unwrap_or(false)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), TallyError> {
        self._db.flush().map_err(storage)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_db(name: &str) -> StateDb {
        let dir = std::env::temp_dir().join(format!("tally_db_test_{}", name));
        let _ = std::fs::remove_dir_all(&dir);
        StateDb::open(&dir).expect("open temp db")
    }

    #[test]
    fn fresh_db_defaults() {
        let db = temp_db("fresh");
        assert_eq!(db.get_list_header().unwrap(), ListHeader::default());
        assert_eq!(db.get_epoch().unwrap(), EpochState::default());
        assert!(!db.is_initialised());
        assert!(db.get_node(0).unwrap().is_none());
    }

    #[test]
    fn price_index_roundtrip() {
        let db = temp_db("price_index");
        db.put_price_index(8_000, 4).unwrap();
        assert_eq!(db.get_price_index(8_000).unwrap(), Some(4));
        assert_eq!(db.get_price_index(60).unwrap(), None);
    }

    #[test]
    fn nodes_iterate_in_slot_order() {
        let db = temp_db("node_order");
        for i in [3u64, 1, 2] {
            let mut n = CandidateNode::head();
            n.index = i;
            n.price = i as u128 * 10;
            db.put_node(&n).unwrap();
        }
        let idx: Vec<u64> = db.iter_nodes().unwrap().iter().map(|n| n.index).collect();
        assert_eq!(idx, vec![1, 2, 3]);
    }

    #[test]
    fn batch_lands_in_every_tree() {
        let db = temp_db("batch");
        let mut node = CandidateNode::head();
        node.index = 1;
        node.price = 60;
        let tx_id = TxId::from_bytes([9; 32]);

        let mut batch = WriteBatch::new();
        batch.put_node(&node).unwrap();
        batch.put_price_index(60, 1);
        batch.put_list_header(&ListHeader { len: 2, tail: 1 }).unwrap();
        batch.put_params(&ProtocolParams::default()).unwrap();
        batch.mark_applied(&tx_id);
        assert!(!db.is_initialised());

        db.apply_batch(&batch).unwrap();
        assert_eq!(db.get_node(1).unwrap(), Some(node));
        assert_eq!(db.get_price_index(60).unwrap(), Some(1));
        assert_eq!(db.get_list_header().unwrap(), ListHeader { len: 2, tail: 1 });
        assert!(db.is_initialised());
        assert!(db.is_applied(&tx_id));
    }

    #[test]
    fn empty_batch_is_a_no_op() {
        let db = temp_db("empty_batch");
        db.apply_batch(&WriteBatch::new()).unwrap();
        assert_eq!(db.account_count(), 0);
        assert_eq!(db.applied_count(), 0);
    }
}
