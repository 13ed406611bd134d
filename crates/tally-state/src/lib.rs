pub mod candidates;
pub mod db;
pub mod engine;
pub mod epoch;
pub mod ledger;
pub mod market;
pub mod staged;
pub mod vote;

pub use candidates::CandidateList;
pub use db::{StateDb, WriteBatch};
pub use engine::StateEngine;
pub use ledger::Ledger;
pub use staged::Staged;
