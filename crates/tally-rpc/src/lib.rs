//! tally-rpc
//!
//! JSON-RPC 2.0 server for tally nodes.
//!
//! Namespace: "tally"
//! Methods:
//!   tally_getAccount            — balances, nonce and vote commitment
//!   tally_getBalance            — gross balance
//!   tally_sendTransaction       — submit a transaction (hex-encoded bincode)
//!   tally_getCandidates         — raw candidate nodes in slot order
//!   tally_getOrderedCandidates  — candidate nodes in weight order, head first
//!   tally_getHead / getTail     — list ends
//!   tally_getCommitment         — an account's vote record
//!   tally_getCurrentPrice       — published reference price
//!   tally_getEpoch              — voting epoch timer and counter
//!   tally_describeEpoch         — one-line epoch summary
//!   tally_locateInsert          — predecessor hint for a new candidate
//!   tally_locateCandidate       — slot of an existing candidate
//!   tally_getProtocolInfo       — protocol parameters and market totals

pub mod api;
pub mod server;
pub mod types;

pub use server::RpcServer;
pub use server::RpcServerState;
pub use types::{RpcAccount, RpcCandidate, RpcEpoch, RpcProtocolInfo, RpcVoteRecord};
