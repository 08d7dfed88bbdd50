//! Kudos Storage Layer
//!
//! Sled-backed storage for the points ledger:
//! - one explicit `LedgerDb` handle, opened by the caller
//! - `LedgerDb::transaction` as the single atomic scope producers run in
//! - account directory and product inventory in the same database
//! - read-only history, order and leaderboard queries

mod db;
mod directory;
mod keys;
mod query;
mod txn;

pub use db::{LedgerDb, TxnResult};
pub use query::{HistoryQuery, LeaderboardEntry};
pub use txn::{abort, LedgerTxn, OrAbort};
