//! Sled-based persistence for the points ledger
//!
//! A `LedgerDb` is the explicit storage handle every engine receives. It is
//! cheap to clone (sled handles are reference counted) and owns no global
//! state; the caller opens it on startup and drops it on shutdown.

use kudos_core::{LedgerError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::Transactional;
use std::path::Path;

use crate::keys;
use crate::txn::LedgerTxn;

const TREE_ACCOUNTS: &str = "accounts";
const TREE_PRODUCTS: &str = "products";
const TREE_BALANCES: &str = "balances";
const TREE_TRANSACTIONS: &str = "transactions";
const TREE_ORDERS: &str = "orders";
const TREE_INDEX: &str = "index";

/// Result type of a closure run inside [`LedgerDb::transaction`].
pub type TxnResult<T> = ConflictableTransactionResult<T, LedgerError>;

#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: sled::Db,
    pub(crate) accounts: sled::Tree,
    pub(crate) products: sled::Tree,
    pub(crate) balances: sled::Tree,
    pub(crate) transactions: sled::Tree,
    pub(crate) orders: sled::Tree,
    pub(crate) index: sled::Tree,
    path: Option<String>,
}

impl LedgerDb {
    /// Open or create the database
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let db = sled::open(&path)
            .map_err(|e| LedgerError::Storage(format!("Failed to open database: {}", e)))?;
        Self::from_db(db, Some(path_str))
    }

    /// In-memory database removed on drop
    pub fn open_temporary() -> Result<Self> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| LedgerError::Storage(format!("Failed to open temporary database: {}", e)))?;
        Self::from_db(db, None)
    }

    fn from_db(db: sled::Db, path: Option<String>) -> Result<Self> {
        let open = |name: &str| {
            db.open_tree(name)
                .map_err(|e| LedgerError::Storage(format!("Failed to open tree {}: {}", name, e)))
        };
        Ok(LedgerDb {
            accounts: open(TREE_ACCOUNTS)?,
            products: open(TREE_PRODUCTS)?,
            balances: open(TREE_BALANCES)?,
            transactions: open(TREE_TRANSACTIONS)?,
            orders: open(TREE_ORDERS)?,
            index: open(TREE_INDEX)?,
            db,
            path,
        })
    }

    /// Get the database path (`None` for temporary databases)
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Run `f` as one serializable storage transaction.
    ///
    /// Every read and write `f` performs through the [`LedgerTxn`] commits
    /// together or not at all. Conflicts with concurrent transactions are
    /// retried by sled; an aborted closure returns its `LedgerError` with no
    /// effect; a storage-level failure is retried once and then reported as
    /// `StorageTransactionAborted`. `f` may run more than once and must not
    /// perform external side effects.
    ///
    /// Once sled has committed, the call succeeds. A failed flush after the
    /// commit is logged and left to sled's background flusher; reporting it
    /// as an error would invite the caller to apply the operation twice.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: Fn(&LedgerTxn<'_>) -> TxnResult<T>,
    {
        let value = retry_storage_once(|| {
            (
                &self.accounts,
                &self.products,
                &self.balances,
                &self.transactions,
                &self.orders,
                &self.index,
            )
                .transaction(|(accounts, products, balances, transactions, orders, index)| {
                    let txn = LedgerTxn {
                        accounts,
                        products,
                        balances,
                        transactions,
                        orders,
                        index,
                    };
                    f(&txn)
                })
        })?;
        Ok(committed(value, self.flush()))
    }

    /// Flush to disk to ensure durability
    pub fn flush(&self) -> Result<()> {
        self.db
            .flush()
            .map_err(|e| LedgerError::Storage(format!("Failed to flush database: {}", e)))?;
        Ok(())
    }

    /// Remove the grant markers of every cycle `is_stale` accepts. Returns
    /// the number of markers removed.
    pub fn prune_grant_markers(&self, is_stale: impl Fn(&str) -> bool) -> Result<usize> {
        let mut removed = 0;
        for item in self.index.scan_prefix(keys::grant_prefix()) {
            let (key, _) = item.map_err(storage_err)?;
            if keys::grant_cycle(&key).is_some_and(&is_stale) {
                self.index.remove(&key).map_err(storage_err)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Number of grant markers currently held
    pub fn grant_marker_count(&self) -> usize {
        self.index.scan_prefix(keys::grant_prefix()).count()
    }

    pub(crate) fn get_record<T: DeserializeOwned>(
        tree: &sled::Tree,
        key: &[u8],
    ) -> Result<Option<T>> {
        match tree.get(key) {
            Ok(Some(data)) => Ok(Some(decode(&data)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(LedgerError::Storage(format!("Failed to load record: {}", e))),
        }
    }
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| LedgerError::Serialization(format!("Failed to serialize record: {}", e)))
}

pub(crate) fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data)
        .map_err(|e| LedgerError::Serialization(format!("Failed to deserialize record: {}", e)))
}

pub(crate) fn storage_err(e: sled::Error) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

/// Run `attempt` again after a storage-level failure, once. Aborts pass
/// through untouched.
pub(crate) fn retry_storage_once<T, A>(mut attempt: A) -> Result<T>
where
    A: FnMut() -> std::result::Result<T, TransactionError<LedgerError>>,
{
    match attempt() {
        Ok(value) => Ok(value),
        Err(TransactionError::Abort(err)) => Err(err),
        Err(TransactionError::Storage(err)) => {
            tracing::warn!(error = %err, "storage transaction failed, retrying once");
            match attempt() {
                Ok(value) => Ok(value),
                Err(TransactionError::Abort(err)) => Err(err),
                Err(TransactionError::Storage(err)) => {
                    Err(LedgerError::StorageTransactionAborted(err.to_string()))
                }
            }
        }
    }
}

/// The committed value, whatever the flush after it reported.
pub(crate) fn committed<T>(value: T, flushed: Result<()>) -> T {
    if let Err(err) = flushed {
        tracing::warn!(error = %err, "flush after commit failed; sled will retry in the background");
    }
    value
}
