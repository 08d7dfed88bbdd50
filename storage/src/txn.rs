//! Transactional view over the ledger trees
//!
//! Producers do all their reads and writes through a `LedgerTxn` so the
//! read set and the write set commit as one unit.

use kudos_core::directory::validate_id;
use kudos_core::{Account, Balance, LedgerError, Order, Product, Result, Transaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionalTree};

use crate::db::{decode, encode, TxnResult};
use crate::keys;

/// Turn a ledger `Result` into a transaction result that aborts on error.
pub trait OrAbort<T> {
    fn or_abort(self) -> TxnResult<T>;
}

impl<T> OrAbort<T> for Result<T> {
    fn or_abort(self) -> TxnResult<T> {
        self.map_err(ConflictableTransactionError::Abort)
    }
}

/// Abort the enclosing transaction with `err`.
pub fn abort<T>(err: LedgerError) -> TxnResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

pub struct LedgerTxn<'a> {
    pub(crate) accounts: &'a TransactionalTree,
    pub(crate) products: &'a TransactionalTree,
    pub(crate) balances: &'a TransactionalTree,
    pub(crate) transactions: &'a TransactionalTree,
    pub(crate) orders: &'a TransactionalTree,
    pub(crate) index: &'a TransactionalTree,
}

fn load<T: DeserializeOwned>(tree: &TransactionalTree, key: &[u8]) -> TxnResult<Option<T>> {
    match tree.get(key)? {
        Some(data) => Ok(Some(decode(&data).or_abort()?)),
        None => Ok(None),
    }
}

fn store<T: Serialize>(tree: &TransactionalTree, key: &[u8], value: &T) -> TxnResult<()> {
    let data = encode(value).or_abort()?;
    tree.insert(key, data)?;
    Ok(())
}

impl<'a> LedgerTxn<'a> {
    // ==================== Accounts ====================

    pub fn account(&self, id: &str) -> TxnResult<Option<Account>> {
        load(self.accounts, id.as_bytes())
    }

    pub fn put_account(&self, account: &Account) -> TxnResult<()> {
        validate_id("account", &account.id).or_abort()?;
        store(self.accounts, account.id.as_bytes(), account)
    }

    // ==================== Products ====================

    pub fn product(&self, id: &str) -> TxnResult<Option<Product>> {
        load(self.products, id.as_bytes())
    }

    pub fn put_product(&self, product: &Product) -> TxnResult<()> {
        product.validate().or_abort()?;
        store(self.products, product.id.as_bytes(), product)
    }

    // ==================== Balances ====================

    pub fn balance(&self, account: &str) -> TxnResult<Option<Balance>> {
        load(self.balances, account.as_bytes())
    }

    /// Write a balance after checking its invariants; an invalid balance
    /// aborts the whole transaction.
    pub fn put_balance(&self, balance: &Balance) -> TxnResult<()> {
        balance.validate().or_abort()?;
        store(self.balances, balance.account_id.as_bytes(), balance)
    }

    // ==================== Transaction log ====================

    /// Append a ledger entry. Entries are never rewritten; appending an id
    /// that already exists aborts.
    pub fn append(&self, tx: &Transaction) -> TxnResult<()> {
        tx.validate().or_abort()?;
        if self.transactions.get(tx.id.as_bytes())?.is_some() {
            return abort(LedgerError::invalid_transition(format!(
                "transaction {} already recorded",
                tx.id
            )));
        }
        store(self.transactions, tx.id.as_bytes(), tx)?;
        let seq = self.index.generate_id()?;
        self.index
            .insert(keys::time_index(tx.created_at, seq, &tx.id), tx.id.as_bytes())?;
        if let Some(subject) = tx.subject() {
            self.index.insert(
                keys::account_index(subject, tx.created_at, seq, &tx.id),
                tx.id.as_bytes(),
            )?;
        }
        Ok(())
    }

    pub fn transaction(&self, id: &str) -> TxnResult<Option<Transaction>> {
        load(self.transactions, id.as_bytes())
    }

    // ==================== Orders ====================

    pub fn order(&self, id: &str) -> TxnResult<Option<Order>> {
        load(self.orders, id.as_bytes())
    }

    pub fn insert_order(&self, order: &Order) -> TxnResult<()> {
        order.validate().or_abort()?;
        if self.orders.get(order.id.as_bytes())?.is_some() {
            return abort(LedgerError::invalid_transition(format!(
                "order {} already exists",
                order.id
            )));
        }
        store(self.orders, order.id.as_bytes(), order)?;
        let seq = self.index.generate_id()?;
        self.index.insert(
            keys::buyer_index(&order.buyer, order.created_at, seq, &order.id),
            order.id.as_bytes(),
        )?;
        Ok(())
    }

    pub fn put_order(&self, order: &Order) -> TxnResult<()> {
        order.validate().or_abort()?;
        store(self.orders, order.id.as_bytes(), order)
    }

    // ==================== Distribution markers ====================

    pub fn has_grant(&self, cycle: &str, account: &str) -> TxnResult<bool> {
        Ok(self
            .index
            .get(keys::grant_marker(cycle, account))?
            .is_some())
    }

    pub fn mark_grant(&self, cycle: &str, account: &str, tx_id: &str) -> TxnResult<()> {
        self.index
            .insert(keys::grant_marker(cycle, account), tx_id.as_bytes())?;
        Ok(())
    }
}
