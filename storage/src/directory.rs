//! Account directory and product/inventory collaborators
//!
//! Both live in the ledger database so that inventory and the active flag
//! are part of every producer's read set.

use chrono::{DateTime, Utc};
use kudos_core::directory::validate_id;
use kudos_core::{Account, Entity, LedgerError, Product, Result};

use crate::db::{decode, storage_err, LedgerDb};
use crate::txn::{abort, OrAbort};

impl LedgerDb {
    // ==================== Accounts ====================

    /// Add an account to the directory. Re-registering an existing id
    /// updates its display name and leaves the active flag alone.
    pub fn register_account(
        &self,
        id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        validate_id("account", id)?;
        self.transaction(|txn| {
            let account = match txn.account(id)? {
                Some(mut existing) => {
                    existing.display_name = display_name.to_string();
                    existing
                }
                None => Account {
                    id: id.to_string(),
                    display_name: display_name.to_string(),
                    active: true,
                    created_at: now,
                },
            };
            txn.put_account(&account)?;
            Ok(account)
        })
    }

    pub fn set_account_active(&self, id: &str, active: bool) -> Result<Account> {
        self.transaction(|txn| {
            let mut account = match txn.account(id)? {
                Some(account) => account,
                None => return abort(LedgerError::not_found(Entity::Account, id)),
            };
            account.active = active;
            txn.put_account(&account)?;
            Ok(account)
        })
    }

    pub fn account(&self, id: &str) -> Result<Option<Account>> {
        Self::get_record(&self.accounts, id.as_bytes())
    }

    /// Ids of every active account, in key order
    pub fn active_accounts(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for item in self.accounts.iter() {
            let (_key, value) = item.map_err(storage_err)?;
            let account: Account = decode(&value)?;
            if account.active {
                ids.push(account.id);
            }
        }
        Ok(ids)
    }

    // ==================== Products ====================

    pub fn upsert_product(&self, product: Product) -> Result<Product> {
        product.validate()?;
        self.transaction(|txn| {
            txn.put_product(&product)?;
            Ok(product.clone())
        })
    }

    pub fn product(&self, id: &str) -> Result<Option<Product>> {
        Self::get_record(&self.products, id.as_bytes())
    }

    pub fn set_product_active(&self, id: &str, active: bool) -> Result<Product> {
        self.transaction(|txn| {
            let mut product = match txn.product(id)? {
                Some(product) => product,
                None => return abort(LedgerError::not_found(Entity::Product, id)),
            };
            product.active = active;
            txn.put_product(&product)?;
            Ok(product)
        })
    }

    /// Add stock to a product
    pub fn restock(&self, id: &str, quantity: u64) -> Result<Product> {
        if quantity == 0 {
            return Err(LedgerError::validation("restock quantity must be positive"));
        }
        self.transaction(|txn| {
            let mut product = match txn.product(id)? {
                Some(product) => product,
                None => return abort(LedgerError::not_found(Entity::Product, id)),
            };
            product.inventory = product
                .inventory
                .checked_add(quantity)
                .ok_or_else(|| LedgerError::validation("inventory overflow"))
                .or_abort()?;
            txn.put_product(&product)?;
            Ok(product)
        })
    }
}
