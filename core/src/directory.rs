//! Records owned by the collaborators the ledger consults: the account
//! directory and the product catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, Result};

pub const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub display_name: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub unit_cost: u64,
    pub inventory: u64,
    pub active: bool,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, unit_cost: u64, inventory: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            unit_cost,
            inventory,
            active: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_id("product", &self.id)?;
        if self.unit_cost == 0 {
            return Err(LedgerError::validation(format!(
                "product {} must cost at least 1 point",
                self.id
            )));
        }
        Ok(())
    }
}

/// Ids are used as storage key prefixes, so they may not contain NUL.
pub fn validate_id(what: &str, id: &str) -> Result<()> {
    if id.is_empty() {
        return Err(LedgerError::validation(format!("{} id is empty", what)));
    }
    if id.len() > MAX_ID_LEN {
        return Err(LedgerError::validation(format!(
            "{} id longer than {} bytes",
            what, MAX_ID_LEN
        )));
    }
    if id.contains('\0') {
        return Err(LedgerError::validation(format!(
            "{} id contains a NUL byte",
            what
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_rules() {
        assert!(validate_id("account", "alice").is_ok());
        assert!(validate_id("account", "").is_err());
        assert!(validate_id("account", "a\0b").is_err());
        assert!(validate_id("account", &"x".repeat(MAX_ID_LEN + 1)).is_err());
    }

    #[test]
    fn test_free_products_rejected() {
        assert!(Product::new("mug", "Mug", 0, 5).validate().is_err());
        assert!(Product::new("mug", "Mug", 25, 0).validate().is_ok());
    }
}
