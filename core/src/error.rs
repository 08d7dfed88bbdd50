//! Ledger error taxonomy
//!
//! Every engine returns [`LedgerError`]. Business-rule variants are raised
//! before any write reaches storage; `StorageTransactionAborted` is the only
//! transient variant and callers may retry it.

use thiserror::Error;

/// Kind of entity named in a [`LedgerError::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Account,
    Order,
    Product,
    Transaction,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Account => "account",
            Entity::Order => "order",
            Entity::Product => "product",
            Entity::Transaction => "transaction",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient balance for {account}: requested {requested}, available {available}")]
    InsufficientBalance {
        account: String,
        requested: u64,
        available: u64,
    },

    #[error("Monthly quota exceeded for {account}: used {used} + requested {requested} > limit {limit}")]
    MonthlyQuotaExceeded {
        account: String,
        used: u64,
        requested: u64,
        limit: u64,
    },

    #[error("Inventory unavailable for product {product}: requested {requested}, available {available}")]
    InventoryUnavailable {
        product: String,
        requested: u64,
        available: u64,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Storage transaction aborted: {0}")]
    StorageTransactionAborted(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation(message.into())
    }

    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        LedgerError::InvalidStateTransition(message.into())
    }

    /// True only for transient storage failures; business errors never succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::StorageTransactionAborted(_))
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_aborts_are_retryable() {
        assert!(LedgerError::StorageTransactionAborted("conflict".into()).is_retryable());
        assert!(!LedgerError::validation("bad amount").is_retryable());
        assert!(!LedgerError::Storage("disk gone".into()).is_retryable());
    }

    #[test]
    fn test_not_found_message_names_entity() {
        let err = LedgerError::not_found(Entity::Product, "mug");
        assert_eq!(err.to_string(), "product not found: mug");
    }
}
