//! Ledger transaction records
//!
//! A `Transaction` is written once, in the same storage transaction as the
//! balance change it describes, and is never updated afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::balance::AccountId;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earned,
    Spent,
    Given,
    Received,
    AdminGrant,
    AdminDeduct,
    Refund,
}

/// Which side of the counterparty pair a kind's balance change lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    From,
    To,
}

impl TransactionKind {
    pub const ALL: [TransactionKind; 7] = [
        TransactionKind::Earned,
        TransactionKind::Spent,
        TransactionKind::Given,
        TransactionKind::Received,
        TransactionKind::AdminGrant,
        TransactionKind::AdminDeduct,
        TransactionKind::Refund,
    ];

    pub fn subject_side(self) -> Side {
        match self {
            TransactionKind::Spent | TransactionKind::Given | TransactionKind::AdminDeduct => {
                Side::From
            }
            TransactionKind::Earned
            | TransactionKind::Received
            | TransactionKind::AdminGrant
            | TransactionKind::Refund => Side::To,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Earned => "earned",
            TransactionKind::Spent => "spent",
            TransactionKind::Given => "given",
            TransactionKind::Received => "received",
            TransactionKind::AdminGrant => "admin_grant",
            TransactionKind::AdminDeduct => "admin_deduct",
            TransactionKind::Refund => "refund",
        }
    }
}

impl std::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        TransactionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| LedgerError::validation(format!("unknown transaction kind: {}", s)))
    }
}

/// Nullable `from`/`to` pair. `None` on a side means the system (catalog,
/// distributor, admin) rather than an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterparties {
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
}

impl Counterparties {
    pub fn between(from: impl Into<AccountId>, to: impl Into<AccountId>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
        }
    }

    pub fn from_account(from: impl Into<AccountId>) -> Self {
        Self {
            from: Some(from.into()),
            to: None,
        }
    }

    pub fn to_account(to: impl Into<AccountId>) -> Self {
        Self {
            from: None,
            to: Some(to.into()),
        }
    }

    pub fn involves(&self, account: &str) -> bool {
        self.from.as_deref() == Some(account) || self.to.as_deref() == Some(account)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub parties: Counterparties,
    pub kind: TransactionKind,
    pub amount: u64,
    pub description: String,
    pub message: Option<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        parties: Counterparties,
        amount: u64,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            parties,
            kind,
            amount,
            description: description.into(),
            message: None,
            metadata: Value::Null,
            created_at,
        }
    }

    pub fn with_message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// The account whose balance this entry moved.
    pub fn subject(&self) -> Option<&str> {
        match self.kind.subject_side() {
            Side::From => self.parties.from.as_deref(),
            Side::To => self.parties.to.as_deref(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(LedgerError::validation(
                "transaction amount must be greater than 0",
            ));
        }
        if self.subject().is_none() {
            return Err(LedgerError::validation(format!(
                "{} transaction {} has no {} account",
                self.kind,
                self.id,
                match self.kind.subject_side() {
                    Side::From => "from",
                    Side::To => "to",
                }
            )));
        }
        Ok(())
    }
}
