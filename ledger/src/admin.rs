//! Admin adjustments
//!
//! Signed corrections with a mandatory reason. Grants count as earned
//! points; deductions walk `total_earned` back and can never overdraw.

use kudos_core::directory::validate_id;
use kudos_core::{Balance, Counterparties, LedgerError, Result, Transaction, TransactionKind};
use serde_json::json;

use crate::balance_store::{BalanceStore, CreditReason, DebitReason};
use crate::context::LedgerContext;
use crate::transaction_log::TransactionLog;

#[derive(Debug, Clone)]
pub struct Adjustment {
    pub transaction: Transaction,
    pub balance: Balance,
}

#[derive(Debug, Clone)]
pub struct AdminEngine {
    ctx: LedgerContext,
}

impl AdminEngine {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn grant(&self, account: &str, amount: u64, reason: &str, admin: &str) -> Result<Adjustment> {
        let delta = i64::try_from(amount)
            .map_err(|_| LedgerError::validation(format!("grant {} is too large", amount)))?;
        self.adjust(account, delta, reason, admin)
    }

    pub fn deduct(&self, account: &str, amount: u64, reason: &str, admin: &str) -> Result<Adjustment> {
        let delta = i64::try_from(amount)
            .map_err(|_| LedgerError::validation(format!("deduction {} is too large", amount)))?;
        self.adjust(account, -delta, reason, admin)
    }

    /// Positive `delta` grants, negative deducts.
    pub fn adjust(&self, account: &str, delta: i64, reason: &str, admin: &str) -> Result<Adjustment> {
        validate_id("account", account)?;
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::validation("adjustment reason is required"));
        }
        if delta == 0 {
            return Err(LedgerError::validation("adjustment must be non-zero"));
        }

        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;
        let amount = delta.unsigned_abs();
        let metadata = json!({ "reason": reason, "admin": admin });

        let result = self.ctx.db.transaction(|txn| {
            let (balance, transaction) = if delta > 0 {
                let balance = BalanceStore::credit(
                    txn,
                    account,
                    amount,
                    CreditReason::Earned,
                    default_limit,
                    now,
                )?;
                let tx = Transaction::new(
                    TransactionKind::AdminGrant,
                    Counterparties::to_account(account),
                    amount,
                    reason,
                    now,
                );
                (balance, tx)
            } else {
                let balance = BalanceStore::debit(
                    txn,
                    account,
                    amount,
                    DebitReason::Correction,
                    default_limit,
                    now,
                )?;
                let tx = Transaction::new(
                    TransactionKind::AdminDeduct,
                    Counterparties::from_account(account),
                    amount,
                    reason,
                    now,
                );
                (balance, tx)
            };
            let transaction = transaction.with_metadata(metadata.clone());
            TransactionLog::record(txn, &transaction)?;
            Ok(Adjustment {
                transaction,
                balance,
            })
        });

        match &result {
            Ok(adjustment) => tracing::info!(
                account,
                delta,
                admin,
                available = adjustment.balance.available_points,
                "admin adjustment applied"
            ),
            Err(err) => tracing::warn!(account, delta, admin, error = %err, "admin adjustment rejected"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;

    #[test]
    fn test_grant_then_deduct() {
        let f = fixture(&["alice"]);
        let admin = f.ledger.admin();

        let granted = admin.adjust("alice", 80, "onboarding bonus", "root").unwrap();
        assert_eq!(granted.transaction.kind, TransactionKind::AdminGrant);
        assert_eq!(granted.balance.available_points, 80);
        assert_eq!(granted.balance.total_earned, 80);

        let deducted = admin.adjust("alice", -30, "duplicate bonus", "root").unwrap();
        assert_eq!(deducted.transaction.kind, TransactionKind::AdminDeduct);
        assert_eq!(deducted.transaction.amount, 30);
        assert_eq!(deducted.balance.available_points, 50);
        assert_eq!(deducted.balance.total_earned, 50);
        assert_eq!(deducted.transaction.metadata["admin"], "root");
    }

    #[test]
    fn test_deduct_cannot_overdraw() {
        let f = fixture(&["alice"]);
        let admin = f.ledger.admin();
        admin.grant("alice", 10, "seed", "root").unwrap();
        let err = admin.deduct("alice", 11, "too much", "root").unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(f.ctx.db.transaction_count(), 1);
    }

    #[test]
    fn test_reason_and_delta_required() {
        let f = fixture(&["alice"]);
        let admin = f.ledger.admin();
        assert!(admin.adjust("alice", 0, "nothing", "root").is_err());
        assert!(admin.adjust("alice", 5, "   ", "root").is_err());
        assert!(admin.adjust("ghost", 5, "who", "root").is_err());
        assert_eq!(f.ctx.db.transaction_count(), 0);
    }
}
