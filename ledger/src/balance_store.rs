//! Balance Store
//!
//! `credit` and `debit` run inside a producer's storage transaction; the
//! balance they read and the balance they write belong to the same atomic
//! scope. A balance row is created the first time a producer touches a
//! registered account.

use chrono::{DateTime, Utc};
use kudos_core::{Balance, Entity, LedgerError, Result};
use kudos_storage::{abort, LedgerTxn, OrAbort, TxnResult};

use crate::context::LedgerContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreditReason {
    /// Recognition or grant; counts toward `total_earned`
    Earned,
    /// Purchase reversal; walks `total_spent` back
    Refund,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebitReason {
    /// Catalog purchase; counts toward `total_spent`
    Purchase,
    /// Admin correction; walks `total_earned` back
    Correction,
}

#[derive(Debug, Clone)]
pub struct BalanceStore {
    ctx: LedgerContext,
}

impl BalanceStore {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Load `account`'s balance inside `txn`, creating it with the default
    /// limit if the account has no ledger activity yet.
    pub fn load(
        txn: &LedgerTxn<'_>,
        account: &str,
        default_limit: u64,
        now: DateTime<Utc>,
    ) -> TxnResult<Balance> {
        if let Some(balance) = txn.balance(account)? {
            return Ok(balance);
        }
        if txn.account(account)?.is_none() {
            return abort(LedgerError::not_found(Entity::Account, account));
        }
        Ok(Balance::new(account, default_limit, now))
    }

    pub fn credit(
        txn: &LedgerTxn<'_>,
        account: &str,
        amount: u64,
        reason: CreditReason,
        default_limit: u64,
        now: DateTime<Utc>,
    ) -> TxnResult<Balance> {
        let mut balance = Self::load(txn, account, default_limit, now)?;
        let applied = match reason {
            CreditReason::Earned => balance.credit(amount, true, now),
            CreditReason::Refund => balance.refund(amount, now),
        };
        applied.or_abort()?;
        txn.put_balance(&balance)?;
        Ok(balance)
    }

    /// Fails with `InsufficientBalance` when `amount` exceeds the available
    /// points; nothing is written in that case.
    pub fn debit(
        txn: &LedgerTxn<'_>,
        account: &str,
        amount: u64,
        reason: DebitReason,
        default_limit: u64,
        now: DateTime<Utc>,
    ) -> TxnResult<Balance> {
        let mut balance = Self::load(txn, account, default_limit, now)?;
        let applied = match reason {
            DebitReason::Purchase => balance.debit(amount, true, now),
            DebitReason::Correction => balance.correct(amount, now),
        };
        applied.or_abort()?;
        txn.put_balance(&balance)?;
        Ok(balance)
    }

    /// Current balance. A registered account with no activity reads as a
    /// fresh balance; nothing is persisted by the read.
    pub fn balance(&self, account: &str) -> Result<Balance> {
        if let Some(balance) = self.ctx.db.stored_balance(account)? {
            return Ok(balance);
        }
        match self.ctx.db.account(account)? {
            Some(_) => Ok(Balance::new(
                account,
                self.ctx.config.monthly_give_limit,
                self.ctx.clock.now(),
            )),
            None => Err(LedgerError::not_found(Entity::Account, account)),
        }
    }

    /// Change an account's monthly give cap. Lowering it below what was
    /// already given this month is rejected.
    pub fn set_monthly_limit(&self, account: &str, limit: u64) -> Result<Balance> {
        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;
        let balance = self.ctx.db.transaction(|txn| {
            let mut balance = Self::load(txn, account, default_limit, now)?;
            balance.reset_quota_if_due(now);
            if limit < balance.monthly_given_used {
                return abort(LedgerError::validation(format!(
                    "limit {} is below {} already given this month",
                    limit, balance.monthly_given_used
                )));
            }
            balance.monthly_given_limit = limit;
            txn.put_balance(&balance)?;
            Ok(balance)
        })?;
        tracing::info!(account, limit, "monthly give limit updated");
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use kudos_core::Clock;

    #[test]
    fn test_debit_overdraw_is_rejected_and_nothing_written() {
        let f = fixture(&["alice"]);
        let now = f.clock.now();
        f.ctx
            .db
            .transaction(|txn| BalanceStore::credit(txn, "alice", 40, CreditReason::Earned, 100, now))
            .unwrap();

        let err = f
            .ctx
            .db
            .transaction(|txn| BalanceStore::debit(txn, "alice", 41, DebitReason::Purchase, 100, now))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));

        let balance = f.ledger.balances().balance("alice").unwrap();
        assert_eq!(balance.available_points, 40);
        assert_eq!(balance.total_spent, 0);
    }

    #[test]
    fn test_non_negative_over_a_sequence() {
        let f = fixture(&["alice"]);
        let now = f.clock.now();
        let ops: [(bool, u64); 8] = [
            (true, 10),
            (false, 5),
            (false, 6),
            (true, 3),
            (false, 8),
            (false, 1),
            (true, 100),
            (false, 100),
        ];
        let mut expected: u64 = 0;
        for (is_credit, amount) in ops {
            let result = f.ctx.db.transaction(|txn| {
                if is_credit {
                    BalanceStore::credit(txn, "alice", amount, CreditReason::Earned, 100, now)
                } else {
                    BalanceStore::debit(txn, "alice", amount, DebitReason::Purchase, 100, now)
                }
            });
            if is_credit {
                expected += amount;
            } else if amount <= expected {
                expected -= amount;
            } else {
                assert!(result.is_err());
            }
            let balance = f.ledger.balances().balance("alice").unwrap();
            assert_eq!(balance.available_points, expected);
        }
    }

    #[test]
    fn test_unknown_account_is_not_created() {
        let f = fixture(&[]);
        let now = f.clock.now();
        let err = f
            .ctx
            .db
            .transaction(|txn| BalanceStore::credit(txn, "ghost", 5, CreditReason::Earned, 100, now))
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { entity: Entity::Account, .. }));
        assert!(f.ctx.db.stored_balance("ghost").unwrap().is_none());
    }

    #[test]
    fn test_registered_account_reads_fresh_balance() {
        let f = fixture(&["alice"]);
        let balance = f.ledger.balances().balance("alice").unwrap();
        assert_eq!(balance.available_points, 0);
        assert_eq!(balance.monthly_given_limit, f.ctx.config.monthly_give_limit);
        assert!(f.ctx.db.stored_balance("alice").unwrap().is_none());
    }

    #[test]
    fn test_limit_cannot_drop_below_used() {
        let f = fixture(&["alice", "bob"]);
        f.ledger.cheers().cheer("alice", "bob", 40, None).unwrap();
        assert!(f.ledger.balances().set_monthly_limit("alice", 39).is_err());
        let balance = f.ledger.balances().set_monthly_limit("alice", 200).unwrap();
        assert_eq!(balance.monthly_given_limit, 200);
        assert_eq!(balance.monthly_given_used, 40);
    }
}
