//! Quota Resetter
//!
//! Safety net for the lazy reset done by the cheer engine. Balances are
//! scanned outside any transaction and then reset in batches; each batch
//! re-checks the month boundary, so a cheer that already reset an account
//! wins and the run leaves it alone.

use chrono::{DateTime, Utc};
use kudos_core::clock::is_new_month;
use kudos_core::Result;

use crate::context::LedgerContext;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuotaResetReport {
    pub scanned: usize,
    pub reset: usize,
    pub failed_batches: usize,
}

#[derive(Debug, Clone)]
pub struct QuotaResetter {
    ctx: LedgerContext,
}

impl QuotaResetter {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn reset_all_quotas(&self) -> Result<QuotaResetReport> {
        self.reset_all_quotas_at(self.ctx.clock.now())
    }

    pub fn reset_all_quotas_at(&self, now: DateTime<Utc>) -> Result<QuotaResetReport> {
        let balances = self.ctx.db.balances()?;
        let due: Vec<String> = balances
            .iter()
            .filter(|b| is_new_month(b.last_monthly_reset, now))
            .map(|b| b.account_id.clone())
            .collect();

        let mut report = QuotaResetReport {
            scanned: balances.len(),
            ..Default::default()
        };

        for (index, batch) in due.chunks(self.ctx.config.batch_size.max(1)).enumerate() {
            let result = self.ctx.db.transaction(|txn| {
                let mut reset = 0;
                for account in batch {
                    if let Some(mut balance) = txn.balance(account)? {
                        if balance.reset_quota_if_due(now) {
                            txn.put_balance(&balance)?;
                            reset += 1;
                        }
                    }
                }
                Ok(reset)
            });
            match result {
                Ok(reset) => report.reset += reset,
                Err(err) => {
                    report.failed_batches += 1;
                    tracing::warn!(batch = index, error = %err, "quota reset batch failed");
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            reset = report.reset,
            failed = report.failed_batches,
            "monthly quotas checked"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use chrono::{Duration, TimeZone};
    use kudos_core::Clock;

    #[test]
    fn test_resets_only_last_months_balances() {
        let f = fixture(&["alice", "bob", "carol"]);
        f.clock.set(Utc.with_ymd_and_hms(2026, 10, 31, 20, 0, 0).unwrap());
        f.ledger.cheers().cheer("alice", "bob", 60, None).unwrap();

        f.clock.advance(Duration::hours(6));
        f.ledger.cheers().cheer("carol", "bob", 10, None).unwrap();

        let report = f.ledger.quotas().reset_all_quotas().unwrap();
        // alice and bob were last reset in October; carol's row is November's.
        assert_eq!(report.scanned, 3);
        assert_eq!(report.reset, 2);

        let alice = f.ledger.balances().balance("alice").unwrap();
        assert_eq!(alice.monthly_given_used, 0);
        assert_eq!(alice.last_monthly_reset, f.clock.now());
        assert_eq!(f.ledger.balances().balance("carol").unwrap().monthly_given_used, 10);
    }

    #[test]
    fn test_second_run_is_a_no_op() {
        let f = fixture(&["alice", "bob"]);
        f.ledger.cheers().cheer("alice", "bob", 60, None).unwrap();
        f.clock.advance(Duration::days(40));

        assert_eq!(f.ledger.quotas().reset_all_quotas().unwrap().reset, 2);
        assert_eq!(f.ledger.quotas().reset_all_quotas().unwrap().reset, 0);
    }

    #[test]
    fn test_same_month_untouched() {
        let f = fixture(&["alice", "bob"]);
        f.ledger.cheers().cheer("alice", "bob", 60, None).unwrap();
        let report = f.ledger.quotas().reset_all_quotas().unwrap();
        assert_eq!(report.reset, 0);
        assert_eq!(f.ledger.balances().balance("alice").unwrap().monthly_given_used, 60);
    }
}
