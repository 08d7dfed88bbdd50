//! Scheduled Distributor
//!
//! Grants a fixed amount to every active account, one storage transaction
//! per batch. Each grant leaves a `(cycle, account)` marker in the same
//! transaction, so re-running a cycle only reaches accounts whose batch did
//! not commit.
//!
//! Batches run on tokio's blocking pool, since sled transactions block.
//! Markers are kept for the current and the previous scheduled cycle only;
//! older `grant-N` markers are pruned at the start of each scheduled run.
//! Markers of manually named cycles are never pruned.

use chrono::{DateTime, Utc};
use kudos_core::{Counterparties, Entity, LedgerError, Result, Transaction, TransactionKind};
use kudos_storage::abort;
use serde_json::json;
use std::collections::HashSet;
use std::time::Duration;

use crate::balance_store::{BalanceStore, CreditReason};
use crate::context::LedgerContext;
use crate::transaction_log::TransactionLog;

#[derive(Debug, Clone, PartialEq)]
pub struct BatchFailure {
    pub batch: usize,
    pub accounts: Vec<String>,
    pub error: LedgerError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DistributionReport {
    pub cycle: String,
    pub granted: usize,
    /// Already granted this cycle, or inactive
    pub skipped: usize,
    pub failed_batches: Vec<BatchFailure>,
}

impl DistributionReport {
    pub fn is_complete(&self) -> bool {
        self.failed_batches.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Distributor {
    ctx: LedgerContext,
}

impl Distributor {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    fn cycle_number(&self, now: DateTime<Utc>) -> i64 {
        let interval = self.ctx.config.distribution_interval_secs.max(1) as i64;
        now.timestamp().div_euclid(interval)
    }

    /// Cycle key for the distribution window containing `now`.
    pub fn cycle_key(&self, now: DateTime<Utc>) -> String {
        format!("{}{}", CYCLE_PREFIX, self.cycle_number(now))
    }

    /// Drop markers of scheduled cycles older than the one before `now`.
    pub fn prune_markers(&self, now: DateTime<Utc>) -> Result<usize> {
        let oldest_kept = self.cycle_number(now) - 1;
        let removed = self.ctx.db.prune_grant_markers(|cycle| {
            scheduled_cycle(cycle).is_some_and(|n| n < oldest_kept)
        })?;
        if removed > 0 {
            tracing::debug!(removed, oldest_kept, "stale grant markers pruned");
        }
        Ok(removed)
    }

    pub async fn distribute(&self) -> Result<DistributionReport> {
        self.distribute_at(self.ctx.clock.now()).await
    }

    /// One run over the current active-account list.
    pub async fn distribute_at(&self, now: DateTime<Utc>) -> Result<DistributionReport> {
        if let Err(error) = self.prune_markers(now) {
            tracing::warn!(error = %error, "grant marker pruning failed");
        }
        let accounts = self.ctx.db.active_accounts()?;
        let config = &self.ctx.config;
        let cycle = self.cycle_key(now);
        self.distribute_to_all(
            &accounts,
            config.grant_amount_per_cycle,
            config.batch_size,
            config.batch_delay(),
            &cycle,
        )
        .await
    }

    pub async fn distribute_to_all(
        &self,
        accounts: &[String],
        amount: u64,
        batch_size: usize,
        batch_delay: Duration,
        cycle: &str,
    ) -> Result<DistributionReport> {
        if amount == 0 {
            return Err(LedgerError::validation("grant amount must be greater than 0"));
        }
        if batch_size == 0 {
            return Err(LedgerError::validation("batch size must be at least 1"));
        }

        let mut seen = HashSet::new();
        let accounts: Vec<String> = accounts
            .iter()
            .map(String::as_str)
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect();

        let mut report = DistributionReport {
            cycle: cycle.to_string(),
            ..Default::default()
        };
        let batches = accounts.len().div_ceil(batch_size);
        tracing::info!(cycle, accounts = accounts.len(), batches, amount, "distribution started");

        for (index, batch) in accounts.chunks(batch_size).enumerate() {
            if index > 0 && !batch_delay.is_zero() {
                tokio::time::sleep(batch_delay).await;
            }
            let this = self.clone();
            let owned = batch.to_vec();
            let cycle_name = cycle.to_string();
            let outcome = tokio::task::spawn_blocking(move || {
                this.grant_batch(&owned, amount, &cycle_name, index)
            })
            .await
            .unwrap_or_else(|e| {
                Err(LedgerError::Storage(format!("grant batch task failed: {}", e)))
            });
            match outcome {
                Ok((granted, skipped)) => {
                    report.granted += granted;
                    report.skipped += skipped;
                    tracing::debug!(cycle, batch = index, granted, skipped, "batch committed");
                }
                Err(error) => {
                    tracing::warn!(cycle, batch = index, error = %error, "batch failed; continuing");
                    report.failed_batches.push(BatchFailure {
                        batch: index,
                        accounts: batch.to_vec(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            cycle,
            granted = report.granted,
            skipped = report.skipped,
            failed = report.failed_batches.len(),
            "distribution finished"
        );
        Ok(report)
    }

    fn grant_batch(
        &self,
        batch: &[String],
        amount: u64,
        cycle: &str,
        index: usize,
    ) -> Result<(usize, usize)> {
        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;
        self.ctx.db.transaction(|txn| {
            let mut granted = 0;
            let mut skipped = 0;
            for account_id in batch.iter().map(String::as_str) {
                if txn.has_grant(cycle, account_id)? {
                    skipped += 1;
                    continue;
                }
                match txn.account(account_id)? {
                    Some(account) if account.active => {}
                    Some(_) => {
                        skipped += 1;
                        continue;
                    }
                    None => return abort(LedgerError::not_found(Entity::Account, account_id)),
                }
                BalanceStore::credit(
                    txn,
                    account_id,
                    amount,
                    CreditReason::Earned,
                    default_limit,
                    now,
                )?;
                let grant = Transaction::new(
                    TransactionKind::Earned,
                    Counterparties::to_account(account_id),
                    amount,
                    "Scheduled points grant",
                    now,
                )
                .with_metadata(json!({
                    "system_grant": true,
                    "cycle": cycle,
                    "batch": index,
                }));
                TransactionLog::record(txn, &grant)?;
                txn.mark_grant(cycle, account_id, &grant.id)?;
                granted += 1;
            }
            Ok((granted, skipped))
        })
    }
}

const CYCLE_PREFIX: &str = "grant-";

fn scheduled_cycle(cycle: &str) -> Option<i64> {
    cycle.strip_prefix(CYCLE_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixture;
    use kudos_storage::HistoryQuery;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_each_active_account_granted_once() {
        let f = fixture(&["a", "b", "c"]);
        f.ctx.db.set_account_active("c", false).unwrap();

        let report = f.ledger.distributor().distribute().await.unwrap();
        assert_eq!(report.granted, 2);
        assert!(report.is_complete());

        let balance = f.ledger.balances().balance("a").unwrap();
        assert_eq!(balance.available_points, f.ctx.config.grant_amount_per_cycle);
        assert_eq!(balance.total_earned, f.ctx.config.grant_amount_per_cycle);

        let earned = f
            .ledger
            .log()
            .history(&HistoryQuery::for_account("b").kinds(&[TransactionKind::Earned]))
            .unwrap();
        assert_eq!(earned.len(), 1);
        assert_eq!(earned[0].metadata["system_grant"], true);
    }

    #[tokio::test]
    async fn test_same_cycle_is_not_granted_twice() {
        let f = fixture(&["a", "b"]);
        let first = f.ledger.distributor().distribute().await.unwrap();
        let second = f.ledger.distributor().distribute().await.unwrap();
        assert_eq!(first.cycle, second.cycle);
        assert_eq!(second.granted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(f.ctx.db.transaction_count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_collapsed() {
        let f = fixture(&["a", "b"]);
        let report = f
            .ledger
            .distributor()
            .distribute_to_all(&ids(&["a", "a", "b", "a"]), 5, 2, Duration::ZERO, "manual")
            .await
            .unwrap();
        assert_eq!(report.granted, 2);
        assert_eq!(f.ledger.balances().balance("a").unwrap().available_points, 5);
    }

    #[tokio::test]
    async fn test_failed_batch_is_isolated() {
        let f = fixture(&["a", "b", "c", "d"]);
        let accounts = ids(&["a", "b", "ghost", "c", "d"]);
        let distributor = f.ledger.distributor();

        let report = distributor
            .distribute_to_all(&accounts, 5, 2, Duration::ZERO, "cycle-1")
            .await
            .unwrap();
        assert_eq!(report.granted, 3);
        assert_eq!(report.failed_batches.len(), 1);
        assert_eq!(report.failed_batches[0].batch, 1);
        assert!(matches!(
            report.failed_batches[0].error,
            LedgerError::NotFound { entity: Entity::Account, .. }
        ));
        // "c" shared the failed batch with "ghost"
        assert_eq!(f.ledger.balances().balance("c").unwrap().available_points, 0);

        f.ctx.db.register_account("ghost", "Ghost", f.ctx.clock.now()).unwrap();
        let rerun = distributor
            .distribute_to_all(&accounts, 5, 2, Duration::ZERO, "cycle-1")
            .await
            .unwrap();
        assert_eq!(rerun.granted, 2);
        assert_eq!(rerun.skipped, 3);
        for id in ["a", "b", "ghost", "c", "d"] {
            assert_eq!(f.ledger.balances().balance(id).unwrap().total_earned, 5, "{}", id);
        }
    }

    #[tokio::test]
    async fn test_old_cycle_markers_pruned() {
        let f = fixture(&["a", "b"]);
        let distributor = f.ledger.distributor();
        let start = f.ctx.clock.now();
        let interval = chrono::Duration::seconds(f.ctx.config.distribution_interval_secs as i64);

        distributor.distribute_to_all(&ids(&["a"]), 5, 1, Duration::ZERO, "manual").await.unwrap();
        for step in 0..4 {
            let report = distributor.distribute_at(start + interval * step).await.unwrap();
            assert_eq!(report.granted, 2);
            // The manual marker plus at most two scheduled cycles.
            assert!(f.ctx.db.grant_marker_count() <= 5);
        }

        // The previous cycle's markers survive, so a late rerun still skips.
        let previous = distributor.distribute_at(start + interval * 2).await.unwrap();
        assert_eq!(previous.granted, 0);
        assert_eq!(previous.skipped, 2);
        assert_eq!(f.ctx.db.grant_marker_count(), 5);

        let manual = distributor
            .distribute_to_all(&ids(&["a"]), 5, 1, Duration::ZERO, "manual")
            .await
            .unwrap();
        assert_eq!(manual.skipped, 1);
    }

    #[tokio::test]
    async fn test_other_tasks_run_while_batches_commit() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let f = fixture(&["a", "b", "c", "d"]);
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = ticks.clone();
            tokio::spawn(async move {
                loop {
                    ticks.fetch_add(1, Ordering::Relaxed);
                    tokio::task::yield_now().await;
                }
            })
        };

        let report = f
            .ledger
            .distributor()
            .distribute_to_all(&ids(&["a", "b", "c", "d"]), 5, 1, Duration::ZERO, "cycle-1")
            .await
            .unwrap();
        ticker.abort();

        assert_eq!(report.granted, 4);
        // Single-threaded runtime: the ticker only runs if batches yield it.
        assert!(ticks.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_scheduled_cycle_parsing() {
        assert_eq!(scheduled_cycle("grant-2917"), Some(2917));
        assert_eq!(scheduled_cycle("grant-x"), None);
        assert_eq!(scheduled_cycle("manual"), None);
    }

    #[test]
    fn test_cycle_key_follows_interval() {
        let f = fixture(&[]);
        let distributor = f.ledger.distributor();
        let now = f.ctx.clock.now();
        let week = chrono::Duration::seconds(f.ctx.config.distribution_interval_secs as i64);
        assert_ne!(distributor.cycle_key(now), distributor.cycle_key(now + week));
    }
}
