//! Kudos Ledger
//!
//! The producers that move points: cheers, checkouts, cancellations and
//! refunds, admin adjustments, scheduled grants and quota resets. Every
//! producer runs its reads and writes inside one storage transaction.

pub mod admin;
pub mod balance_store;
pub mod checkout;
pub mod cheer;
pub mod context;
pub mod distributor;
pub mod quota;
pub mod refund;
pub mod transaction_log;

pub use admin::{AdminEngine, Adjustment};
pub use balance_store::{BalanceStore, CreditReason, DebitReason};
pub use checkout::{CheckoutEngine, CheckoutReceipt};
pub use cheer::{CheerEngine, CheerReceipt};
pub use context::LedgerContext;
pub use distributor::{BatchFailure, DistributionReport, Distributor};
pub use quota::{QuotaResetReport, QuotaResetter};
pub use refund::{CancellationEngine, CancellationOutcome};
pub use transaction_log::{LeaderboardPeriod, Receipt, TransactionLog};

use kudos_core::{Clock, LedgerConfig};
use kudos_storage::LedgerDb;
use std::sync::Arc;

/// Entry point handing out engines that share one database, config and clock.
#[derive(Debug, Clone)]
pub struct Ledger {
    ctx: LedgerContext,
}

impl Ledger {
    pub fn new(db: LedgerDb, config: LedgerConfig) -> Self {
        Self {
            ctx: LedgerContext::new(db, config),
        }
    }

    pub fn with_clock(db: LedgerDb, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            ctx: LedgerContext::with_clock(db, config, clock),
        }
    }

    pub fn from_context(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &LedgerContext {
        &self.ctx
    }

    pub fn db(&self) -> &LedgerDb {
        &self.ctx.db
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.ctx.config
    }

    pub fn balances(&self) -> BalanceStore {
        BalanceStore::new(self.ctx.clone())
    }

    pub fn log(&self) -> TransactionLog {
        TransactionLog::new(self.ctx.clone())
    }

    pub fn cheers(&self) -> CheerEngine {
        CheerEngine::new(self.ctx.clone())
    }

    pub fn checkout(&self) -> CheckoutEngine {
        CheckoutEngine::new(self.ctx.clone())
    }

    pub fn cancellations(&self) -> CancellationEngine {
        CancellationEngine::new(self.ctx.clone())
    }

    pub fn admin(&self) -> AdminEngine {
        AdminEngine::new(self.ctx.clone())
    }

    pub fn distributor(&self) -> Distributor {
        Distributor::new(self.ctx.clone())
    }

    pub fn quotas(&self) -> QuotaResetter {
        QuotaResetter::new(self.ctx.clone())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kudos_core::{FixedClock, Product};

    pub struct Fixture {
        pub ctx: LedgerContext,
        pub clock: Arc<FixedClock>,
        pub ledger: Ledger,
    }

    /// In-memory ledger at 2026-10-19 12:00 UTC with `accounts` registered.
    pub fn fixture(accounts: &[&str]) -> Fixture {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
        ));
        let db = LedgerDb::open_temporary().unwrap();
        let config = LedgerConfig {
            batch_delay_ms: 0,
            ..LedgerConfig::default()
        };
        let ctx = LedgerContext::with_clock(db, config, clock.clone());
        for id in accounts {
            ctx.db.register_account(id, id, clock.now()).unwrap();
        }
        Fixture {
            ledger: Ledger::from_context(ctx.clone()),
            ctx,
            clock,
        }
    }

    pub fn fund(f: &Fixture, account: &str, amount: u64) {
        f.ledger
            .admin()
            .grant(account, amount, "test funding", "test")
            .unwrap();
    }

    pub fn stock(f: &Fixture, id: &str, unit_cost: u64, inventory: u64) {
        f.ctx
            .db
            .upsert_product(Product::new(id, id.to_uppercase(), unit_cost, inventory))
            .unwrap();
    }
}
