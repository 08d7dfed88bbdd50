#![allow(dead_code)]

use chrono::{TimeZone, Utc};
use kudos_core::{Clock, FixedClock, LedgerConfig, Product};
use kudos_ledger::Ledger;
use kudos_storage::LedgerDb;
use std::sync::Arc;

pub struct Harness {
    pub ledger: Ledger,
    pub clock: Arc<FixedClock>,
}

impl Harness {
    pub fn db(&self) -> &LedgerDb {
        self.ledger.db()
    }
}

pub fn config() -> LedgerConfig {
    LedgerConfig {
        batch_delay_ms: 0,
        ..LedgerConfig::default()
    }
}

/// Temporary ledger pinned to 2026-10-19 12:00 UTC
pub fn harness(accounts: &[&str]) -> Harness {
    let db = LedgerDb::open_temporary().expect("temporary db");
    harness_on(db, accounts)
}

pub fn harness_on(db: LedgerDb, accounts: &[&str]) -> Harness {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap(),
    ));
    let ledger = Ledger::with_clock(db, config(), clock.clone());
    for id in accounts {
        ledger
            .db()
            .register_account(id, &id.to_uppercase(), clock.now())
            .expect("register account");
    }
    Harness { ledger, clock }
}

pub fn fund(h: &Harness, account: &str, amount: u64) {
    h.ledger
        .admin()
        .grant(account, amount, "seed", "test-admin")
        .expect("fund account");
}

pub fn stock(h: &Harness, id: &str, unit_cost: u64, inventory: u64) {
    h.db()
        .upsert_product(Product::new(id, id.to_uppercase(), unit_cost, inventory))
        .expect("stock product");
}
