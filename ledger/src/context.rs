//! Shared handles every engine is built from

use kudos_core::{Clock, LedgerConfig, SystemClock};
use kudos_storage::LedgerDb;
use std::sync::Arc;

#[derive(Clone)]
pub struct LedgerContext {
    pub db: LedgerDb,
    pub config: Arc<LedgerConfig>,
    pub clock: Arc<dyn Clock>,
}

impl LedgerContext {
    pub fn new(db: LedgerDb, config: LedgerConfig) -> Self {
        Self::with_clock(db, config, Arc::new(SystemClock))
    }

    pub fn with_clock(db: LedgerDb, config: LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            config: Arc::new(config),
            clock,
        }
    }
}

impl std::fmt::Debug for LedgerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerContext")
            .field("db", &self.db.path())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
