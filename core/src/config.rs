//! Ledger configuration
//!
//! Not persisted state; supplied by the host process on startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LedgerError, Result};

pub const DEFAULT_MONTHLY_GIVE_LIMIT: u64 = 100;
pub const DEFAULT_CHEER_MIN: u64 = 1;
pub const DEFAULT_CHEER_MAX: u64 = 100;
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 500;
pub const DEFAULT_GRANT_AMOUNT: u64 = 50;
/// Weekly distribution
pub const DEFAULT_DISTRIBUTION_INTERVAL_SECS: u64 = 7 * 24 * 3600;
pub const DEFAULT_BATCH_SIZE: usize = 20;
pub const DEFAULT_BATCH_DELAY_MS: u64 = 250;
pub const DEFAULT_QUOTA_CHECK_INTERVAL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Cap applied to balances created without an explicit limit
    pub monthly_give_limit: u64,
    pub cheer_min_amount: u64,
    pub cheer_max_amount: u64,
    pub max_message_length: usize,
    pub grant_amount_per_cycle: u64,
    pub distribution_interval_secs: u64,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub quota_check_interval_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            monthly_give_limit: DEFAULT_MONTHLY_GIVE_LIMIT,
            cheer_min_amount: DEFAULT_CHEER_MIN,
            cheer_max_amount: DEFAULT_CHEER_MAX,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            grant_amount_per_cycle: DEFAULT_GRANT_AMOUNT,
            distribution_interval_secs: DEFAULT_DISTRIBUTION_INTERVAL_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_ms: DEFAULT_BATCH_DELAY_MS,
            quota_check_interval_secs: DEFAULT_QUOTA_CHECK_INTERVAL_SECS,
        }
    }
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.cheer_min_amount == 0 {
            return Err(LedgerError::validation(
                "cheer_min_amount must be at least 1",
            ));
        }
        if self.cheer_min_amount > self.cheer_max_amount {
            return Err(LedgerError::validation(format!(
                "cheer_min_amount {} exceeds cheer_max_amount {}",
                self.cheer_min_amount, self.cheer_max_amount
            )));
        }
        if self.batch_size == 0 {
            return Err(LedgerError::validation("batch_size must be at least 1"));
        }
        if self.distribution_interval_secs == 0 || self.quota_check_interval_secs == 0 {
            return Err(LedgerError::validation(
                "scheduler intervals must be non-zero",
            ));
        }
        Ok(())
    }

    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }

    pub fn distribution_interval(&self) -> Duration {
        Duration::from_secs(self.distribution_interval_secs)
    }

    pub fn quota_check_interval(&self) -> Duration {
        Duration::from_secs(self.quota_check_interval_secs)
    }
}
