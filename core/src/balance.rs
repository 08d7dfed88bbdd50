//! Per-account point totals and monthly quota state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::{is_new_month, month_start};
use crate::error::{LedgerError, Result};

pub type AccountId = String;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub account_id: AccountId,
    pub available_points: u64,
    pub total_earned: u64,
    pub total_spent: u64,
    pub monthly_given_limit: u64,
    pub monthly_given_used: u64,
    pub last_monthly_reset: DateTime<Utc>,
    pub last_transaction_at: Option<DateTime<Utc>>,
}

impl Balance {
    pub fn new(account_id: impl Into<AccountId>, monthly_given_limit: u64, now: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.into(),
            available_points: 0,
            total_earned: 0,
            total_spent: 0,
            monthly_given_limit,
            monthly_given_used: 0,
            last_monthly_reset: month_start(now),
            last_transaction_at: None,
        }
    }

    /// Add points to the available balance. `earned` also bumps `total_earned`.
    pub fn credit(&mut self, amount: u64, earned: bool, now: DateTime<Utc>) -> Result<()> {
        check_positive(amount)?;
        self.available_points = self
            .available_points
            .checked_add(amount)
            .ok_or_else(|| LedgerError::validation("available points overflow"))?;
        if earned {
            self.total_earned = self
                .total_earned
                .checked_add(amount)
                .ok_or_else(|| LedgerError::validation("total earned overflow"))?;
        }
        self.last_transaction_at = Some(now);
        Ok(())
    }

    /// Remove points from the available balance. Leaves `self` untouched on error.
    pub fn debit(&mut self, amount: u64, spent: bool, now: DateTime<Utc>) -> Result<()> {
        check_positive(amount)?;
        if amount > self.available_points {
            return Err(LedgerError::InsufficientBalance {
                account: self.account_id.clone(),
                requested: amount,
                available: self.available_points,
            });
        }
        let total_spent = if spent {
            self.total_spent
                .checked_add(amount)
                .ok_or_else(|| LedgerError::validation("total spent overflow"))?
        } else {
            self.total_spent
        };
        self.available_points -= amount;
        self.total_spent = total_spent;
        self.last_transaction_at = Some(now);
        Ok(())
    }

    /// Admin correction: remove points that should not have been awarded.
    /// `total_earned` is walked back with the available balance.
    pub fn correct(&mut self, amount: u64, now: DateTime<Utc>) -> Result<()> {
        self.debit(amount, false, now)?;
        self.total_earned -= amount.min(self.total_earned);
        Ok(())
    }

    /// Reverse a purchase: credit the buyer and walk `total_spent` back
    /// without letting it go below zero.
    pub fn refund(&mut self, amount: u64, now: DateTime<Utc>) -> Result<()> {
        self.credit(amount, false, now)?;
        self.total_spent -= amount.min(self.total_spent);
        Ok(())
    }

    /// Zero the monthly counter if `now` is in a later month than the last reset.
    /// Returns whether a reset happened.
    pub fn reset_quota_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if is_new_month(self.last_monthly_reset, now) {
            self.monthly_given_used = 0;
            self.last_monthly_reset = now;
            true
        } else {
            false
        }
    }

    pub fn remaining_quota(&self) -> u64 {
        self.monthly_given_limit
            .saturating_sub(self.monthly_given_used)
    }

    /// Consume give quota. Rejected entirely when it would pass the limit.
    pub fn consume_quota(&mut self, amount: u64, now: DateTime<Utc>) -> Result<()> {
        check_positive(amount)?;
        let used = self
            .monthly_given_used
            .checked_add(amount)
            .filter(|used| *used <= self.monthly_given_limit)
            .ok_or_else(|| LedgerError::MonthlyQuotaExceeded {
                account: self.account_id.clone(),
                used: self.monthly_given_used,
                requested: amount,
                limit: self.monthly_given_limit,
            })?;
        self.monthly_given_used = used;
        self.last_transaction_at = Some(now);
        Ok(())
    }

    /// Invariants checked before every write.
    pub fn validate(&self) -> Result<()> {
        if self.account_id.is_empty() {
            return Err(LedgerError::validation("balance without account id"));
        }
        if self.monthly_given_used > self.monthly_given_limit {
            return Err(LedgerError::validation(format!(
                "monthly given used {} exceeds limit {} for {}",
                self.monthly_given_used, self.monthly_given_limit, self.account_id
            )));
        }
        Ok(())
    }
}

fn check_positive(amount: u64) -> Result<()> {
    if amount == 0 {
        return Err(LedgerError::validation("amount must be greater than 0"));
    }
    Ok(())
}
