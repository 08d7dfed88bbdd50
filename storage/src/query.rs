//! Read-only queries for reporting collaborators
//!
//! Nothing here writes. History and leaderboard reads run outside any
//! producer transaction and see only committed entries.

use chrono::{DateTime, Utc};
use kudos_core::{Balance, Order, Result, Transaction, TransactionKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::{decode, storage_err, LedgerDb};
use crate::keys;

/// Filters for [`LedgerDb::history`]. Every field is optional; the time
/// range is half-open `[from, to)`.
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub account: Option<String>,
    pub kinds: Vec<TransactionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn for_account(account: impl Into<String>) -> Self {
        Self {
            account: Some(account.into()),
            ..Default::default()
        }
    }

    pub fn kinds(mut self, kinds: &[TransactionKind]) -> Self {
        self.kinds = kinds.to_vec();
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, tx: &Transaction) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&tx.kind)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub account_id: String,
    pub points_received: u64,
    pub cheers_received: usize,
}

impl LedgerDb {
    /// Stored balance, `None` if the account never had ledger activity
    pub fn stored_balance(&self, account: &str) -> Result<Option<Balance>> {
        Self::get_record(&self.balances, account.as_bytes())
    }

    /// Every stored balance, in account-id order
    pub fn balances(&self) -> Result<Vec<Balance>> {
        let mut balances = Vec::new();
        for item in self.balances.iter() {
            let (_key, value) = item.map_err(storage_err)?;
            balances.push(decode(&value)?);
        }
        Ok(balances)
    }

    pub fn transaction_by_id(&self, id: &str) -> Result<Option<Transaction>> {
        Self::get_record(&self.transactions, id.as_bytes())
    }

    /// Matching transactions, newest first
    pub fn history(&self, query: &HistoryQuery) -> Result<Vec<Transaction>> {
        let (start, end) = match &query.account {
            Some(account) => {
                let prefix = keys::account_prefix(account);
                let start = query
                    .from
                    .map(|from| keys::account_bound(account, from))
                    .unwrap_or_else(|| prefix.clone());
                let end = query
                    .to
                    .map(|to| keys::account_bound(account, to))
                    .unwrap_or_else(|| prefix_end(&prefix));
                (start, end)
            }
            None => {
                let start = query
                    .from
                    .map(keys::time_bound)
                    .unwrap_or_else(|| keys::time_prefix().to_vec());
                let end = query
                    .to
                    .map(keys::time_bound)
                    .unwrap_or_else(|| prefix_end(keys::time_prefix()));
                (start, end)
            }
        };

        let limit = query.limit.unwrap_or(usize::MAX);
        let mut found = Vec::new();
        if start >= end || limit == 0 {
            return Ok(found);
        }
        for item in self.index.range(start..end).rev() {
            let (_key, tx_id) = item.map_err(storage_err)?;
            let tx: Transaction = match Self::get_record(&self.transactions, &tx_id)? {
                Some(tx) => tx,
                None => continue,
            };
            if query.matches(&tx) {
                found.push(tx);
                if found.len() >= limit {
                    break;
                }
            }
        }
        Ok(found)
    }

    /// Sum of `received` amounts per account in `[from, to)`, highest first.
    /// Accounts with equal totals share a rank.
    pub fn leaderboard(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let query = HistoryQuery::default()
            .kinds(&[TransactionKind::Received])
            .between(from, to);

        let mut totals: HashMap<String, (u64, usize)> = HashMap::new();
        for tx in self.history(&query)? {
            if let Some(account) = tx.subject() {
                let entry = totals.entry(account.to_string()).or_insert((0, 0));
                entry.0 = entry.0.saturating_add(tx.amount);
                entry.1 += 1;
            }
        }

        let mut rows: Vec<(String, u64, usize)> = totals
            .into_iter()
            .map(|(account, (points, count))| (account, points, count))
            .collect();
        rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut entries = Vec::with_capacity(rows.len().min(limit));
        let mut rank = 0;
        let mut last_points = None;
        for (account_id, points_received, cheers_received) in rows.into_iter().take(limit) {
            if last_points != Some(points_received) {
                rank += 1;
                last_points = Some(points_received);
            }
            entries.push(LeaderboardEntry {
                rank,
                account_id,
                points_received,
                cheers_received,
            });
        }
        Ok(entries)
    }

    pub fn order(&self, id: &str) -> Result<Option<Order>> {
        Self::get_record(&self.orders, id.as_bytes())
    }

    /// A buyer's orders, newest first
    pub fn orders_for(&self, buyer: &str) -> Result<Vec<Order>> {
        let mut orders = Vec::new();
        for item in self.index.scan_prefix(keys::buyer_prefix(buyer)).rev() {
            let (_key, order_id) = item.map_err(storage_err)?;
            if let Some(order) = Self::get_record(&self.orders, &order_id)? {
                orders.push(order);
            }
        }
        Ok(orders)
    }

    /// Number of entries in the transaction log
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Smallest key greater than every key starting with `prefix`.
fn prefix_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return end;
        }
    }
    vec![u8::MAX; prefix.len() + 1]
}
