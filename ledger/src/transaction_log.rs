//! Transaction Log
//!
//! Append-only. `record` is only callable with an open storage transaction,
//! so every entry lands together with the balance change it describes.
//! Everything else here is a read.

use chrono::{DateTime, Duration, Utc};
use kudos_core::clock::{month_start, week_start};
use kudos_core::{
    Entity, LedgerError, LineItem, OrderStatus, Result, Transaction, TransactionKind,
};
use kudos_storage::{HistoryQuery, LeaderboardEntry, LedgerTxn, TxnResult};
use serde::{Deserialize, Serialize};

use crate::context::LedgerContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardPeriod {
    Month,
    Week,
    AllTime,
    Range {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

impl LeaderboardPeriod {
    /// Half-open window ending just after `now`
    pub fn window(self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = now + Duration::microseconds(1);
        match self {
            LeaderboardPeriod::Month => (month_start(now), end),
            LeaderboardPeriod::Week => (week_start(now), end),
            LeaderboardPeriod::AllTime => (DateTime::<Utc>::default(), end),
            LeaderboardPeriod::Range { from, to } => (from, to),
        }
    }
}

/// Itemized purchase rebuilt from the `spent` entry of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub order_id: String,
    pub transaction_id: String,
    pub buyer: String,
    pub items: Vec<LineItem>,
    pub total_cost: u64,
    pub status: OrderStatus,
    pub purchased_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TransactionLog {
    ctx: LedgerContext,
}

impl TransactionLog {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn record(txn: &LedgerTxn<'_>, tx: &Transaction) -> TxnResult<()> {
        txn.append(tx)
    }

    pub fn history(&self, query: &HistoryQuery) -> Result<Vec<Transaction>> {
        self.ctx.db.history(query)
    }

    pub fn transaction(&self, id: &str) -> Result<Transaction> {
        self.ctx
            .db
            .transaction_by_id(id)?
            .ok_or_else(|| LedgerError::not_found(Entity::Transaction, id))
    }

    pub fn receipt(&self, order_id: &str) -> Result<Receipt> {
        let order = self
            .ctx
            .db
            .order(order_id)?
            .ok_or_else(|| LedgerError::not_found(Entity::Order, order_id))?;
        let spent = self.transaction(&order.transaction_id)?;
        if spent.kind != TransactionKind::Spent {
            return Err(LedgerError::Serialization(format!(
                "order {} points at a {} entry",
                order_id, spent.kind
            )));
        }
        let items: Vec<LineItem> = serde_json::from_value(spent.metadata["items"].clone())
            .map_err(|e| {
                LedgerError::Serialization(format!("receipt items for {}: {}", order_id, e))
            })?;
        Ok(Receipt {
            order_id: order.id,
            transaction_id: spent.id,
            buyer: order.buyer,
            items,
            total_cost: spent.amount,
            status: order.status,
            purchased_at: spent.created_at,
        })
    }

    pub fn leaderboard(
        &self,
        period: LeaderboardPeriod,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>> {
        let (from, to) = period.window(self.ctx.clock.now());
        self.ctx.db.leaderboard(from, to, limit)
    }
}
