//! Refund/Cancellation Engine
//!
//! Every path that reverses a purchase goes through `apply_refund`, inside
//! the same storage transaction that changes the order's status. The state
//! check and the write share that transaction, so a request can only be
//! processed once.

use chrono::{DateTime, Utc};
use kudos_core::{
    Balance, CancellationAction, Counterparties, Entity, LedgerError, Order, OrderStatus,
    Result, Transaction, TransactionKind,
};
use kudos_storage::{abort, LedgerTxn, OrAbort, TxnResult};
use serde_json::json;

use crate::balance_store::{BalanceStore, CreditReason};
use crate::context::LedgerContext;
use crate::transaction_log::TransactionLog;

#[derive(Debug, Clone)]
pub struct CancellationOutcome {
    pub order: Order,
    /// Present when points and stock were returned
    pub refund: Option<Transaction>,
    pub balance: Option<Balance>,
}

#[derive(Debug, Clone)]
pub struct CancellationEngine {
    ctx: LedgerContext,
}

fn load_order(txn: &LedgerTxn<'_>, order_id: &str) -> TxnResult<Order> {
    match txn.order(order_id)? {
        Some(order) => Ok(order),
        None => abort(LedgerError::not_found(Entity::Order, order_id)),
    }
}

/// Return the order's points to the buyer and its items to stock, and
/// record the `refund` entry. The caller has already moved the order out
/// of its open state.
fn apply_refund(
    txn: &LedgerTxn<'_>,
    order: &Order,
    via: &str,
    actor: &str,
    notes: Option<&str>,
    default_limit: u64,
    now: DateTime<Utc>,
) -> TxnResult<(Transaction, Balance)> {
    for line in &order.line_items {
        // A product removed from the catalog since purchase has nothing to restock.
        match txn.product(&line.product_id)? {
            Some(mut product) => {
                product.inventory = product
                    .inventory
                    .checked_add(line.quantity)
                    .ok_or_else(|| LedgerError::validation("inventory overflow"))
                    .or_abort()?;
                txn.put_product(&product)?;
            }
            None => tracing::warn!(
                order = %order.id,
                product = %line.product_id,
                "refunded line has no catalog entry to restock"
            ),
        }
    }

    let balance = BalanceStore::credit(
        txn,
        &order.buyer,
        order.total_cost,
        CreditReason::Refund,
        default_limit,
        now,
    )?;

    let refund = Transaction::new(
        TransactionKind::Refund,
        Counterparties::to_account(order.buyer.clone()),
        order.total_cost,
        format!("Refund for order {}", order.id),
        now,
    )
    .with_metadata(json!({
        "order_id": order.id,
        "original_transaction_id": order.transaction_id,
        "items": order.line_items,
        "via": via,
        "processed_by": actor,
        "notes": notes,
    }));
    TransactionLog::record(txn, &refund)?;
    Ok((refund, balance))
}

impl CancellationEngine {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Buyer asks for an open order to be cancelled. Nothing is refunded
    /// until an admin approves.
    pub fn request_cancellation(
        &self,
        order_id: &str,
        requester: &str,
        reason: &str,
    ) -> Result<Order> {
        let now = self.ctx.clock.now();
        let order = self.ctx.db.transaction(|txn| {
            let mut order = load_order(txn, order_id)?;
            order.request_cancellation(requester, reason, now).or_abort()?;
            txn.put_order(&order)?;
            Ok(order)
        })?;
        tracing::info!(order = order_id, requester, "cancellation requested");
        Ok(order)
    }

    pub fn resolve_cancellation(
        &self,
        order_id: &str,
        action: CancellationAction,
        admin: &str,
        notes: Option<String>,
    ) -> Result<CancellationOutcome> {
        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;
        let outcome = self.ctx.db.transaction(|txn| {
            let mut order = load_order(txn, order_id)?;
            order
                .resolve_cancellation(action, admin, notes.clone(), now)
                .or_abort()?;
            let (refund, balance) = match action {
                CancellationAction::Approve => {
                    let (tx, balance) = apply_refund(
                        txn,
                        &order,
                        "cancellation_request",
                        admin,
                        notes.as_deref(),
                        default_limit,
                        now,
                    )?;
                    (Some(tx), Some(balance))
                }
                CancellationAction::Deny => (None, None),
            };
            txn.put_order(&order)?;
            Ok(CancellationOutcome {
                order,
                refund,
                balance,
            })
        })?;
        tracing::info!(
            order = order_id,
            admin,
            action = ?action,
            refunded = outcome.refund.as_ref().map(|tx| tx.amount).unwrap_or(0),
            "cancellation resolved"
        );
        Ok(outcome)
    }

    /// Direct cancellation of a pending order by its buyer or an admin.
    pub fn cancel_order(
        &self,
        order_id: &str,
        actor: &str,
        is_admin: bool,
    ) -> Result<CancellationOutcome> {
        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;
        let outcome = self.ctx.db.transaction(|txn| {
            let mut order = load_order(txn, order_id)?;
            if !is_admin && order.buyer != actor {
                return abort(LedgerError::validation(format!(
                    "{} may not cancel order {}",
                    actor, order_id
                )));
            }
            order.transition(OrderStatus::Cancelled, now).or_abort()?;
            let (refund, balance) =
                apply_refund(txn, &order, "direct_cancel", actor, None, default_limit, now)?;
            txn.put_order(&order)?;
            Ok(CancellationOutcome {
                order,
                refund: Some(refund),
                balance: Some(balance),
            })
        })?;
        tracing::info!(order = order_id, actor, is_admin, "order cancelled");
        Ok(outcome)
    }

    /// Refund a fulfilled order.
    pub fn refund_order(
        &self,
        order_id: &str,
        admin: &str,
        notes: Option<String>,
    ) -> Result<CancellationOutcome> {
        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;
        let outcome = self.ctx.db.transaction(|txn| {
            let mut order = load_order(txn, order_id)?;
            order.transition(OrderStatus::Refunded, now).or_abort()?;
            let (refund, balance) = apply_refund(
                txn,
                &order,
                "admin_refund",
                admin,
                notes.as_deref(),
                default_limit,
                now,
            )?;
            txn.put_order(&order)?;
            Ok(CancellationOutcome {
                order,
                refund: Some(refund),
                balance: Some(balance),
            })
        })?;
        tracing::info!(order = order_id, admin, "order refunded");
        Ok(outcome)
    }
}
