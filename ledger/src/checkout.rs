//! Checkout/Order Engine
//!
//! A checkout prices every line against the catalog, debits the buyer,
//! decrements stock and writes one `pending` order plus one `spent` entry,
//! all in a single storage transaction. If any line fails nothing is
//! written.

use kudos_core::directory::validate_id;
use kudos_core::{
    Balance, CartItem, Counterparties, Entity, LedgerError, LineItem, Order, OrderStatus,
    Product, Result, ShippingInfo, Transaction, TransactionKind,
};
use kudos_storage::{abort, OrAbort};
use serde_json::json;
use uuid::Uuid;

use crate::balance_store::{BalanceStore, DebitReason};
use crate::context::LedgerContext;
use crate::transaction_log::TransactionLog;

/// Upper bound on distinct products in one cart
pub const MAX_CART_LINES: usize = 50;

#[derive(Debug, Clone)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub transaction: Transaction,
    pub balance: Balance,
}

#[derive(Debug, Clone)]
pub struct CheckoutEngine {
    ctx: LedgerContext,
}

/// Collapse repeated products into one line, keeping first-seen order.
pub fn merge_cart(items: &[CartItem]) -> Result<Vec<CartItem>> {
    if items.is_empty() {
        return Err(LedgerError::validation("cart is empty"));
    }
    let mut merged: Vec<CartItem> = Vec::with_capacity(items.len());
    for item in items {
        validate_id("product", &item.product_id)?;
        if item.quantity == 0 {
            return Err(LedgerError::validation(format!(
                "quantity for {} must be at least 1",
                item.product_id
            )));
        }
        match merged.iter_mut().find(|m| m.product_id == item.product_id) {
            Some(existing) => {
                existing.quantity = existing
                    .quantity
                    .checked_add(item.quantity)
                    .ok_or_else(|| LedgerError::validation("quantity overflow"))?;
            }
            None => merged.push(item.clone()),
        }
    }
    if merged.len() > MAX_CART_LINES {
        return Err(LedgerError::validation(format!(
            "cart has more than {} products",
            MAX_CART_LINES
        )));
    }
    Ok(merged)
}

/// Check one line against the catalog and price it.
fn price_line(product: &Product, quantity: u64) -> Result<LineItem> {
    if !product.active {
        return Err(LedgerError::InventoryUnavailable {
            product: product.id.clone(),
            requested: quantity,
            available: 0,
        });
    }
    if product.inventory < quantity {
        return Err(LedgerError::InventoryUnavailable {
            product: product.id.clone(),
            requested: quantity,
            available: product.inventory,
        });
    }
    let line_total = product
        .unit_cost
        .checked_mul(quantity)
        .ok_or_else(|| LedgerError::validation("line total overflow"))?;
    Ok(LineItem {
        product_id: product.id.clone(),
        product_name: product.name.clone(),
        quantity,
        unit_cost: product.unit_cost,
        line_total,
    })
}

impl CheckoutEngine {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    pub fn checkout(
        &self,
        buyer: &str,
        items: &[CartItem],
        shipping: Option<ShippingInfo>,
    ) -> Result<CheckoutReceipt> {
        validate_id("account", buyer)?;
        let cart = merge_cart(items)?;
        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;

        let result = self.ctx.db.transaction(|txn| {
            match txn.account(buyer)? {
                Some(account) if account.active => {}
                Some(_) => {
                    return abort(LedgerError::validation(format!(
                        "buyer {} is inactive",
                        buyer
                    )))
                }
                None => return abort(LedgerError::not_found(Entity::Account, buyer)),
            }

            // Every line is checked before anything is written.
            let mut products = Vec::with_capacity(cart.len());
            let mut line_items = Vec::with_capacity(cart.len());
            let mut total_cost: u64 = 0;
            for item in &cart {
                let product = match txn.product(&item.product_id)? {
                    Some(product) => product,
                    None => {
                        return abort(LedgerError::not_found(Entity::Product, &item.product_id))
                    }
                };
                let line = price_line(&product, item.quantity).or_abort()?;
                total_cost = total_cost
                    .checked_add(line.line_total)
                    .ok_or_else(|| LedgerError::validation("order total overflow"))
                    .or_abort()?;
                products.push(product);
                line_items.push(line);
            }

            let balance = BalanceStore::debit(
                txn,
                buyer,
                total_cost,
                DebitReason::Purchase,
                default_limit,
                now,
            )?;

            for (product, line) in products.iter_mut().zip(&line_items) {
                product.inventory -= line.quantity;
                txn.put_product(product)?;
            }

            let order_id = Uuid::new_v4().to_string();
            let transaction = Transaction::new(
                TransactionKind::Spent,
                Counterparties::from_account(buyer),
                total_cost,
                format!("Order {}", order_id),
                now,
            )
            .with_metadata(json!({
                "order_id": order_id,
                "items": line_items,
                "total_cost": total_cost,
            }));

            let order = Order {
                id: order_id,
                buyer: buyer.to_string(),
                line_items,
                total_cost,
                status: OrderStatus::Pending,
                shipping: shipping.clone(),
                transaction_id: transaction.id.clone(),
                cancellation_request: None,
                created_at: now,
                updated_at: now,
            };

            txn.insert_order(&order)?;
            TransactionLog::record(txn, &transaction)?;

            Ok(CheckoutReceipt {
                order,
                transaction,
                balance,
            })
        });

        match &result {
            Ok(receipt) => tracing::info!(
                buyer,
                order = %receipt.order.id,
                total = receipt.order.total_cost,
                lines = receipt.order.line_items.len(),
                "checkout committed"
            ),
            Err(err) => tracing::debug!(buyer, error = %err, "checkout rejected"),
        }
        result
    }

    /// Mark a pending order as fulfilled.
    pub fn complete_order(&self, order_id: &str, admin: &str) -> Result<Order> {
        let now = self.ctx.clock.now();
        let order = self.ctx.db.transaction(|txn| {
            let mut order = match txn.order(order_id)? {
                Some(order) => order,
                None => return abort(LedgerError::not_found(Entity::Order, order_id)),
            };
            order.transition(OrderStatus::Completed, now).or_abort()?;
            txn.put_order(&order)?;
            Ok(order)
        })?;
        tracing::info!(order = order_id, admin, "order completed");
        Ok(order)
    }

    pub fn order(&self, order_id: &str) -> Result<Order> {
        self.ctx
            .db
            .order(order_id)?
            .ok_or_else(|| LedgerError::not_found(Entity::Order, order_id))
    }

    pub fn orders_for(&self, buyer: &str) -> Result<Vec<Order>> {
        self.ctx.db.orders_for(buyer)
    }
}
