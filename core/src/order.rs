//! Orders and their cancellation lifecycle

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::balance::AccountId;
use crate::error::{LedgerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    /// Orders in these states still hold the buyer's points and the stock.
    pub fn is_open(self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminResponse {
    Pending,
    Approved,
    Denied,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancellationAction {
    Approve,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancellationRequest {
    pub requested_at: DateTime<Utc>,
    pub requested_by: AccountId,
    pub reason: String,
    pub admin_response: AdminResponse,
    pub admin_notes: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub processed_by: Option<AccountId>,
}

/// One product line as requested by the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u64,
}

impl CartItem {
    pub fn new(product_id: impl Into<String>, quantity: u64) -> Self {
        Self {
            product_id: product_id.into(),
            quantity,
        }
    }
}

/// One product line as priced at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: String,
    pub product_name: String,
    pub quantity: u64,
    pub unit_cost: u64,
    pub line_total: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingInfo {
    pub recipient_name: String,
    pub address: String,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub buyer: AccountId,
    pub line_items: Vec<LineItem>,
    pub total_cost: u64,
    pub status: OrderStatus,
    pub shipping: Option<ShippingInfo>,
    pub transaction_id: String,
    pub cancellation_request: Option<CancellationRequest>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn validate(&self) -> Result<()> {
        if self.line_items.is_empty() {
            return Err(LedgerError::validation(format!(
                "order {} has no line items",
                self.id
            )));
        }
        let mut sum = 0u64;
        for item in &self.line_items {
            let expected = item
                .unit_cost
                .checked_mul(item.quantity)
                .ok_or_else(|| LedgerError::validation("line total overflow"))?;
            if item.quantity == 0 || item.line_total != expected {
                return Err(LedgerError::validation(format!(
                    "order {} line {} is mispriced",
                    self.id, item.product_id
                )));
            }
            sum = sum
                .checked_add(item.line_total)
                .ok_or_else(|| LedgerError::validation("order total overflow"))?;
        }
        if sum != self.total_cost {
            return Err(LedgerError::validation(format!(
                "order {} total {} does not match line items {}",
                self.id, self.total_cost, sum
            )));
        }
        Ok(())
    }

    /// Attach a buyer's cancellation request.
    pub fn request_cancellation(
        &mut self,
        requester: &str,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if !self.status.is_open() {
            return Err(LedgerError::invalid_transition(format!(
                "order {} is {:?} and cannot be cancelled",
                self.id, self.status
            )));
        }
        if let Some(existing) = &self.cancellation_request {
            return Err(LedgerError::invalid_transition(format!(
                "order {} already has a {:?} cancellation request",
                self.id, existing.admin_response
            )));
        }
        if requester != self.buyer {
            return Err(LedgerError::validation(format!(
                "{} is not the buyer of order {}",
                requester, self.id
            )));
        }
        if reason.trim().is_empty() {
            return Err(LedgerError::validation("cancellation reason is required"));
        }
        self.cancellation_request = Some(CancellationRequest {
            requested_at: now,
            requested_by: requester.to_string(),
            reason: reason.trim().to_string(),
            admin_response: AdminResponse::Pending,
            admin_notes: None,
            processed_at: None,
            processed_by: None,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Record the admin decision on a pending request. Balance and
    /// inventory effects of an approval are applied by the caller in the
    /// same storage transaction.
    pub fn resolve_cancellation(
        &mut self,
        action: CancellationAction,
        admin: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let order_id = self.id.clone();
        let status = self.status;
        let request = self.cancellation_request.as_mut().ok_or_else(|| {
            LedgerError::invalid_transition(format!(
                "order {} has no cancellation request",
                order_id
            ))
        })?;
        if request.admin_response != AdminResponse::Pending {
            return Err(LedgerError::invalid_transition(format!(
                "cancellation for order {} was already {:?}",
                order_id, request.admin_response
            )));
        }
        if action == CancellationAction::Approve && !status.is_open() {
            return Err(LedgerError::invalid_transition(format!(
                "order {} is {:?}; nothing to refund",
                order_id, status
            )));
        }
        request.admin_response = match action {
            CancellationAction::Approve => AdminResponse::Approved,
            CancellationAction::Deny => AdminResponse::Denied,
        };
        request.admin_notes = notes;
        request.processed_at = Some(now);
        request.processed_by = Some(admin.to_string());
        if action == CancellationAction::Approve {
            self.status = OrderStatus::Cancelled;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn transition(&mut self, to: OrderStatus, now: DateTime<Utc>) -> Result<()> {
        let allowed = matches!(
            (self.status, to),
            (OrderStatus::Pending, OrderStatus::Completed)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Completed, OrderStatus::Refunded)
        );
        if !allowed {
            return Err(LedgerError::invalid_transition(format!(
                "order {} cannot move from {:?} to {:?}",
                self.id, self.status, to
            )));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}
