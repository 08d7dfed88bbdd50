//! Cheer Engine
//!
//! The one entry point for peer-to-peer recognition. A cheer consumes the
//! sender's monthly quota (it does not touch their available points),
//! credits the recipient, and writes a `given`/`received` pair that share a
//! `cheer_id`.

use kudos_core::directory::validate_id;
use kudos_core::{
    Balance, Counterparties, Entity, LedgerError, Result, Transaction, TransactionKind,
};
use kudos_storage::{abort, OrAbort};
use serde_json::json;
use uuid::Uuid;

use crate::balance_store::{BalanceStore, CreditReason};
use crate::context::LedgerContext;
use crate::transaction_log::TransactionLog;

#[derive(Debug, Clone)]
pub struct CheerReceipt {
    pub cheer_id: String,
    pub given: Transaction,
    pub received: Transaction,
    pub sender: Balance,
    pub recipient: Balance,
}

#[derive(Debug, Clone)]
pub struct CheerEngine {
    ctx: LedgerContext,
}

impl CheerEngine {
    pub fn new(ctx: LedgerContext) -> Self {
        Self { ctx }
    }

    /// Checks that need no stored state.
    pub fn validate_request(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        message: Option<&str>,
    ) -> Result<()> {
        validate_id("account", from)?;
        validate_id("account", to)?;
        if from == to {
            return Err(LedgerError::validation("cannot cheer yourself"));
        }
        let config = &self.ctx.config;
        if amount < config.cheer_min_amount || amount > config.cheer_max_amount {
            return Err(LedgerError::validation(format!(
                "cheer amount {} outside {}..={}",
                amount, config.cheer_min_amount, config.cheer_max_amount
            )));
        }
        if let Some(message) = message {
            if message.chars().count() > config.max_message_length {
                return Err(LedgerError::validation(format!(
                    "message longer than {} characters",
                    config.max_message_length
                )));
            }
        }
        Ok(())
    }

    pub fn cheer(
        &self,
        from: &str,
        to: &str,
        amount: u64,
        message: Option<&str>,
    ) -> Result<CheerReceipt> {
        let message = message.map(str::trim).filter(|m| !m.is_empty());
        self.validate_request(from, to, amount, message)?;

        let now = self.ctx.clock.now();
        let default_limit = self.ctx.config.monthly_give_limit;

        let result = self.ctx.db.transaction(|txn| {
            match txn.account(from)? {
                Some(sender) if sender.active => {}
                Some(_) => {
                    return abort(LedgerError::validation(format!(
                        "sender {} is inactive",
                        from
                    )))
                }
                None => return abort(LedgerError::not_found(Entity::Account, from)),
            }
            match txn.account(to)? {
                Some(recipient) if recipient.active => {}
                Some(_) => {
                    return abort(LedgerError::validation(format!(
                        "recipient {} is inactive",
                        to
                    )))
                }
                None => return abort(LedgerError::not_found(Entity::Account, to)),
            }

            let mut sender = BalanceStore::load(txn, from, default_limit, now)?;
            if sender.reset_quota_if_due(now) {
                tracing::debug!(account = from, "monthly quota reset on cheer");
            }
            sender.consume_quota(amount, now).or_abort()?;
            txn.put_balance(&sender)?;

            let recipient =
                BalanceStore::credit(txn, to, amount, CreditReason::Earned, default_limit, now)?;

            let cheer_id = Uuid::new_v4().to_string();
            let parties = Counterparties::between(from, to);
            let metadata = json!({
                "cheer_id": cheer_id,
                "from": from,
                "to": to,
            });
            let given = Transaction::new(
                TransactionKind::Given,
                parties.clone(),
                amount,
                format!("Cheer to {}", to),
                now,
            )
            .with_message(message.map(String::from))
            .with_metadata(metadata.clone());
            let received = Transaction::new(
                TransactionKind::Received,
                parties,
                amount,
                format!("Cheer from {}", from),
                now,
            )
            .with_message(message.map(String::from))
            .with_metadata(metadata);

            TransactionLog::record(txn, &given)?;
            TransactionLog::record(txn, &received)?;

            Ok(CheerReceipt {
                cheer_id,
                given,
                received,
                sender,
                recipient,
            })
        });

        match &result {
            Ok(receipt) => tracing::info!(
                from,
                to,
                amount,
                cheer_id = %receipt.cheer_id,
                "cheer recorded"
            ),
            Err(err) => tracing::debug!(from, to, amount, error = %err, "cheer rejected"),
        }
        result
    }
}
