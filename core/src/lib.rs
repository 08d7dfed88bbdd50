//! Kudos Core Library
//!
//! Domain types and pure validation for the points ledger: balances,
//! transactions, orders, catalog records, configuration and the error
//! taxonomy shared by every crate in the workspace.

pub mod balance;
pub mod clock;
pub mod config;
pub mod directory;
pub mod error;
pub mod order;
pub mod transaction;

pub use balance::{AccountId, Balance};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::LedgerConfig;
pub use directory::{Account, Product};
pub use error::{Entity, LedgerError, Result};
pub use order::{
    AdminResponse, CancellationAction, CancellationRequest, CartItem, LineItem, Order,
    OrderStatus, ShippingInfo,
};
pub use transaction::{Counterparties, Side, Transaction, TransactionKind};
