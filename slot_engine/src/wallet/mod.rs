//! Wallet module: account balances and the balance mutator.
//!
//! This module implements:
//! - Account and spin-history models
//! - The balance mutator, the single writer of `Account::balance`
//! - Bounds-checked debits that fail with `InsufficientFunds` instead of going negative
//! - Deposits and withdrawals, each in its own transaction
//!
//! ## Example
//!
//! ```no_run
//! use slot_engine::db::{Database, PgLedger};
//! use slot_engine::wallet::WalletManager;
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let wallet = WalletManager::new(Arc::new(PgLedger::new(db.pool().clone())));
//!
//!     let external_id = uuid::Uuid::new_v4();
//!     wallet.open_account(external_id).await?;
//!     let balance = wallet.deposit(external_id, Decimal::new(5000, 2)).await?;
//!     println!("Balance after deposit: {}", balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;
pub mod mutator;

pub use errors::{LedgerError, LedgerResult};
pub use manager::WalletManager;
pub use models::{Account, AccountId, LEDGER_SCALE, NewSpin, SpinRecord, fits_ledger_scale};
