//! Slot module: spin settlement.
//!
//! This module implements:
//! - The payout calculator (two independent draws, three-match first)
//! - The settlement orchestrator: debit, payout, credit and history append in one transaction
//! - Bounded exponential backoff that retries only insufficient-funds failures
//! - Caller cancellation and deadlines
//!
//! ## Example
//!
//! ```no_run
//! use slot_engine::config::SlotConfig;
//! use slot_engine::db::{Database, DatabaseConfig};
//! use slot_engine::slot::{SettleContext, SpinEngine};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&DatabaseConfig::from_env()?).await?;
//!     let engine = SpinEngine::new(Arc::new(db.ledger()), &SlotConfig::load()?);
//!
//!     let ctx = SettleContext::background().with_timeout(Duration::from_secs(5));
//!     let record = engine
//!         .settle(&ctx, uuid::Uuid::new_v4(), Decimal::new(100, 2))
//!         .await?;
//!     println!("Won {}", record.win_amount);
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod engine;
pub mod errors;
pub mod payout;
pub mod retry;

pub use context::{CancelHandle, SettleContext};
pub use engine::{DEFAULT_HISTORY_LIMIT, SpinEngine};
pub use errors::{Recoverability, SpinError, SpinResult};
pub use payout::{Outcome, payout, spin_outcome, win_amount};
pub use retry::{Backoff, RetryPolicy};
