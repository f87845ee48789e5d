//! # Slot Engine
//!
//! Spin settlement on a transactional ledger: debit a bet, draw a randomized
//! payout, credit any win and append the spin to history, all in one
//! transaction.
//!
//! ## Architecture
//!
//! A settlement attempt runs entirely inside one [`db::LedgerTx`]:
//!
//! 1. **Resolve**: external id to account row
//! 2. **Debit**: the bet, through the balance mutator (never below zero)
//! 3. **Payout**: three-match draw, then an independent two-match draw
//! 4. **Credit**: the win, if any
//! 5. **Record**: append the spin to history
//! 6. **Commit**
//!
//! Any failure rolls the attempt back. An attempt that failed only for lack of
//! funds is retried with bounded exponential backoff, since a deposit may still
//! be landing; every other failure is returned at once.
//!
//! ## Core Modules
//!
//! - [`slot`]: Settlement orchestrator, payout calculator, retry policy, cancellation
//! - [`wallet`]: Account models, the balance mutator, deposits and withdrawals
//! - [`db`]: Ledger store traits with PostgreSQL and in-memory implementations
//! - [`config`]: Odds and retry configuration from the environment
//! - [`logging`]: Subscriber setup and structured settlement events
//!
//! ## Example
//!
//! ```
//! use slot_engine::{MemoryLedger, SettleContext, SlotConfig, SpinEngine};
//! use rust_decimal::Decimal;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = MemoryLedger::new();
//! let player = uuid::Uuid::new_v4();
//! ledger.seed_account(player, Decimal::from(100)).await?;
//!
//! let engine = SpinEngine::new(Arc::new(ledger), &SlotConfig::default());
//! let record = engine
//!     .settle(&SettleContext::background(), player, Decimal::from(10))
//!     .await?;
//! assert_eq!(record.bet_amount, Decimal::from(10));
//! # Ok(())
//! # }
//! ```

/// Odds and retry configuration.
pub mod config;
pub use config::{ConfigError, OddsConfig, RetryConfig, SlotConfig};

/// Ledger storage.
pub mod db;
pub use db::{Database, DatabaseConfig, LedgerStore, LedgerTx, MemoryLedger, PgLedger};

/// Logging setup and event helpers.
pub mod logging;

/// Spin settlement.
pub mod slot;
pub use slot::{
    CancelHandle, Outcome, Recoverability, RetryPolicy, SettleContext, SpinEngine, SpinError,
    SpinResult,
};

/// Accounts and balances.
pub mod wallet;
pub use wallet::{Account, AccountId, LedgerError, LedgerResult, SpinRecord, WalletManager};
