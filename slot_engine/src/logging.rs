//! Structured logging setup and settlement event helpers.

use std::time::Duration;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::slot::SpinError;
use crate::wallet::{LedgerError, SpinRecord};

const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Settlements slower than this are logged at `warn`
pub const SLOW_SETTLEMENT: Duration = Duration::from_secs(1);

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`, falling back to `info,sqlx=warn`.
///
/// # Panics
///
/// Panics if a global subscriber is already installed. Use [`try_init`]
/// where that can happen (tests, embedding applications).
///
/// # Example
///
/// ```no_run
/// use slot_engine::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Engine starting");
/// }
/// ```
pub fn init() {
    if let Err(err) = try_init() {
        panic!("Failed to initialize logging: {err}");
    }
}

/// Initialize structured logging unless a subscriber is already installed
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!("Structured logging initialized");
    Ok(())
}

/// Log a committed settlement
///
/// # Arguments
///
/// * `record` - Committed spin record
/// * `elapsed` - Wall time of the whole call, retries included
pub fn log_settlement(record: &SpinRecord, elapsed: Duration) {
    let elapsed_ms = elapsed.as_millis() as u64;

    if elapsed > SLOW_SETTLEMENT {
        tracing::warn!(
            spin_id = record.id,
            account_id = record.account_id,
            bet = %record.bet_amount,
            win = %record.win_amount,
            elapsed_ms,
            "Slow settlement"
        );
    } else {
        tracing::info!(
            spin_id = record.id,
            account_id = record.account_id,
            bet = %record.bet_amount,
            win = %record.win_amount,
            elapsed_ms,
            "Spin settled"
        );
    }
}

/// Log a recoverable failure that is about to be retried
pub fn log_retry(attempt: u32, delay: Duration, err: &SpinError) {
    tracing::warn!(
        attempt,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "Settlement attempt failed, retrying"
    );
}

/// Log a rollback that failed after the operation itself failed.
///
/// The operation's error is what the caller sees.
pub fn log_rollback_failure(err: &dyn std::fmt::Display, rollback: &LedgerError) {
    tracing::error!(
        error = %err,
        rollback_error = %rollback,
        "Rollback failed"
    );
}
