//! Settlement orchestrator.
//!
//! One attempt runs inside one ledger transaction: resolve the account, debit
//! the bet, draw the payout, credit any win, append the spin record, commit.
//! Any failure, cancellation or expired deadline rolls the attempt back, so a
//! caller never observes a debit without its spin record.

use rand::{SeedableRng, rngs::StdRng};
use rust_decimal::{Decimal, RoundingStrategy};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error};
use uuid::Uuid;

use super::context::SettleContext;
use super::errors::{SpinError, SpinResult};
use super::payout;
use super::retry::RetryPolicy;
use crate::config::{OddsConfig, SlotConfig};
use crate::db::{LedgerStore, LedgerTx};
use crate::logging;
use crate::wallet::{LEDGER_SCALE, NewSpin, SpinRecord, fits_ledger_scale, mutator};

/// Default page size for [`SpinEngine::history`]
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

/// Spin settlement engine
pub struct SpinEngine<S: LedgerStore> {
    store: Arc<S>,
    odds: OddsConfig,
    retry: RetryPolicy,
}

impl<S: LedgerStore> Clone for SpinEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            odds: self.odds,
            retry: self.retry,
        }
    }
}

impl<S: LedgerStore> SpinEngine<S> {
    /// Create a new engine
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional ledger store
    /// * `config` - Odds and retry configuration (already validated)
    pub fn new(store: Arc<S>, config: &SlotConfig) -> Self {
        Self {
            store,
            odds: config.odds,
            retry: RetryPolicy::new(config.retry),
        }
    }

    pub fn odds(&self) -> &OddsConfig {
        &self.odds
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Settle one spin.
    ///
    /// # Arguments
    ///
    /// * `ctx` - Cancellation and deadline for the whole call, retries included
    /// * `external_id` - Account external id
    /// * `bet` - Wager, must be positive
    ///
    /// # Returns
    ///
    /// * `SpinResult<SpinRecord>` - The committed spin record
    ///
    /// # Errors
    ///
    /// * `SpinError::InvalidBet` - `bet` is zero, negative or finer than [`LEDGER_SCALE`] places
    /// * `SpinError::AccountNotFound` - Unknown external id
    /// * `SpinError::InsufficientFunds` - Still short once the retry budget is spent
    /// * `SpinError::Cancelled` / `SpinError::DeadlineExceeded` - Caller gave up before commit
    /// * `SpinError::Storage` - Transaction or row I/O failed
    pub async fn settle(
        &self,
        ctx: &SettleContext,
        external_id: Uuid,
        bet: Decimal,
    ) -> SpinResult<SpinRecord> {
        if bet <= Decimal::ZERO || !fits_ledger_scale(bet) {
            return Err(SpinError::InvalidBet(bet));
        }

        let started = Instant::now();
        let result = self
            .retry
            .run(ctx, move |attempt| self.settle_once(ctx, external_id, bet, attempt))
            .await;

        match &result {
            Ok(record) => logging::log_settlement(record, started.elapsed()),
            Err(err) => error!(
                %external_id,
                %bet,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %err,
                "Settlement failed"
            ),
        }

        result
    }

    /// Spin history for an account, newest first
    pub async fn history(&self, external_id: Uuid, limit: i64) -> SpinResult<Vec<SpinRecord>> {
        let mut tx = self.store.begin().await?;

        let result = async {
            let account = tx
                .find_account(external_id)
                .await?
                .ok_or(SpinError::AccountNotFound(external_id))?;
            Ok::<_, SpinError>(tx.list_spins(account.id, limit.max(0)).await?)
        }
        .await;

        self.finish(tx, result).await
    }

    async fn settle_once(
        &self,
        ctx: &SettleContext,
        external_id: Uuid,
        bet: Decimal,
        attempt: u32,
    ) -> SpinResult<SpinRecord> {
        ctx.check()?;

        let mut tx = tokio::select! {
            biased;
            err = ctx.done() => return Err(err),
            tx = self.store.begin() => tx?,
        };

        let result = tokio::select! {
            biased;
            err = ctx.done() => Err(err),
            applied = self.apply(&mut tx, external_id, bet) => applied,
        };

        // Last chance to observe the caller before the writes become visible
        let result = result.and_then(|record| ctx.check().map(|()| record));

        let record = self.finish(tx, result).await?;
        debug!(attempt, spin_id = record.id, "Settlement attempt committed");
        Ok(record)
    }

    async fn apply(
        &self,
        tx: &mut S::Tx,
        external_id: Uuid,
        bet: Decimal,
    ) -> SpinResult<SpinRecord> {
        let account = tx
            .find_account(external_id)
            .await?
            .ok_or(SpinError::AccountNotFound(external_id))?;

        mutator::debit(tx, account.id, bet).await?;

        let mut rng = StdRng::from_os_rng();
        let outcome = payout::spin_outcome(&self.odds, &mut rng);
        // Truncated once so the credit and the spin record carry the same amount
        let win = payout::win_amount(bet, outcome, &self.odds)?
            .round_dp_with_strategy(LEDGER_SCALE, RoundingStrategy::ToZero);

        if win > Decimal::ZERO {
            // Fatal whatever the cause; the debit already happened in this transaction
            mutator::credit(tx, account.id, win)
                .await
                .map_err(SpinError::Storage)?;
        }

        let record = tx
            .append_spin(NewSpin {
                account_id: account.id,
                bet_amount: bet,
                win_amount: win,
            })
            .await?;

        debug!(account_id = account.id, %bet, %win, %outcome, "Spin applied");
        Ok(record)
    }

    /// Commit on success, roll back on failure
    async fn finish<T>(&self, tx: S::Tx, result: SpinResult<T>) -> SpinResult<T> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = tx.rollback().await {
                    logging::log_rollback_failure(&err, &rollback);
                }
                Err(err)
            }
        }
    }
}
