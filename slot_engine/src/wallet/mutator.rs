//! Balance mutator: the only code path that writes an account balance.
//!
//! Every function here takes the caller's open transaction. The sufficiency
//! check and the write happen against a row locked inside that transaction, so
//! two concurrent debits can never both observe enough funds. Nothing is
//! retried at this layer.

use rust_decimal::Decimal;
use tracing::debug;

use super::{
    errors::{LedgerError, LedgerResult},
    models::{AccountId, fits_ledger_scale},
};
use crate::db::LedgerTx;

/// Apply a signed `delta` to an account balance inside `tx`.
///
/// # Arguments
///
/// * `tx` - Open ledger transaction
/// * `account_id` - Internal account id
/// * `delta` - Positive to credit, negative to debit
///
/// # Returns
///
/// * `LedgerResult<Decimal>` - Balance after the change (visible once `tx` commits)
///
/// # Errors
///
/// * `LedgerError::AccountNotFound` - No row for `account_id`
/// * `LedgerError::InsufficientFunds` - Debit would make the balance negative; nothing written
/// * `LedgerError::BalanceOverflow` - Result is outside the decimal range
/// * `LedgerError::InvalidAmount` - `delta` has more places than the ledger stores
pub async fn adjust<T>(tx: &mut T, account_id: AccountId, delta: Decimal) -> LedgerResult<Decimal>
where
    T: LedgerTx + ?Sized,
{
    // Anything finer than the ledger scale would be rounded on write
    if !fits_ledger_scale(delta) {
        return Err(LedgerError::InvalidAmount(delta.abs()));
    }

    let current = tx
        .lock_balance(account_id)
        .await?
        .ok_or(LedgerError::AccountNotFound(account_id))?;

    if delta.is_zero() {
        return Ok(current);
    }

    let updated = current
        .checked_add(delta)
        .ok_or(LedgerError::BalanceOverflow)?;

    if delta < Decimal::ZERO && updated < Decimal::ZERO {
        return Err(LedgerError::InsufficientFunds {
            available: current,
            required: -delta,
        });
    }

    tx.write_balance(account_id, updated).await?;

    debug!(
        account_id,
        %delta,
        balance_before = %current,
        balance_after = %updated,
        "Balance adjusted"
    );

    Ok(updated)
}

/// Credit a positive `amount`
pub async fn credit<T>(tx: &mut T, account_id: AccountId, amount: Decimal) -> LedgerResult<Decimal>
where
    T: LedgerTx + ?Sized,
{
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    adjust(tx, account_id, amount).await
}

/// Debit a positive `amount`
pub async fn debit<T>(tx: &mut T, account_id: AccountId, amount: Decimal) -> LedgerResult<Decimal>
where
    T: LedgerTx + ?Sized,
{
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(amount));
    }
    adjust(tx, account_id, -amount).await
}
