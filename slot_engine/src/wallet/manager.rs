//! Wallet manager: account lifecycle plus deposits and withdrawals.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::{
    errors::{LedgerError, LedgerResult},
    models::Account,
    mutator,
};
use crate::db::{LedgerStore, LedgerTx};
use crate::logging;

/// Wallet manager
pub struct WalletManager<S: LedgerStore> {
    store: Arc<S>,
}

impl<S: LedgerStore> Clone for WalletManager<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: LedgerStore> WalletManager<S> {
    /// Create a new wallet manager
    ///
    /// # Arguments
    ///
    /// * `store` - Transactional ledger store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Open an account with a zero balance
    ///
    /// # Errors
    ///
    /// * `LedgerError::DuplicateAccount` - External id already registered
    pub async fn open_account(&self, external_id: Uuid) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;

        let account = match tx.insert_account(external_id).await {
            Ok(account) => account,
            Err(err) => return Err(abandon(tx, err).await),
        };

        tx.commit().await?;

        info!(account_id = account.id, %external_id, "Account opened");
        Ok(account)
    }

    /// Get account by external id
    pub async fn get_account(&self, external_id: Uuid) -> LedgerResult<Account> {
        let mut tx = self.store.begin().await?;

        let account = match tx.find_account(external_id).await {
            Ok(Some(account)) => account,
            Ok(None) => return Err(abandon(tx, LedgerError::UnknownAccount(external_id)).await),
            Err(err) => return Err(abandon(tx, err).await),
        };

        tx.commit().await?;
        Ok(account)
    }

    /// Deposit funds
    ///
    /// # Arguments
    ///
    /// * `external_id` - Account external id
    /// * `amount` - Amount to add (must be positive)
    ///
    /// # Returns
    ///
    /// * `LedgerResult<Decimal>` - New balance or error
    pub async fn deposit(&self, external_id: Uuid, amount: Decimal) -> LedgerResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let balance = self.apply(external_id, amount).await?;
        info!(%external_id, %amount, %balance, "Deposit applied");
        Ok(balance)
    }

    /// Withdraw funds
    ///
    /// # Errors
    ///
    /// * `LedgerError::InsufficientFunds` - Balance lower than `amount`
    pub async fn withdraw(&self, external_id: Uuid, amount: Decimal) -> LedgerResult<Decimal> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }

        let balance = self.apply(external_id, -amount).await?;
        info!(%external_id, %amount, %balance, "Withdrawal applied");
        Ok(balance)
    }

    async fn apply(&self, external_id: Uuid, delta: Decimal) -> LedgerResult<Decimal> {
        let mut tx = self.store.begin().await?;

        let result = async {
            let account = tx
                .find_account(external_id)
                .await?
                .ok_or(LedgerError::UnknownAccount(external_id))?;
            mutator::adjust(&mut tx, account.id, delta).await
        }
        .await;

        match result {
            Ok(balance) => {
                tx.commit().await?;
                Ok(balance)
            }
            Err(err) => Err(abandon(tx, err).await),
        }
    }
}

/// Roll back after a failed operation, keeping the operation's error
async fn abandon<T: LedgerTx>(tx: T, err: LedgerError) -> LedgerError {
    if let Err(rollback) = tx.rollback().await {
        logging::log_rollback_failure(&err, &rollback);
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{FaultPoint, MemoryLedger};
    use rust_decimal_macros::dec;

    fn manager() -> (WalletManager<MemoryLedger>, Arc<MemoryLedger>) {
        let ledger = Arc::new(MemoryLedger::new());
        (WalletManager::new(ledger.clone()), ledger)
    }

    #[tokio::test]
    async fn test_open_account_starts_at_zero() {
        let (wallet, _) = manager();
        let external_id = Uuid::new_v4();

        let account = wallet.open_account(external_id).await.unwrap();
        assert_eq!(account.external_id, external_id);
        assert_eq!(account.balance, Decimal::ZERO);

        let fetched = wallet.get_account(external_id).await.unwrap();
        assert_eq!(fetched.id, account.id);
    }

    #[tokio::test]
    async fn test_open_account_twice_fails() {
        let (wallet, _) = manager();
        let external_id = Uuid::new_v4();

        wallet.open_account(external_id).await.unwrap();
        let err = wallet.open_account(external_id).await.unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateAccount(id) if id == external_id));
    }

    #[tokio::test]
    async fn test_deposit_then_withdraw() {
        let (wallet, _) = manager();
        let external_id = Uuid::new_v4();
        wallet.open_account(external_id).await.unwrap();

        assert_eq!(wallet.deposit(external_id, dec!(50)).await.unwrap(), dec!(50));
        assert_eq!(wallet.withdraw(external_id, dec!(20)).await.unwrap(), dec!(30));

        let err = wallet.withdraw(external_id, dec!(31)).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(
            wallet.get_account(external_id).await.unwrap().balance,
            dec!(30)
        );
    }

    #[tokio::test]
    async fn test_deposit_rejects_non_positive() {
        let (wallet, _) = manager();
        let external_id = Uuid::new_v4();
        wallet.open_account(external_id).await.unwrap();

        assert!(matches!(
            wallet.deposit(external_id, Decimal::ZERO).await,
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let (wallet, _) = manager();
        let err = wallet.deposit(Uuid::new_v4(), dec!(1)).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownAccount(_)));
    }

    #[tokio::test]
    async fn test_failed_rollback_keeps_operation_error() {
        let (wallet, ledger) = manager();
        let external_id = Uuid::new_v4();
        wallet.open_account(external_id).await.unwrap();
        wallet.deposit(external_id, dec!(5)).await.unwrap();

        ledger.inject_fault(FaultPoint::Rollback, 3);

        let missing = Uuid::new_v4();
        assert!(matches!(
            wallet.get_account(missing).await,
            Err(LedgerError::UnknownAccount(id)) if id == missing
        ));
        assert!(matches!(
            wallet.withdraw(external_id, dec!(6)).await,
            Err(LedgerError::InsufficientFunds { .. })
        ));
        assert!(matches!(
            wallet.open_account(external_id).await,
            Err(LedgerError::DuplicateAccount(_))
        ));

        ledger.clear_faults();
        assert_eq!(
            wallet.get_account(external_id).await.unwrap().balance,
            dec!(5)
        );
    }
}
