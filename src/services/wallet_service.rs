use crate::error::{AppError, AppResult};
use crate::models::{LedgerEntry, LedgerSnapshot, WalletTransaction};
use crate::repositories::LedgerStore;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

const MAX_HISTORY: i64 = 500;

/// Prepaid wallet balances and their append-only transaction log
pub struct WalletLedger {
    store: Arc<dyn LedgerStore>,
}

impl WalletLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Current balance; 0 for accounts that never transacted
    pub async fn balance(&self, account_id: Uuid) -> AppResult<i64> {
        Ok(self.store.balance(account_id).await?)
    }

    /// Raise the balance by `amount`
    pub async fn credit(
        &self,
        account_id: Uuid,
        amount: i64,
        description: &str,
        correlation_id: &str,
    ) -> AppResult<WalletTransaction> {
        let entry = LedgerEntry::credit(account_id, amount, description, correlation_id);
        self.apply(entry).await
    }

    /// Lower the balance by `amount`, or fail with `InsufficientFunds`
    /// leaving both the balance and the log untouched
    pub async fn debit(
        &self,
        account_id: Uuid,
        amount: i64,
        description: &str,
        correlation_id: &str,
    ) -> AppResult<WalletTransaction> {
        let entry = LedgerEntry::debit(account_id, amount, description, correlation_id);
        self.apply(entry).await
    }

    /// Credit from an external top-up, correlated by the payment reference
    pub async fn recharge(
        &self,
        account_id: Uuid,
        amount: i64,
        reference: &str,
    ) -> AppResult<WalletTransaction> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(AppError::Validation("Recharge reference is required".into()));
        }

        self.credit(
            account_id,
            amount,
            "Wallet recharge",
            &format!("recharge:{}", reference),
        )
        .await
    }

    /// Newest-first transaction log
    pub async fn history(&self, account_id: Uuid, limit: i64) -> AppResult<Vec<WalletTransaction>> {
        if limit <= 0 {
            return Err(AppError::Validation("Limit must be greater than zero".into()));
        }
        Ok(self
            .store
            .transactions(account_id, limit.min(MAX_HISTORY))
            .await?)
    }

    /// Recompute the balance from the log and compare it to the cached one
    pub async fn reconcile(&self, account_id: Uuid) -> AppResult<LedgerSnapshot> {
        let snapshot = self.store.snapshot(account_id).await?;

        if !snapshot.is_consistent() {
            error!(
                account = %account_id,
                cached = snapshot.cached_balance,
                derived = snapshot.derived_balance(),
                "Wallet balance does not match its ledger"
            );
        }

        Ok(snapshot)
    }

    async fn apply(&self, entry: LedgerEntry) -> AppResult<WalletTransaction> {
        entry.validate().map_err(AppError::Validation)?;

        let tx = self.store.append(&entry).await?;

        info!(
            "Wallet {}: account={}, amount={}, balance_after={}",
            tx.kind.as_str(),
            tx.account_id,
            tx.amount,
            tx.balance_after
        );

        Ok(tx)
    }
}
