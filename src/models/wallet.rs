//! Wallet ledger models: append-only transactions and the balance derived from them

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Direction of a ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Credit,
    Debit,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credit => "credit",
            Self::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(Self::Credit),
            "debit" => Some(Self::Debit),
            _ => None,
        }
    }
}

/// Recorded ledger transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub balance_after: i64,
    pub description: String,
    /// Listing id or recharge reference; retries with the same value are applied once
    pub correlation_id: String,
    pub created_at: NaiveDateTime,
}

impl WalletTransaction {
    /// Effect of this transaction on the balance
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Credit => self.amount,
            TransactionKind::Debit => -self.amount,
        }
    }
}

/// Why an entry cannot be applied to the current balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerRejection {
    /// Debit larger than the balance, by this much
    InsufficientFunds { shortfall: i64 },
    /// Credit would push the balance past `i64::MAX`
    Overflow,
}

/// A credit or debit to be applied to one account
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub account_id: Uuid,
    pub kind: TransactionKind,
    pub amount: i64,
    pub description: String,
    pub correlation_id: String,
}

impl LedgerEntry {
    pub fn credit(
        account_id: Uuid,
        amount: i64,
        description: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            kind: TransactionKind::Credit,
            amount,
            description: description.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn debit(
        account_id: Uuid,
        amount: i64,
        description: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            account_id,
            kind: TransactionKind::Debit,
            amount,
            description: description.into(),
            correlation_id: correlation_id.into(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.amount <= 0 {
            return Err("Amount must be greater than zero".to_string());
        }
        if self.correlation_id.trim().is_empty() {
            return Err("Correlation id is required".to_string());
        }
        Ok(())
    }

    /// Balance after applying this entry
    pub fn apply_to(&self, balance: i64) -> Result<i64, LedgerRejection> {
        match self.kind {
            TransactionKind::Credit => balance
                .checked_add(self.amount)
                .ok_or(LedgerRejection::Overflow),
            TransactionKind::Debit if balance >= self.amount => Ok(balance - self.amount),
            TransactionKind::Debit => Err(LedgerRejection::InsufficientFunds {
                shortfall: self.amount - balance,
            }),
        }
    }

    /// Same movement already recorded for this account
    pub fn matches(&self, tx: &WalletTransaction) -> bool {
        tx.account_id == self.account_id
            && tx.kind == self.kind
            && tx.correlation_id == self.correlation_id
    }
}

/// Cached balance next to the balance recomputed from the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub account_id: Uuid,
    pub cached_balance: i64,
    pub total_credits: i64,
    pub total_debits: i64,
    pub transaction_count: usize,
}

impl LedgerSnapshot {
    pub fn from_log(account_id: Uuid, cached_balance: i64, log: &[WalletTransaction]) -> Self {
        let (total_credits, total_debits) =
            log.iter().fold((0i64, 0i64), |(credits, debits), tx| match tx.kind {
                TransactionKind::Credit => (credits.saturating_add(tx.amount), debits),
                TransactionKind::Debit => (credits, debits.saturating_add(tx.amount)),
            });

        Self {
            account_id,
            cached_balance,
            total_credits,
            total_debits,
            transaction_count: log.len(),
        }
    }

    pub fn derived_balance(&self) -> i64 {
        self.total_credits.saturating_sub(self.total_debits)
    }

    pub fn is_consistent(&self) -> bool {
        self.cached_balance == self.derived_balance()
    }
}
