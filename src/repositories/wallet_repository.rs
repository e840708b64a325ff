//! PostgreSQL wallet ledger

use super::LedgerStore;
use crate::error::RepositoryError;
use crate::models::{LedgerEntry, LedgerSnapshot, TransactionKind, WalletTransaction};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct TransactionRow {
    id: Uuid,
    account_id: Uuid,
    kind: String,
    amount: i64,
    balance_after: i64,
    description: String,
    correlation_id: String,
    created_at: NaiveDateTime,
}

impl TryFrom<TransactionRow> for WalletTransaction {
    type Error = RepositoryError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let kind = TransactionKind::from_str(&row.kind)
            .ok_or_else(|| RepositoryError::Corrupt(format!("transaction kind '{}'", row.kind)))?;

        Ok(Self {
            id: row.id,
            account_id: row.account_id,
            kind,
            amount: row.amount,
            balance_after: row.balance_after,
            description: row.description,
            correlation_id: row.correlation_id,
            created_at: row.created_at,
        })
    }
}

const TRANSACTION_COLUMNS: &str =
    "id, account_id, kind, amount, balance_after, description, correlation_id, created_at";

pub struct WalletRepository {
    pool: PgPool,
}

impl WalletRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply `entry` on an open connection, normally inside a transaction
    /// owned by the caller. Locks the account row for the rest of that
    /// transaction, which serializes every movement on the account.
    pub(crate) async fn append_in(
        conn: &mut PgConnection,
        entry: &LedgerEntry,
    ) -> Result<WalletTransaction, RepositoryError> {
        entry
            .validate()
            .map_err(RepositoryError::ConstraintViolation)?;

        sqlx::query(
            r#"
            INSERT INTO wallet_accounts (owner_id, balance)
            VALUES ($1, 0)
            ON CONFLICT (owner_id) DO NOTHING
            "#,
        )
        .bind(entry.account_id)
        .execute(&mut *conn)
        .await?;

        let balance: i64 = sqlx::query_scalar(
            r#"
            SELECT balance
            FROM wallet_accounts
            WHERE owner_id = $1
            FOR UPDATE
            "#,
        )
        .bind(entry.account_id)
        .fetch_one(&mut *conn)
        .await?;

        // A retried movement returns what was recorded the first time
        let existing = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM wallet_transactions \
             WHERE account_id = $1 AND kind = $2 AND correlation_id = $3",
            TRANSACTION_COLUMNS
        ))
        .bind(entry.account_id)
        .bind(entry.kind.as_str())
        .bind(&entry.correlation_id)
        .fetch_optional(&mut *conn)
        .await?;

        if let Some(row) = existing {
            debug!(
                "Ledger entry {} already applied to {}",
                entry.correlation_id, entry.account_id
            );
            return row.try_into();
        }

        let balance_after = entry.apply_to(balance).map_err(|rejection| {
            RepositoryError::ledger_rejected(rejection, balance, entry.amount)
        })?;

        sqlx::query(
            r#"
            UPDATE wallet_accounts
            SET balance = $2, updated_at = NOW()
            WHERE owner_id = $1
            "#,
        )
        .bind(entry.account_id)
        .bind(balance_after)
        .execute(&mut *conn)
        .await?;

        let row = sqlx::query_as::<_, TransactionRow>(&format!(
            "INSERT INTO wallet_transactions \
             (id, account_id, kind, amount, balance_after, description, correlation_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            TRANSACTION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(entry.account_id)
        .bind(entry.kind.as_str())
        .bind(entry.amount)
        .bind(balance_after)
        .bind(&entry.description)
        .bind(&entry.correlation_id)
        .fetch_one(&mut *conn)
        .await?;

        row.try_into()
    }
}

#[async_trait]
impl LedgerStore for WalletRepository {
    async fn balance(&self, account_id: Uuid) -> Result<i64, RepositoryError> {
        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallet_accounts WHERE owner_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(balance.unwrap_or(0))
    }

    async fn append(&self, entry: &LedgerEntry) -> Result<WalletTransaction, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let recorded = Self::append_in(&mut *tx, entry).await?;
        tx.commit().await?;

        Ok(recorded)
    }

    async fn transactions(
        &self,
        account_id: Uuid,
        limit: i64,
    ) -> Result<Vec<WalletTransaction>, RepositoryError> {
        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM wallet_transactions \
             WHERE account_id = $1 \
             ORDER BY created_at DESC, id DESC \
             LIMIT $2",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WalletTransaction::try_from).collect()
    }

    async fn snapshot(&self, account_id: Uuid) -> Result<LedgerSnapshot, RepositoryError> {
        // Read balance and log in one snapshot so a concurrent append cannot split them
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ")
            .execute(&mut *tx)
            .await?;

        let balance: Option<i64> =
            sqlx::query_scalar("SELECT balance FROM wallet_accounts WHERE owner_id = $1")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await?;

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM wallet_transactions WHERE account_id = $1 ORDER BY created_at ASC",
            TRANSACTION_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let log = rows
            .into_iter()
            .map(WalletTransaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(LedgerSnapshot::from_log(account_id, balance.unwrap_or(0), &log))
    }
}
