//! PostgreSQL listing registry storage

use super::wallet_repository::WalletRepository;
use super::ListingStore;
use crate::error::RepositoryError;
use crate::models::{
    ApprovalDecision, LedgerEntry, Listing, ListingKind, ListingStatus, Verdict, WalletTransaction,
};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct ListingRow {
    id: Uuid,
    kind: String,
    owner_id: Uuid,
    title: String,
    description: Option<String>,
    details: serde_json::Value,
    mrp: Option<Decimal>,
    image_url: Option<String>,
    cost: i64,
    status: String,
    tags: Vec<String>,
    created_at: NaiveDateTime,
    decided_at: Option<NaiveDateTime>,
    expires_at: Option<NaiveDateTime>,
}

impl TryFrom<ListingRow> for Listing {
    type Error = RepositoryError;

    fn try_from(row: ListingRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            kind: ListingKind::from_str(&row.kind).map_err(RepositoryError::Corrupt)?,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            details: row.details,
            mrp: row.mrp,
            image_url: row.image_url,
            cost: row.cost,
            status: ListingStatus::from_str(&row.status).map_err(RepositoryError::Corrupt)?,
            tags: row.tags,
            created_at: row.created_at,
            decided_at: row.decided_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct DecisionRow {
    listing_id: Uuid,
    moderator_id: Uuid,
    decision: String,
    reason: Option<String>,
    decided_at: NaiveDateTime,
}

impl TryFrom<DecisionRow> for ApprovalDecision {
    type Error = RepositoryError;

    fn try_from(row: DecisionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            listing_id: row.listing_id,
            moderator_id: row.moderator_id,
            decision: Verdict::from_str(&row.decision).map_err(RepositoryError::Corrupt)?,
            reason: row.reason,
            decided_at: row.decided_at,
        })
    }
}

const LISTING_COLUMNS: &str = "id, kind, owner_id, title, description, details, mrp, image_url, \
     cost, status, tags, created_at, decided_at, expires_at";

fn into_listings(rows: Vec<ListingRow>) -> Result<Vec<Listing>, RepositoryError> {
    rows.into_iter().map(Listing::try_from).collect()
}

/// Repository for listings and their moderation decisions
pub struct ListingRepository {
    pool: PgPool,
}

impl ListingRepository {
    /// Create a new ListingRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingStore for ListingRepository {
    async fn insert_charged(
        &self,
        listing: &Listing,
        charge: &LedgerEntry,
    ) -> Result<(Listing, WalletTransaction), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        // Dropping `tx` on any error below rolls the debit back with the insert
        let debit = WalletRepository::append_in(&mut *tx, charge).await?;

        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "INSERT INTO listings \
             (id, kind, owner_id, title, description, details, mrp, image_url, cost, status, tags, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {}",
            LISTING_COLUMNS
        ))
        .bind(listing.id)
        .bind(listing.kind.as_str())
        .bind(listing.owner_id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(&listing.details)
        .bind(listing.mrp)
        .bind(&listing.image_url)
        .bind(listing.cost)
        .bind(listing.status.as_str())
        .bind(listing.tags.clone())
        .bind(listing.created_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok((Listing::try_from(row)?, debit))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Listing>, RepositoryError> {
        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE id = $1",
            LISTING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Listing::try_from).transpose()
    }

    async fn find_by_owner(&self, owner_id: Uuid) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings WHERE owner_id = $1 ORDER BY created_at DESC",
            LISTING_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        into_listings(rows)
    }

    async fn find_pending(&self, limit: i64) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "SELECT {} FROM listings \
             WHERE status = 'pending' \
             ORDER BY created_at ASC, id ASC \
             LIMIT $1",
            LISTING_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        into_listings(rows)
    }

    async fn record_decision(
        &self,
        decided: &Listing,
        decision: &ApprovalDecision,
    ) -> Result<Listing, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, ListingRow>(&format!(
            "UPDATE listings \
             SET status = $2, decided_at = $3, expires_at = $4 \
             WHERE id = $1 AND status = 'pending' \
             RETURNING {}",
            LISTING_COLUMNS
        ))
        .bind(decided.id)
        .bind(decided.status.as_str())
        .bind(decided.decided_at)
        .bind(decided.expires_at)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| {
            RepositoryError::StaleState(format!("listing {} is no longer pending", decided.id))
        })?;

        sqlx::query(
            r#"
            INSERT INTO approval_decisions (listing_id, moderator_id, decision, reason, decided_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(decision.listing_id)
        .bind(decision.moderator_id)
        .bind(decision.decision.as_str())
        .bind(&decision.reason)
        .bind(decision.decided_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        row.try_into()
    }

    async fn find_decision(
        &self,
        listing_id: Uuid,
    ) -> Result<Option<ApprovalDecision>, RepositoryError> {
        let row = sqlx::query_as::<_, DecisionRow>(
            r#"
            SELECT listing_id, moderator_id, decision, reason, decided_at
            FROM approval_decisions
            WHERE listing_id = $1
            "#,
        )
        .bind(listing_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ApprovalDecision::try_from).transpose()
    }

    async fn expire_due(&self, now: NaiveDateTime) -> Result<Vec<Listing>, RepositoryError> {
        let rows = sqlx::query_as::<_, ListingRow>(&format!(
            "UPDATE listings \
             SET status = 'expired' \
             WHERE status = 'approved' AND expires_at IS NOT NULL AND expires_at <= $1 \
             RETURNING {}",
            LISTING_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        into_listings(rows)
    }
}
