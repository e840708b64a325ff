use super::RequestStore;
use crate::error::RepositoryError;
use crate::models::{Request, RequestStatus};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

#[derive(Debug, FromRow)]
struct RequestRow {
    id: Uuid,
    item_id: Uuid,
    borrower_id: Uuid,
    lender_id: Uuid,
    approval_status: String,
    message: Option<String>,
    created_at: NaiveDateTime,
    decided_at: Option<NaiveDateTime>,
}

impl TryFrom<RequestRow> for Request {
    type Error = RepositoryError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            item_id: row.item_id,
            borrower_id: row.borrower_id,
            lender_id: row.lender_id,
            approval_status: RequestStatus::from_str(&row.approval_status)
                .map_err(RepositoryError::Corrupt)?,
            message: row.message,
            created_at: row.created_at,
            decided_at: row.decided_at,
        })
    }
}

const REQUEST_COLUMNS: &str =
    "id, item_id, borrower_id, lender_id, approval_status, message, created_at, decided_at";

fn into_requests(rows: Vec<RequestRow>) -> Result<Vec<Request>, RepositoryError> {
    rows.into_iter().map(Request::try_from).collect()
}

/// Repository for borrower requests
pub struct RequestRepository {
    pool: PgPool,
}

impl RequestRepository {
    /// Create a new RequestRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RequestStore for RequestRepository {
    async fn find_active(
        &self,
        borrower_id: Uuid,
        item_id: Uuid,
    ) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM requests \
             WHERE borrower_id = $1 AND item_id = $2 \
               AND approval_status IN ('pending', 'approved') \
             LIMIT 1",
            REQUEST_COLUMNS
        ))
        .bind(borrower_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Request::try_from).transpose()
    }

    async fn insert(&self, request: &Request) -> Result<Request, RepositoryError> {
        // uq_requests_active_pair turns a concurrent second insert into 23505
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "INSERT INTO requests \
             (id, item_id, borrower_id, lender_id, approval_status, message, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request.id)
        .bind(request.item_id)
        .bind(request.borrower_id)
        .bind(request.lender_id)
        .bind(request.approval_status.as_str())
        .bind(&request.message)
        .bind(request.created_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Request::try_from).transpose()
    }

    async fn compare_and_set_status(
        &self,
        id: Uuid,
        from: RequestStatus,
        to: RequestStatus,
        decided_at: NaiveDateTime,
    ) -> Result<Option<Request>, RepositoryError> {
        let row = sqlx::query_as::<_, RequestRow>(&format!(
            "UPDATE requests \
             SET approval_status = $3, decided_at = $4 \
             WHERE id = $1 AND approval_status = $2 \
             RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(decided_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Request::try_from).transpose()
    }

    async fn find_by_lender(&self, lender_id: Uuid) -> Result<Vec<Request>, RepositoryError> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM requests WHERE lender_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))
        .bind(lender_id)
        .fetch_all(&self.pool)
        .await?;

        into_requests(rows)
    }

    async fn find_by_borrower(&self, borrower_id: Uuid) -> Result<Vec<Request>, RepositoryError> {
        let rows = sqlx::query_as::<_, RequestRow>(&format!(
            "SELECT {} FROM requests WHERE borrower_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))
        .bind(borrower_id)
        .fetch_all(&self.pool)
        .await?;

        into_requests(rows)
    }
}
