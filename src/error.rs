use crate::database::DatabaseError;
use crate::models::{LedgerRejection, ListingStatus, RequestStatus};
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Application-level error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database errors
    #[error("SQL error: {0}")]
    Sqlx(#[from] SqlxError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// The wallet cannot cover the requested debit
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// An active request already exists for this borrower and item
    #[error("Duplicate request for item {item_id}")]
    DuplicateRequest { item_id: uuid::Uuid },

    /// Transition outside the allowed graph, or a stale read lost a race
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    /// Lost a race to decide something that was already decided
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller lacks the required role or ownership
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Target listing cannot currently be requested
    #[error("Not available: {0}")]
    NotAvailable(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Message(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn listing_transition(from: ListingStatus, to: ListingStatus) -> Self {
        AppError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    pub fn request_transition(from: RequestStatus, to: RequestStatus) -> Self {
        AppError::InvalidTransition {
            from: from.as_str().to_string(),
            to: to.as_str().to_string(),
        }
    }

    /// Check if error is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AppError::NotFound(_))
    }

    /// Race outcomes the user did not cause
    pub fn is_stale_state(&self) -> bool {
        matches!(self, AppError::InvalidTransition { .. } | AppError::Conflict(_))
    }

    /// Get HTTP status code for the error
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Validation(_) => 400,
            AppError::InsufficientFunds { .. } => 402,
            AppError::Unauthorized(_) => 403,
            AppError::NotFound(_) => 404,
            AppError::DuplicateRequest { .. }
            | AppError::InvalidTransition { .. }
            | AppError::Conflict(_)
            | AppError::NotAvailable(_) => 409,
            AppError::Config(_) => 500,
            AppError::Database(_) | AppError::Sqlx(_) => 500,
            _ => 500,
        }
    }

    /// Message safe to show to the end user
    pub fn user_message(&self) -> String {
        match self {
            AppError::Validation(msg) => msg.clone(),
            AppError::InsufficientFunds { .. } => "insufficient wallet balance".to_string(),
            AppError::DuplicateRequest { .. } => {
                "you have already requested this item".to_string()
            }
            AppError::InvalidTransition { .. } | AppError::Conflict(_) => {
                "state changed, please refresh".to_string()
            }
            AppError::Unauthorized(_) => "you are not allowed to do that".to_string(),
            AppError::NotFound(_) => "not found".to_string(),
            AppError::NotAvailable(_) => "this listing is not available".to_string(),
            _ => "something went wrong, please try again".to_string(),
        }
    }
}

/// Repository-specific error types
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database query error
    #[error("Query error: {0}")]
    Query(SqlxError),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate record
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    /// Constraint violation
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Debit larger than the current balance
    #[error("Insufficient funds: available {available}, required {required}")]
    InsufficientFunds { available: i64, required: i64 },

    /// Compare-and-set found the row in a different state than expected
    #[error("Stale state: {0}")]
    StaleState(String),

    /// Stored value could not be mapped back into a domain type
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl RepositoryError {
    /// Ledger entry of `required` refused against `available`
    pub fn ledger_rejected(rejection: LedgerRejection, available: i64, required: i64) -> Self {
        match rejection {
            LedgerRejection::InsufficientFunds { .. } => {
                RepositoryError::InsufficientFunds { available, required }
            }
            LedgerRejection::Overflow => {
                RepositoryError::ConstraintViolation("balance overflow".to_string())
            }
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound(msg) => AppError::NotFound(msg),
            RepositoryError::Query(e) => AppError::Sqlx(e),
            RepositoryError::Duplicate(msg) => AppError::Conflict(format!("Duplicate: {}", msg)),
            RepositoryError::ConstraintViolation(msg) => AppError::Validation(msg),
            RepositoryError::InsufficientFunds { available, required } => {
                AppError::InsufficientFunds { available, required }
            }
            RepositoryError::StaleState(msg) => AppError::Conflict(msg),
            RepositoryError::Corrupt(msg) => AppError::Message(msg),
        }
    }
}

impl From<SqlxError> for RepositoryError {
    fn from(err: SqlxError) -> Self {
        match &err {
            SqlxError::RowNotFound => RepositoryError::NotFound("Record not found".to_string()),
            SqlxError::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                match code.as_deref() {
                    // unique_violation
                    Some("23505") => RepositoryError::Duplicate(db_err.message().to_string()),
                    // foreign_key_violation, check_violation
                    Some("23503") | Some("23514") => {
                        RepositoryError::ConstraintViolation(db_err.message().to_string())
                    }
                    _ => RepositoryError::Query(err),
                }
            }
            _ => RepositoryError::Query(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_business_errors_surface_their_reason() {
        let err = AppError::InsufficientFunds { available: 10, required: 20 };
        assert_eq!(err.user_message(), "insufficient wallet balance");
        assert_eq!(err.status_code(), 402);
    }

    #[test]
    fn test_races_surface_as_refresh() {
        let err = AppError::listing_transition(ListingStatus::Approved, ListingStatus::Rejected);
        assert!(err.is_stale_state());
        assert_eq!(err.user_message(), "state changed, please refresh");

        let err = AppError::Conflict("already decided".into());
        assert_eq!(err.user_message(), "state changed, please refresh");
        assert_eq!(err.status_code(), 409);
    }

    #[test]
    fn test_repository_error_mapping() {
        let err: AppError = RepositoryError::InsufficientFunds { available: 5, required: 7 }.into();
        assert!(matches!(err, AppError::InsufficientFunds { available: 5, required: 7 }));

        let err: AppError = RepositoryError::NotFound("listing".into()).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_ledger_overflow_is_a_validation_error() {
        let err: AppError =
            RepositoryError::ledger_rejected(LedgerRejection::Overflow, i64::MAX, 1).into();
        assert!(matches!(err, AppError::Validation(ref msg) if msg == "balance overflow"));
        assert_eq!(err.status_code(), 400);

        let err = RepositoryError::ledger_rejected(
            LedgerRejection::InsufficientFunds { shortfall: 3 },
            4,
            7,
        );
        assert!(matches!(err, RepositoryError::InsufficientFunds { available: 4, required: 7 }));
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err: RepositoryError = SqlxError::RowNotFound.into();
        assert!(matches!(err, RepositoryError::NotFound(_)));
    }
}
