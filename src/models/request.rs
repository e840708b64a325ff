use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lender decision state of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Declined,
}

impl RequestStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(RequestStatus::Pending),
            "approved" => Ok(RequestStatus::Approved),
            "declined" => Ok(RequestStatus::Declined),
            _ => Err(format!("Invalid request status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Declined => "declined",
        }
    }

    /// Counts against the one-live-request-per-item rule
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Pending | RequestStatus::Approved)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Declined)
    }
}

/// A borrower's request for an approved listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: Uuid,
    pub item_id: Uuid,
    pub borrower_id: Uuid,
    pub lender_id: Uuid,
    pub approval_status: RequestStatus,
    pub message: Option<String>,
    pub created_at: NaiveDateTime,
    pub decided_at: Option<NaiveDateTime>,
}

impl Request {
    /// Create a new pending Request
    pub fn new(item_id: Uuid, borrower_id: Uuid, lender_id: Uuid, message: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            borrower_id,
            lender_id,
            approval_status: RequestStatus::Pending,
            message,
            created_at: chrono::Utc::now().naive_utc(),
            decided_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.approval_status.is_active()
    }

    pub fn is_decided(&self) -> bool {
        self.approval_status.is_terminal()
    }
}
