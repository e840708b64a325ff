use crate::error::{AppError, AppResult};
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;
use uuid::Uuid;

const MAX_TITLE_LEN: usize = 120;
const MAX_DESCRIPTION_LEN: usize = 2000;
const MAX_TAGS: usize = 10;
const MAX_TAG_LEN: usize = 32;
/// Matches the `NUMERIC(14, 2)` column the MRP is stored in
const MRP_MAX_SCALE: u32 = 2;
const MRP_UPPER_BOUND: i64 = 1_000_000_000_000;

/// Kind of advertised item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingKind {
    Book,
    Stationary,
    Flat,
    Restaurant,
    Event,
}

impl ListingKind {
    pub const ALL: [ListingKind; 5] = [
        ListingKind::Book,
        ListingKind::Stationary,
        ListingKind::Flat,
        ListingKind::Restaurant,
        ListingKind::Event,
    ];

    /// Convert from database or payload string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.trim().to_lowercase().as_str() {
            "book" | "books" => Ok(ListingKind::Book),
            "stationary" | "stationery" => Ok(ListingKind::Stationary),
            "flat" | "flats" => Ok(ListingKind::Flat),
            "restaurant" | "restaurants" => Ok(ListingKind::Restaurant),
            "event" | "events" => Ok(ListingKind::Event),
            _ => Err(format!("Invalid listing kind: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingKind::Book => "book",
            ListingKind::Stationary => "stationary",
            ListingKind::Flat => "flat",
            ListingKind::Restaurant => "restaurant",
            ListingKind::Event => "event",
        }
    }

    /// Books and stationery are priced off their MRP; everything else pays the monthly fee
    pub fn is_mrp_priced(&self) -> bool {
        matches!(self, ListingKind::Book | ListingKind::Stationary)
    }

    /// Detail fields a payload of this kind must carry
    pub fn required_details(&self) -> &'static [&'static str] {
        match self {
            ListingKind::Book => &["author"],
            ListingKind::Stationary => &[],
            ListingKind::Flat | ListingKind::Restaurant => &["location"],
            ListingKind::Event => &["venue", "event_date"],
        }
    }
}

/// Listing lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Expired,
}

impl ListingStatus {
    /// Convert from database string
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(ListingStatus::Draft),
            "pending" => Ok(ListingStatus::Pending),
            "approved" => Ok(ListingStatus::Approved),
            "rejected" => Ok(ListingStatus::Rejected),
            "expired" => Ok(ListingStatus::Expired),
            _ => Err(format!("Invalid listing status: {}", s)),
        }
    }

    /// Convert to database string
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "draft",
            ListingStatus::Pending => "pending",
            ListingStatus::Approved => "approved",
            ListingStatus::Rejected => "rejected",
            ListingStatus::Expired => "expired",
        }
    }

    /// The transition graph. Nothing ever moves backwards.
    pub fn can_transition_to(&self, next: ListingStatus) -> bool {
        matches!(
            (self, next),
            (ListingStatus::Draft, ListingStatus::Pending)
                | (ListingStatus::Pending, ListingStatus::Approved)
                | (ListingStatus::Pending, ListingStatus::Rejected)
                | (ListingStatus::Approved, ListingStatus::Expired)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ListingStatus::Rejected | ListingStatus::Expired)
    }
}

impl std::fmt::Display for ListingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moderator verdict on a pending listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected,
}

impl Verdict {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "approved" | "approve" => Ok(Verdict::Approved),
            "rejected" | "reject" => Ok(Verdict::Rejected),
            _ => Err(format!("Invalid decision: {}", s)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Approved => "approved",
            Verdict::Rejected => "rejected",
        }
    }

    pub fn target_status(&self) -> ListingStatus {
        match self {
            Verdict::Approved => ListingStatus::Approved,
            Verdict::Rejected => ListingStatus::Rejected,
        }
    }
}

/// The single moderation decision recorded for a listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalDecision {
    pub listing_id: Uuid,
    pub moderator_id: Uuid,
    pub decision: Verdict,
    pub reason: Option<String>,
    pub decided_at: NaiveDateTime,
}

/// MRP as supplied by the seller, before pricing
#[derive(Debug, Clone, PartialEq)]
pub enum Mrp {
    Amount(Decimal),
    Missing,
    Invalid(String),
}

impl Mrp {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Mrp::Missing;
        }
        match Decimal::from_str(trimmed) {
            Ok(value) => Mrp::Amount(value),
            Err(_) => Mrp::Invalid(trimmed.to_string()),
        }
    }

    /// Payload MRPs arrive as JSON numbers or strings
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Mrp::Missing,
            Some(Value::Number(n)) => Mrp::parse(&n.to_string()),
            Some(Value::String(s)) => Mrp::parse(s),
            Some(other) => Mrp::Invalid(other.to_string()),
        }
    }

    /// A usable, strictly positive amount
    pub fn positive_amount(&self) -> Option<Decimal> {
        match self {
            Mrp::Amount(value) if *value > Decimal::ZERO => Some(*value),
            _ => None,
        }
    }
}

/// Seller submission as received from the transport layer
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListingPayload {
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mrp: Option<Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// A submission that passed boundary validation
#[derive(Debug, Clone)]
pub struct NewListing {
    pub kind: ListingKind,
    pub title: String,
    pub description: Option<String>,
    pub details: Value,
    pub mrp: Mrp,
    pub image_url: Option<String>,
    pub tags: Vec<String>,
}

impl ListingPayload {
    /// Check the payload once, before any domain logic runs
    pub fn validate(self) -> AppResult<NewListing> {
        let kind = ListingKind::from_str(&self.kind).map_err(AppError::Validation)?;

        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::Validation("Title is required".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "Title must be at most {} characters",
                MAX_TITLE_LEN
            )));
        }

        let description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());
        if let Some(d) = &description {
            if d.chars().count() > MAX_DESCRIPTION_LEN {
                return Err(AppError::Validation(format!(
                    "Description must be at most {} characters",
                    MAX_DESCRIPTION_LEN
                )));
            }
        }

        let mut details = Map::new();
        for field in kind.required_details() {
            let value = self
                .details
                .get(*field)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    AppError::Validation(format!("{} listings require '{}'", kind.as_str(), field))
                })?;
            details.insert((*field).to_string(), Value::String(value.to_string()));
        }
        if let Some(date) = details.get("event_date").and_then(Value::as_str) {
            NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| {
                AppError::Validation(format!("event_date must be YYYY-MM-DD, got '{}'", date))
            })?;
        }
        // Optional extras are kept verbatim
        for (key, value) in self.details {
            details.entry(key).or_insert(value);
        }

        let image_url = self
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if let Some(url) = &image_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(AppError::Validation("Image URL must be http(s)".into()));
            }
        }

        let tags: BTreeSet<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.len() > MAX_TAGS {
            return Err(AppError::Validation(format!("At most {} tags allowed", MAX_TAGS)));
        }
        if let Some(tag) = tags.iter().find(|t| t.chars().count() > MAX_TAG_LEN) {
            return Err(AppError::Validation(format!("Tag too long: {}", tag)));
        }

        let mrp = Mrp::from_json(self.mrp.as_ref());
        if let Some(value) = mrp.positive_amount() {
            if value >= Decimal::from(MRP_UPPER_BOUND) {
                return Err(AppError::Validation(format!(
                    "MRP must be below {}",
                    MRP_UPPER_BOUND
                )));
            }
            if value.normalize().scale() > MRP_MAX_SCALE {
                return Err(AppError::Validation(format!(
                    "MRP allows at most {} decimal places",
                    MRP_MAX_SCALE
                )));
            }
        }

        Ok(NewListing {
            kind,
            title,
            description,
            details: Value::Object(details),
            mrp,
            image_url,
            tags: tags.into_iter().collect(),
        })
    }
}

/// Listing model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listing {
    pub id: Uuid,
    pub kind: ListingKind,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub details: Value,
    pub mrp: Option<Decimal>,
    pub image_url: Option<String>,
    /// Advertising fee charged at creation; never changes afterwards
    pub cost: i64,
    pub status: ListingStatus,
    pub tags: Vec<String>,
    pub created_at: NaiveDateTime,
    pub decided_at: Option<NaiveDateTime>,
    pub expires_at: Option<NaiveDateTime>,
}

impl Listing {
    /// Build an unsaved draft with its cost stamped
    pub fn draft(id: Uuid, owner_id: Uuid, new: NewListing, cost: i64, now: NaiveDateTime) -> Self {
        Self {
            id,
            kind: new.kind,
            owner_id,
            title: new.title,
            description: new.description,
            details: new.details,
            mrp: new.mrp.positive_amount(),
            image_url: new.image_url,
            cost,
            status: ListingStatus::Draft,
            tags: new.tags,
            created_at: now,
            decided_at: None,
            expires_at: None,
        }
    }

    /// Move along the transition graph or fail with `InvalidTransition`
    pub fn transition(&mut self, next: ListingStatus) -> AppResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(AppError::listing_transition(self.status, next));
        }
        self.status = next;
        Ok(())
    }

    /// Apply a moderator verdict; approval starts the listing's lifetime
    pub fn apply_verdict(
        &mut self,
        verdict: Verdict,
        decided_at: NaiveDateTime,
        ttl: chrono::Duration,
    ) -> AppResult<()> {
        self.transition(verdict.target_status())?;
        self.decided_at = Some(decided_at);
        if verdict == Verdict::Approved {
            self.expires_at = Some(decided_at + ttl);
        }
        Ok(())
    }

    /// Approved listings can be requested by explorers
    pub fn is_available(&self) -> bool {
        self.status == ListingStatus::Approved
    }

    pub fn is_due_for_expiry(&self, now: NaiveDateTime) -> bool {
        self.status == ListingStatus::Approved && self.expires_at.map_or(false, |at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn book_payload() -> ListingPayload {
        ListingPayload {
            kind: "Book".into(),
            title: "  Linear Algebra Done Right ".into(),
            mrp: Some(json!(150)),
            tags: vec!["Maths".into(), "maths".into(), " ".into()],
            details: json!({ "author": "Axler" }).as_object().cloned().unwrap_or_default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_transition_graph() {
        use ListingStatus::*;
        let all = [Draft, Pending, Approved, Rejected, Expired];
        let allowed = [(Draft, Pending), (Pending, Approved), (Pending, Rejected), (Approved, Expired)];

        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    allowed.contains(&(from, to)),
                    "{} -> {}",
                    from,
                    to
                );
            }
        }
    }

    #[test]
    fn test_payload_validation_normalizes() {
        let new = book_payload().validate().unwrap();
        assert_eq!(new.kind, ListingKind::Book);
        assert_eq!(new.title, "Linear Algebra Done Right");
        assert_eq!(new.tags, vec!["maths".to_string()]);
        assert_eq!(new.mrp, Mrp::Amount(Decimal::new(150, 0)));
    }

    #[test]
    fn test_payload_validation_rejects_malformed() {
        let mut payload = book_payload();
        payload.details.clear();
        assert!(matches!(payload.validate(), Err(AppError::Validation(_))));

        let mut payload = book_payload();
        payload.kind = "spaceship".into();
        assert!(matches!(payload.validate(), Err(AppError::Validation(_))));

        let mut payload = book_payload();
        payload.title = "   ".into();
        assert!(matches!(payload.validate(), Err(AppError::Validation(_))));

        let payload = ListingPayload {
            kind: "event".into(),
            title: "Spring fest".into(),
            details: json!({ "venue": "Main lawn", "event_date": "next friday" })
                .as_object()
                .cloned()
                .unwrap_or_default(),
            ..Default::default()
        };
        assert!(matches!(payload.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_payload_validation_bounds_mrp() {
        let with_mrp = |mrp: Value| ListingPayload { mrp: Some(mrp), ..book_payload() };

        assert!(matches!(
            with_mrp(json!("1000000000000")).validate(),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(with_mrp(json!("19.999")).validate(), Err(AppError::Validation(_))));

        let new = with_mrp(json!("999999999999.99")).validate().unwrap();
        assert_eq!(new.mrp, Mrp::Amount(Decimal::new(99999999999999, 2)));
        // trailing zeros do not count towards the scale
        assert!(with_mrp(json!("19.5000")).validate().is_ok());
        // non-positive and unparseable MRPs are priced at the fixed fee, not rejected
        assert!(with_mrp(json!("-5000000000000")).validate().is_ok());
        assert!(with_mrp(json!("cheap")).validate().is_ok());
    }

    #[test]
    fn test_mrp_parsing() {
        assert_eq!(Mrp::from_json(None), Mrp::Missing);
        assert_eq!(Mrp::from_json(Some(&json!("  "))), Mrp::Missing);
        assert_eq!(Mrp::from_json(Some(&json!("299.5"))), Mrp::Amount(Decimal::new(2995, 1)));
        assert!(matches!(Mrp::from_json(Some(&json!("cheap"))), Mrp::Invalid(_)));
        assert!(matches!(Mrp::from_json(Some(&json!([1]))), Mrp::Invalid(_)));
        assert_eq!(Mrp::Amount(Decimal::ZERO).positive_amount(), None);
    }

    #[test]
    fn test_draft_moves_forward_only() {
        let now = chrono::Utc::now().naive_utc();
        let new = book_payload().validate().unwrap();
        let mut listing = Listing::draft(Uuid::new_v4(), Uuid::new_v4(), new, 20, now);

        assert!(listing.transition(ListingStatus::Approved).is_err());
        listing.transition(ListingStatus::Pending).unwrap();
        listing
            .apply_verdict(Verdict::Approved, now, chrono::Duration::days(30))
            .unwrap();
        assert_eq!(listing.expires_at, Some(now + chrono::Duration::days(30)));
        assert!(listing.is_available());
        assert!(listing.transition(ListingStatus::Pending).is_err());
        assert!(listing.is_due_for_expiry(now + chrono::Duration::days(31)));
    }
}
