use crate::error::{AppError, AppResult};
use crate::notifications::{MarketEvent, Notifier};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub timestamp: i64,
    pub event_type: String, // "listing_created", "request_decided", etc.
    pub subject_id: Uuid,
    pub recipient_id: Uuid,
    pub details: serde_json::Value,
}

impl AuditLogEntry {
    pub fn from_event(event: &MarketEvent) -> AppResult<Self> {
        Ok(Self {
            timestamp: chrono::Utc::now().timestamp(),
            event_type: event.event_type().to_string(),
            subject_id: event.subject_id(),
            recipient_id: event.recipient_id(),
            details: serde_json::to_value(event)?,
        })
    }
}

/// Append-only JSON-lines record of every committed market event
pub struct AuditTrailService {
    log_file: PathBuf,
    file_handle: Arc<Mutex<std::fs::File>>,
}

impl AuditTrailService {
    /// Create a new audit trail service
    pub fn new(log_directory: impl AsRef<Path>) -> AppResult<Self> {
        let log_directory = log_directory.as_ref();
        std::fs::create_dir_all(log_directory)
            .map_err(|e| AppError::Message(format!("Failed to create log directory: {}", e)))?;

        // One file per day
        let date = chrono::Utc::now().format("%Y-%m-%d");
        let log_file = log_directory.join(format!("audit_{}.log", date));

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .map_err(|e| AppError::Message(format!("Failed to open audit log file: {}", e)))?;

        info!("Audit trail initialized: {:?}", log_file);

        Ok(Self {
            log_file,
            file_handle: Arc::new(Mutex::new(file)),
        })
    }

    pub fn log_file(&self) -> &Path {
        &self.log_file
    }

    /// Log an audit entry
    pub async fn log(&self, entry: AuditLogEntry) -> AppResult<()> {
        let json = serde_json::to_string(&entry)?;

        let mut file = self.file_handle.lock().await;
        writeln!(file, "{}", json)
            .map_err(|e| AppError::Message(format!("Failed to write audit log: {}", e)))?;

        file.flush()
            .map_err(|e| AppError::Message(format!("Failed to flush audit log: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl Notifier for AuditTrailService {
    fn name(&self) -> &'static str {
        "audit"
    }

    async fn notify(&self, event: &MarketEvent) -> AppResult<()> {
        self.log(AuditLogEntry::from_event(event)?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_are_appended_as_json_lines() {
        let dir = std::env::temp_dir().join(format!("campus-market-audit-{}", Uuid::new_v4()));
        let audit = AuditTrailService::new(&dir).unwrap();

        let listing_id = Uuid::new_v4();
        let owner_id = Uuid::new_v4();
        audit
            .notify(&MarketEvent::ListingExpired { listing_id, owner_id })
            .await
            .unwrap();
        audit
            .notify(&MarketEvent::ListingExpired { listing_id, owner_id })
            .await
            .unwrap();

        let contents = std::fs::read_to_string(audit.log_file()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        let entry: AuditLogEntry = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(entry.event_type, "listing_expired");
        assert_eq!(entry.subject_id, listing_id);
        assert_eq!(entry.recipient_id, owner_id);

        let _ = std::fs::remove_dir_all(dir);
    }
}
