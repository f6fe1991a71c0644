//! Notification scheduler backed by an append-only journal.
//!
//! Schedules and cancellations are stored as newline-delimited JSON. The
//! set of pending notifications is derived by replaying the journal, so a
//! delivery agent (or a debugging session) can inspect it at any time.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;
use uuid::Uuid;

use super::{Notifier, NotifyError};

/// What a local notification shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,

    /// Platform icon name, without extension
    pub small_icon: String,
}

/// A single line in the journal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    /// When this record was written
    pub timestamp: DateTime<Utc>,

    pub notification_id: String,

    #[serde(flatten)]
    pub action: NotificationAction,
}

/// Journal record types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum NotificationAction {
    Scheduled {
        deliver_at: DateTime<Utc>,
        content: NotificationContent,
    },
    Cancelled,
}

/// A notification that was scheduled and not cancelled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingNotification {
    pub id: String,
    pub deliver_at: DateTime<Utc>,
    pub content: NotificationContent,
}

/// JSONL-journal notifier
pub struct JournalNotifier {
    journal_path: PathBuf,
}

impl JournalNotifier {
    pub fn new(journal_path: impl Into<PathBuf>) -> Self {
        Self {
            journal_path: journal_path.into(),
        }
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    async fn append(&self, record: &NotificationRecord) -> Result<(), NotifyError> {
        if let Some(parent) = self.journal_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.journal_path)
            .await?;

        let json = serde_json::to_string(record)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Replay all records in order
    pub async fn replay(&self) -> Result<Vec<NotificationRecord>, NotifyError> {
        if !self.journal_path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.journal_path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut records = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            records.push(serde_json::from_str(&line)?);
        }

        Ok(records)
    }

    /// Notifications scheduled and not yet cancelled, in schedule order
    pub async fn pending(&self) -> Result<Vec<PendingNotification>, NotifyError> {
        let mut pending: Vec<PendingNotification> = Vec::new();

        for record in self.replay().await? {
            match record.action {
                NotificationAction::Scheduled {
                    deliver_at,
                    content,
                } => pending.push(PendingNotification {
                    id: record.notification_id,
                    deliver_at,
                    content,
                }),
                NotificationAction::Cancelled => {
                    pending.retain(|p| p.id != record.notification_id);
                }
            }
        }

        Ok(pending)
    }
}

#[async_trait]
impl Notifier for JournalNotifier {
    fn is_initialized(&self) -> bool {
        true
    }

    async fn schedule(
        &self,
        deliver_at: DateTime<Utc>,
        content: NotificationContent,
    ) -> Result<String, NotifyError> {
        let notification_id = Uuid::new_v4().to_string();
        let record = NotificationRecord {
            timestamp: Utc::now(),
            notification_id: notification_id.clone(),
            action: NotificationAction::Scheduled {
                deliver_at,
                content,
            },
        };
        self.append(&record).await?;

        info!(%notification_id, %deliver_at, "Local notification scheduled");
        Ok(notification_id)
    }

    async fn cancel(&self, notification_id: &str) -> Result<(), NotifyError> {
        let record = NotificationRecord {
            timestamp: Utc::now(),
            notification_id: notification_id.to_string(),
            action: NotificationAction::Cancelled,
        };
        self.append(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn content() -> NotificationContent {
        NotificationContent {
            title: "New chapter".to_string(),
            body: "Chapter 3 is out".to_string(),
            small_icon: "ic_stat_push_icon".to_string(),
        }
    }

    #[tokio::test]
    async fn test_schedule_and_cancel_replay() {
        let temp = TempDir::new().unwrap();
        let notifier = JournalNotifier::new(temp.path().join("notifications.jsonl"));
        let at = Utc.with_ymd_and_hms(2026, 12, 1, 18, 0, 0).unwrap();

        let first = notifier.schedule(at, content()).await.unwrap();
        let second = notifier.schedule(at, content()).await.unwrap();
        assert_ne!(first, second);

        notifier.cancel(&first).await.unwrap();

        let pending = notifier.pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
        assert_eq!(pending[0].deliver_at, at);
        assert_eq!(notifier.replay().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_missing_journal_is_empty() {
        let temp = TempDir::new().unwrap();
        let notifier = JournalNotifier::new(temp.path().join("none.jsonl"));
        assert!(notifier.pending().await.unwrap().is_empty());
    }
}
