//! Shared error-notification side channel.
//!
//! Only failures that make a whole operation meaningless are published here:
//! prompt composition failures, mission start failures and event-stream
//! transport failures. Per-provider errors and malformed events stay local.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Which component raised a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeSource {
    Conversation,
    Mission,
    Ledger,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    pub id: Uuid,
    pub source: NoticeSource,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Cloneable publisher for error notices.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn notify(&self, source: NoticeSource, message: impl Into<String>) {
        let notice = Notice {
            id: Uuid::new_v4(),
            source,
            message: message.into(),
            at: Utc::now(),
        };
        tracing::warn!(source = ?notice.source, message = %notice.message, "Error notice");
        // No subscribers is fine: the notice is still logged.
        let _ = self.tx.send(notice);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
