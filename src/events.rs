//! Audit Events
//!
//! Notifications published by the logging system. Subscribers receive them
//! through a broadcast channel; publishing never blocks and never fails when
//! nobody is listening.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedCategory {
    pub category: String,
    pub cutoff_date: DateTime<Utc>,
    pub retention_days: u32,
    /// Sealed blocks older than the cutoff
    pub eligible_blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEvent {
    #[serde(rename_all = "camelCase")]
    EntryLogged {
        category: String,
        entry_id: Uuid,
        hash: String,
    },
    #[serde(rename_all = "camelCase")]
    BlockSealed {
        category: String,
        block_number: u64,
        hash: String,
        entry_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    IntegrityChecked {
        category: String,
        valid: bool,
        blocks_checked: usize,
        errors: usize,
    },
    #[serde(rename_all = "camelCase")]
    ArchiveCompleted { categories: Vec<ArchivedCategory> },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AuditEvent>,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.tx.subscribe()
    }

    /// Publish an event to every current subscriber
    pub fn publish(&self, event: AuditEvent) {
        if self.tx.send(event).is_err() {
            trace!("No event subscribers");
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
