//! Audit Entry
//!
//! Defines the structure of a single audit event as accepted by the ledger.
//! Entries are immutable once accepted; their canonical JSON form is the
//! Merkle leaf inside the block that eventually seals them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::audit::hash::hash_value;
use crate::error::AuditResult;

pub const ENTRY_SCHEMA_VERSION: &str = "1.0";

/// Payload fields used as the acting principal, in lookup order
pub const ACTOR_FIELDS: &[&str] = &["userId", "adminId"];

/// Process and host information stamped on every entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryMetadata {
    pub hostname: String,
    pub process_id: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub category: String,
    pub version: String,
    pub payload: Map<String, Value>,
    pub metadata: EntryMetadata,
}

impl AuditEntry {
    /// Create a new entry from a caller payload
    ///
    /// A `metadata` object in the payload is moved into the entry metadata;
    /// it cannot override the host or process id.
    pub fn new(category: &str, mut payload: Map<String, Value>, hostname: &str) -> Self {
        let mut extra = match payload.remove("metadata") {
            Some(Value::Object(map)) => map,
            Some(other) => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
            None => Map::new(),
        };
        extra.remove("hostname");
        extra.remove("processId");

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            category: category.to_string(),
            version: ENTRY_SCHEMA_VERSION.to_string(),
            payload,
            metadata: EntryMetadata {
                hostname: hostname.to_string(),
                process_id: std::process::id(),
                extra,
            },
        }
    }

    /// SHA-256 over the entry's canonical JSON
    pub fn content_hash(&self) -> AuditResult<String> {
        hash_value(self)
    }

    /// String value of a payload field
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(Value::as_str)
    }

    /// Acting principal (`userId`, falling back to `adminId`)
    pub fn actor(&self) -> Option<&str> {
        ACTOR_FIELDS.iter().find_map(|field| self.field_str(field))
    }

    pub fn action(&self) -> Option<&str> {
        self.field_str("action")
    }

    pub fn resource(&self) -> Option<&str> {
        self.field_str("resource")
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "{}: {} ({})",
            self.category,
            self.id,
            self.actor().unwrap_or("system")
        )
    }
}
