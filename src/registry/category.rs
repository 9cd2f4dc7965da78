//! Audit Categories
//!
//! Each category describes one stream of audit events: the payload fields it
//! requires, how long it is retained, whether its sealed blocks are encrypted,
//! and which compliance frameworks it evidences.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered audit category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditCategory {
    pub id: String,
    pub name: String,
    pub fields: Vec<String>,
    /// Zero, or omitted in a catalog, takes the configured default
    #[serde(default)]
    pub retention_days: u32,
    pub encryption: bool,
    pub compliance: Vec<String>,
    #[serde(default = "Utc::now")]
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub entry_count: u64,
}

impl AuditCategory {
    pub fn new(
        id: &str,
        name: &str,
        fields: &[&str],
        retention_days: u32,
        encryption: bool,
        compliance: &[&str],
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            retention_days,
            encryption,
            compliance: compliance.iter().map(|c| c.to_string()).collect(),
            created: Utc::now(),
            entry_count: 0,
        }
    }

    /// Fill in the default retention if none was given
    pub fn with_default_retention(mut self, retention_days: u32) -> Self {
        if self.retention_days == 0 {
            self.retention_days = retention_days;
        }
        self
    }
}

/// The categories every deployment starts with
pub fn default_categories() -> Vec<AuditCategory> {
    vec![
        AuditCategory::new(
            "authentication",
            "Authentication",
            &["userId", "method", "result", "ipAddress", "userAgent"],
            365 * 7,
            true,
            &["SOC2", "GDPR", "ISO27001"],
        ),
        AuditCategory::new(
            "data_access",
            "Data Access",
            &["userId", "resource", "action", "dataClassification", "result"],
            365 * 7,
            true,
            &["SOC2", "GDPR", "HIPAA"],
        ),
        AuditCategory::new(
            "configuration",
            "Configuration Changes",
            &["userId", "component", "change", "previousValue", "newValue"],
            365 * 7,
            true,
            &["SOC2", "ISO27001"],
        ),
        AuditCategory::new(
            "security",
            "Security Events",
            &["eventType", "severity", "source", "target", "outcome"],
            365 * 7,
            true,
            &["SOC2", "ISO27001"],
        ),
        AuditCategory::new(
            "compliance",
            "Compliance Events",
            &["framework", "requirement", "action", "evidence", "approver"],
            365 * 10,
            true,
            &["All"],
        ),
        AuditCategory::new(
            "system",
            "System Events",
            &["component", "event", "severity", "details"],
            365 * 3,
            false,
            &["SOC2"],
        ),
        AuditCategory::new(
            "api",
            "API Calls",
            &["endpoint", "method", "userId", "responseCode", "duration"],
            365 * 2,
            false,
            &["SOC2"],
        ),
        AuditCategory::new(
            "admin",
            "Administrative Actions",
            &["adminId", "action", "target", "reason", "approval"],
            365 * 7,
            true,
            &["SOC2", "ISO27001"],
        ),
    ]
}
