//! Audit Reports
//!
//! Aggregate views over the registry, the search indices, the latest
//! integrity results and the running metrics.

pub mod export;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::audit::verify::IntegrityCheckResult;
use crate::registry::CategoryRegistry;
use crate::search::SearchIndices;

pub use export::{render_csv, AuditExport, EvidencePackage, ExportFormat};

pub const TOP_N: usize = 10;
pub const DEFAULT_REPORT_DAYS: i64 = 30;

/// Running counters for one system instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditMetrics {
    pub total_entries: u64,
    pub total_blocks: u64,
    pub bytes_stored: u64,
    pub integrity_checks: u64,
    pub violations: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReportPeriod {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The last `days` days up to now
    pub fn last_days(days: i64) -> Self {
        let end = Utc::now();
        Self {
            start: end - Duration::days(days),
            end,
        }
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp <= self.end
    }
}

impl Default for ReportPeriod {
    fn default() -> Self {
        Self::last_days(DEFAULT_REPORT_DAYS)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub name: String,
    /// Lifetime entries
    pub entry_count: u64,
    /// Entries timestamped within the report period
    pub period_count: u64,
    pub retention: String,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_entries: u64,
    pub total_blocks: u64,
    pub storage_used: String,
    pub categories: BTreeMap<String, CategorySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastCheck {
    pub category: String,
    pub date: DateTime<Utc>,
    pub valid: bool,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegritySection {
    pub checks: u64,
    pub violations: u64,
    pub last_check: Option<LastCheck>,
    pub latest: BTreeMap<String, IntegrityCheckResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCount {
    pub key: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub generated_at: DateTime<Utc>,
    pub period: ReportPeriod,
    pub summary: ReportSummary,
    /// Framework tag to category ids
    pub compliance: BTreeMap<String, Vec<String>>,
    pub integrity: IntegritySection,
    pub top_actors: Vec<RankedCount>,
    pub top_actions: Vec<RankedCount>,
}

/// Human-readable byte count, two decimals
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}

/// Highest counts first, ties broken by key
fn top_n(counts: HashMap<&str, usize>, n: usize) -> Vec<RankedCount> {
    let mut ranked: Vec<RankedCount> = counts
        .into_iter()
        .map(|(key, count)| RankedCount {
            key: key.to_string(),
            count,
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
    ranked.truncate(n);
    ranked
}

pub fn build_report(
    period: ReportPeriod,
    registry: &CategoryRegistry,
    indices: &SearchIndices,
    integrity: &HashMap<String, IntegrityCheckResult>,
    metrics: &AuditMetrics,
) -> AuditReport {
    let mut period_counts: HashMap<&str, u64> = HashMap::new();
    for entry in indices.entries().filter(|e| period.contains(e.timestamp)) {
        *period_counts.entry(entry.category.as_str()).or_default() += 1;
    }

    let mut categories = BTreeMap::new();
    let mut compliance: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for category in registry.iter() {
        categories.insert(
            category.id.clone(),
            CategorySummary {
                name: category.name.clone(),
                entry_count: category.entry_count,
                period_count: period_counts.get(category.id.as_str()).copied().unwrap_or(0),
                retention: format!("{} days", category.retention_days),
                encrypted: category.encryption,
            },
        );
        for framework in &category.compliance {
            compliance
                .entry(framework.clone())
                .or_default()
                .push(category.id.clone());
        }
    }

    let last_check = integrity
        .values()
        .max_by_key(|r| r.completed)
        .map(|r| LastCheck {
            category: r.category.clone(),
            date: r.completed,
            valid: r.valid,
            errors: r.errors.len(),
        });

    AuditReport {
        generated_at: Utc::now(),
        period,
        summary: ReportSummary {
            total_entries: metrics.total_entries,
            total_blocks: metrics.total_blocks,
            storage_used: format_bytes(metrics.bytes_stored),
            categories,
        },
        compliance,
        integrity: IntegritySection {
            checks: metrics.integrity_checks,
            violations: metrics.violations,
            last_check,
            latest: integrity.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        },
        top_actors: top_n(indices.actor_counts(), TOP_N),
        top_actions: top_n(indices.action_counts(), TOP_N),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::AuditEntry;
    use serde_json::json;

    fn entry(category: &str, value: serde_json::Value) -> AuditEntry {
        AuditEntry::new(category, value.as_object().cloned().unwrap(), "h")
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0.00 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_report_aggregates() {
        let mut registry = CategoryRegistry::with_defaults();
        registry.record_entries("data_access", 3);

        let mut indices = SearchIndices::new();
        indices.insert(entry("data_access", json!({"userId": "alice", "action": "read"})));
        indices.insert(entry("data_access", json!({"userId": "alice", "action": "read"})));
        indices.insert(entry("data_access", json!({"userId": "bob", "action": "write"})));

        let metrics = AuditMetrics {
            total_entries: 3,
            bytes_stored: 2048,
            ..Default::default()
        };

        let report = build_report(
            ReportPeriod::default(),
            &registry,
            &indices,
            &HashMap::new(),
            &metrics,
        );

        let data_access = &report.summary.categories["data_access"];
        assert_eq!(data_access.entry_count, 3);
        assert_eq!(data_access.period_count, 3);
        assert_eq!(report.summary.storage_used, "2.00 KB");
        assert_eq!(report.top_actors[0], RankedCount { key: "alice".to_string(), count: 2 });
        assert_eq!(report.top_actions[0].key, "read");
        assert!(report.compliance["GDPR"].contains(&"data_access".to_string()));
        assert!(report.integrity.last_check.is_none());
    }

    #[test]
    fn test_period_excludes_old_entries() {
        let registry = CategoryRegistry::with_defaults();
        let mut indices = SearchIndices::new();
        let mut old = entry("system", json!({"component": "x", "event": "y"}));
        old.timestamp = Utc::now() - Duration::days(90);
        indices.insert(old);

        let report = build_report(
            ReportPeriod::last_days(30),
            &registry,
            &indices,
            &HashMap::new(),
            &AuditMetrics::default(),
        );
        assert_eq!(report.summary.categories["system"].period_count, 0);
    }
}
