//! Audit Log Export
//!
//! Renders matched entries as JSON, CSV, or an evidence package carrying an
//! integrity proof over exactly the exported subset.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use uuid::Uuid;

use crate::audit::entry::AuditEntry;
use crate::audit::hash::hash_value;
use crate::audit::merkle::merkle_root;
use crate::error::{AuditError, AuditResult};

const SIGNATURE_PREFIX: &str = "SIG:";
const CSV_HEADERS: &[&str] = &["id", "timestamp", "category", "version", "payload", "metadata"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Evidence,
}

impl FromStr for ExportFormat {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "evidence" => Ok(Self::Evidence),
            _ => Err(AuditError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceIntegrity {
    pub log_count: usize,
    pub hash: String,
    pub merkle_root: Option<String>,
}

/// Hash-based attestation; not a digital signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certification {
    pub certifier: String,
    pub timestamp: DateTime<Utc>,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidencePackage {
    pub package_id: Uuid,
    pub generated: DateTime<Utc>,
    pub logs: Vec<AuditEntry>,
    pub integrity: EvidenceIntegrity,
    pub certification: Certification,
}

fn integrity_for(logs: &[AuditEntry]) -> AuditResult<EvidenceIntegrity> {
    Ok(EvidenceIntegrity {
        log_count: logs.len(),
        hash: hash_value(logs)?,
        merkle_root: merkle_root(logs)?,
    })
}

fn sign(integrity: &EvidenceIntegrity) -> AuditResult<String> {
    Ok(format!("{}{}", SIGNATURE_PREFIX, hash_value(integrity)?))
}

impl EvidencePackage {
    pub fn new(logs: Vec<AuditEntry>, certifier: &str) -> AuditResult<Self> {
        let integrity = integrity_for(&logs)?;
        let signature = sign(&integrity)?;
        let now = Utc::now();

        Ok(Self {
            package_id: Uuid::new_v4(),
            generated: now,
            logs,
            integrity,
            certification: Certification {
                certifier: certifier.to_string(),
                timestamp: now,
                signature,
            },
        })
    }

    /// Recompute the integrity block and signature over the bundled entries
    pub fn verify(&self) -> AuditResult<bool> {
        let integrity = integrity_for(&self.logs)?;
        Ok(integrity == self.integrity && sign(&integrity)? == self.certification.signature)
    }
}

/// Rendered export
#[derive(Debug, Clone)]
pub enum AuditExport {
    Json(String),
    Csv(String),
    Evidence(EvidencePackage),
}

impl AuditExport {
    pub fn build(entries: Vec<AuditEntry>, format: ExportFormat, certifier: &str) -> AuditResult<Self> {
        match format {
            ExportFormat::Json => Ok(Self::Json(serde_json::to_string_pretty(&entries)?)),
            ExportFormat::Csv => Ok(Self::Csv(render_csv(&entries)?)),
            ExportFormat::Evidence => Ok(Self::Evidence(EvidencePackage::new(entries, certifier)?)),
        }
    }

    pub fn format(&self) -> ExportFormat {
        match self {
            Self::Json(_) => ExportFormat::Json,
            Self::Csv(_) => ExportFormat::Csv,
            Self::Evidence(_) => ExportFormat::Evidence,
        }
    }

    /// Export as text; evidence packages are rendered as pretty JSON
    pub fn render(&self) -> AuditResult<String> {
        match self {
            Self::Json(text) | Self::Csv(text) => Ok(text.clone()),
            Self::Evidence(package) => Ok(serde_json::to_string_pretty(package)?),
        }
    }
}

fn csv_field(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    if text.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

/// One header row plus one row per entry; nested values are JSON-encoded
pub fn render_csv(entries: &[AuditEntry]) -> AuditResult<String> {
    if entries.is_empty() {
        return Ok(String::new());
    }

    let mut lines = vec![CSV_HEADERS.join(",")];
    for entry in entries {
        let value = serde_json::to_value(entry)?;
        let row: Vec<String> = CSV_HEADERS
            .iter()
            .map(|header| csv_field(value.get(*header).unwrap_or(&Value::Null)))
            .collect();
        lines.push(row.join(","));
    }

    Ok(lines.join("\n"))
}
