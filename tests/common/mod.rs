#![allow(dead_code)]

use audit_ledger::{AuditConfig, AuditLoggingSystem};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Plaintext configuration rooted in a temporary directory
pub fn test_config(dir: &TempDir) -> AuditConfig {
    AuditConfig {
        encryption_enabled: false,
        ..AuditConfig::with_storage_dir(dir.path())
    }
}

/// Encrypting configuration with a cheap key derivation
pub fn encrypted_config(dir: &TempDir) -> AuditConfig {
    AuditConfig {
        encryption_enabled: true,
        kdf_memory_kib: 64,
        kdf_iterations: 1,
        ..AuditConfig::with_storage_dir(dir.path())
    }
}

pub fn open_system(dir: &TempDir) -> AuditLoggingSystem {
    AuditLoggingSystem::open(test_config(dir)).expect("Failed to open audit system")
}

pub fn payload(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("payload must be an object")
}

pub fn system_event(n: usize) -> Map<String, Value> {
    payload(json!({
        "component": "scheduler",
        "event": format!("tick-{}", n),
        "severity": "info"
    }))
}

pub fn data_access(user: &str, action: &str, resource: &str) -> Map<String, Value> {
    payload(json!({
        "userId": user,
        "action": action,
        "resource": resource,
        "dataClassification": "confidential",
        "result": "success"
    }))
}

/// Catalog redefining `authentication` with three required fields
pub fn write_auth_catalog(dir: &Path) -> PathBuf {
    let path = dir.join("categories.yaml");
    std::fs::write(
        &path,
        r#"categories:
  - id: authentication
    name: Authentication
    fields: [userId, method, result]
    retentionDays: 365
    encryption: false
    compliance: [SOC2]
"#,
    )
    .expect("Failed to write catalog");
    path
}

pub fn block_file(dir: &TempDir, category: &str, block_number: u64) -> PathBuf {
    dir.path()
        .join(category)
        .join(format!("block_{:08}.json", block_number))
}
