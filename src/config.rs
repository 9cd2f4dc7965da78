use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{AuditError, AuditResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub storage_dir: PathBuf,
    /// Retention for categories registered without one
    pub retention_days: u32,
    pub encryption_enabled: bool,
    pub blockchain_enabled: bool,
    pub block_max_entries: usize,
    pub block_max_age_secs: u64,
    pub pow_max_attempts: u64,
    pub pow_target_prefix: String,
    pub integrity_check_interval_secs: u64,
    pub archive_interval_secs: u64,
    pub categories_file: Option<PathBuf>,
    pub key_passphrase: String,
    pub key_salt: String,
    pub kdf_memory_kib: u32,
    pub kdf_iterations: u32,
    pub host_id: String,
    pub certifier: String,
    pub event_buffer: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./audit-logs"),
            retention_days: 2555,
            encryption_enabled: true,
            blockchain_enabled: true,
            block_max_entries: 100,
            block_max_age_secs: 60,
            pow_max_attempts: 10_000,
            pow_target_prefix: "00".to_string(),
            integrity_check_interval_secs: 6 * 60 * 60,
            archive_interval_secs: 24 * 60 * 60,
            categories_file: None,
            key_passphrase: "audit-encryption-key".to_string(),
            key_salt: "audit-log-salt".to_string(),
            kdf_memory_kib: 19 * 1024,
            kdf_iterations: 2,
            host_id: default_host_id(),
            certifier: "Audit Ledger".to_string(),
            event_buffer: 1024,
        }
    }
}

fn default_host_id() -> String {
    env::var("HOSTNAME")
        .or_else(|_| env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

impl AuditConfig {
    /// Load configuration from an optional file, then `AUDIT_*` environment variables
    pub fn load(path: Option<&Path>) -> AuditResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            info!("Loading audit configuration from: {:?}", path);
            builder = builder.add_source(config::File::from(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("AUDIT").try_parsing(true),
        );

        let config: AuditConfig = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| AuditError::ConfigError(format!("Failed to load configuration: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at `storage_dir`, otherwise defaults
    pub fn with_storage_dir(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> AuditResult<()> {
        if self.block_max_entries == 0 {
            return Err(AuditError::ConfigError(
                "block_max_entries must be greater than zero".to_string(),
            ));
        }

        if self.block_max_age_secs == 0 {
            return Err(AuditError::ConfigError(
                "block_max_age_secs must be greater than zero".to_string(),
            ));
        }

        if self.pow_max_attempts == 0 {
            return Err(AuditError::ConfigError(
                "pow_max_attempts must be greater than zero".to_string(),
            ));
        }

        if self.pow_target_prefix.is_empty()
            || !self.pow_target_prefix.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(AuditError::ConfigError(format!(
                "pow_target_prefix ({:?}) must be a non-empty hex string",
                self.pow_target_prefix
            )));
        }

        if self.encryption_enabled && self.key_salt.len() < 8 {
            return Err(AuditError::ConfigError(format!(
                "key_salt must be at least 8 bytes (got {})",
                self.key_salt.len()
            )));
        }

        if self.integrity_check_interval_secs == 0 || self.archive_interval_secs == 0 {
            return Err(AuditError::ConfigError(
                "Sweep intervals must be greater than zero".to_string(),
            ));
        }

        if self.retention_days == 0 {
            return Err(AuditError::ConfigError(
                "retention_days must be greater than zero".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(AuditError::ConfigError(
                "event_buffer must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}
