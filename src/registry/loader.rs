//! Category catalog loader
//! Loads additional audit categories from a YAML catalog file

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use super::category::AuditCategory;
use crate::error::{AuditError, AuditResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CategoryCatalog {
    pub categories: Vec<AuditCategory>,
}

impl CategoryCatalog {
    /// Load a catalog from a YAML file
    pub fn load_from_file(path: &Path) -> AuditResult<Self> {
        info!("Loading audit category catalog from: {:?}", path);

        if !path.exists() {
            return Err(AuditError::ConfigError(format!(
                "Category catalog not found: {:?}",
                path
            )));
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            AuditError::ConfigError(format!("Failed to read {:?}: {}", path, e))
        })?;

        Self::from_yaml(&contents).map_err(|e| match e {
            AuditError::ConfigError(msg) => {
                AuditError::ConfigError(format!("Failed to parse {:?}: {}", path, msg))
            }
            other => other,
        })
    }

    pub fn from_yaml(contents: &str) -> AuditResult<Self> {
        let catalog: CategoryCatalog = serde_yaml::from_str(contents)
            .map_err(|e| AuditError::ConfigError(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Validate the loaded catalog
    pub fn validate(&self) -> AuditResult<()> {
        for category in &self.categories {
            validate_category(category)?;
        }
        Ok(())
    }
}

pub(crate) fn validate_category(category: &AuditCategory) -> AuditResult<()> {
    if category.id.trim().is_empty() {
        return Err(AuditError::ConfigError(
            "Category id cannot be empty".to_string(),
        ));
    }

    if category.name.trim().is_empty() {
        return Err(AuditError::ConfigError(format!(
            "Category {}: name cannot be empty",
            category.id
        )));
    }

    if category.id.contains(['/', '\\', '.']) {
        return Err(AuditError::ConfigError(format!(
            "Category {}: id must not contain path separators or dots",
            category.id
        )));
    }

    if category.fields.iter().any(|f| f.trim().is_empty()) {
        return Err(AuditError::ConfigError(format!(
            "Category {}: field names cannot be empty",
            category.id
        )));
    }

    Ok(())
}
