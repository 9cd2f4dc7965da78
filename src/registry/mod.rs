//! Category Registry
//!
//! Catalog of audit categories known to the system. Categories are registered
//! at startup (built-in defaults plus an optional YAML catalog) or at admin
//! time, and are immutable afterwards apart from their entry counters.

pub mod category;
pub mod loader;

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{AuditError, AuditResult};

pub use category::{default_categories, AuditCategory};
pub use loader::CategoryCatalog;

#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
    categories: BTreeMap<String, AuditCategory>,
}

impl CategoryRegistry {
    /// Registry with no categories
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in categories
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for category in default_categories() {
            registry.categories.insert(category.id.clone(), category);
        }
        registry
    }

    /// Merge categories from a YAML catalog, replacing same-id entries
    ///
    /// Categories without a retention period get `default_retention_days`.
    pub fn load_catalog(&mut self, path: &Path, default_retention_days: u32) -> AuditResult<usize> {
        let catalog = CategoryCatalog::load_from_file(path)?;
        let count = catalog.categories.len();
        for category in catalog.categories {
            let category = category.with_default_retention(default_retention_days);
            self.categories.insert(category.id.clone(), category);
        }
        info!("Registered {} categories from catalog", count);
        Ok(count)
    }

    /// Register a category at admin time
    pub fn add_category(&mut self, category: AuditCategory) -> AuditResult<()> {
        loader::validate_category(&category)?;
        if self.categories.contains_key(&category.id) {
            return Err(AuditError::ConfigError(format!(
                "Category already registered: {}",
                category.id
            )));
        }
        debug!("Registered audit category {}", category.id);
        self.categories.insert(category.id.clone(), category);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&AuditCategory> {
        self.categories.get(id)
    }

    /// Look up a category or fail with `UnknownCategory`
    pub fn require(&self, id: &str) -> AuditResult<&AuditCategory> {
        self.get(id)
            .ok_or_else(|| AuditError::UnknownCategory(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.categories.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuditCategory> {
        self.categories.values()
    }

    pub fn ids(&self) -> Vec<String> {
        self.categories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub(crate) fn record_entries(&mut self, id: &str, count: u64) {
        if let Some(category) = self.categories.get_mut(id) {
            category.entry_count += count;
        }
    }
}
