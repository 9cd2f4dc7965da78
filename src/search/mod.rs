//! Search Indices
//!
//! In-memory indices over accepted entries, keyed by actor, action and
//! resource. Indices are updated when an entry is accepted, before its block
//! seals, and rebuilt from storage on restart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::audit::entry::AuditEntry;

pub const DEFAULT_SEARCH_LIMIT: usize = 100;

fn default_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

/// Search filters; unset fields do not constrain the result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for SearchCriteria {
    fn default() -> Self {
        Self {
            actor: None,
            action: None,
            resource: None,
            category: None,
            start_date: None,
            end_date: None,
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl SearchCriteria {
    pub fn actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn in_range(&self, entry: &AuditEntry) -> bool {
        self.start_date.map_or(true, |start| entry.timestamp >= start)
            && self.end_date.map_or(true, |end| entry.timestamp <= end)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResults {
    pub results: Vec<AuditEntry>,
    /// Matches before the limit was applied
    pub count: usize,
    pub search_time_ms: u64,
}

#[derive(Debug, Default)]
pub struct SearchIndices {
    by_actor: HashMap<String, Vec<Arc<AuditEntry>>>,
    by_action: HashMap<String, Vec<Arc<AuditEntry>>>,
    by_resource: HashMap<String, Vec<Arc<AuditEntry>>>,
    all: Vec<Arc<AuditEntry>>,
}

impl SearchIndices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index an accepted entry
    pub fn insert(&mut self, entry: AuditEntry) {
        let entry = Arc::new(entry);
        if let Some(actor) = entry.actor() {
            self.by_actor.entry(actor.to_string()).or_default().push(entry.clone());
        }
        if let Some(action) = entry.action() {
            self.by_action.entry(action.to_string()).or_default().push(entry.clone());
        }
        if let Some(resource) = entry.resource() {
            self.by_resource.entry(resource.to_string()).or_default().push(entry.clone());
        }
        self.all.push(entry);
    }

    pub fn len(&self) -> usize {
        self.all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Every indexed entry, in acceptance order
    pub fn entries(&self) -> impl Iterator<Item = &AuditEntry> {
        self.all.iter().map(|e| e.as_ref())
    }

    /// Entry counts per actor
    pub fn actor_counts(&self) -> HashMap<&str, usize> {
        self.by_actor.iter().map(|(k, v)| (k.as_str(), v.len())).collect()
    }

    /// Entry counts per action
    pub fn action_counts(&self) -> HashMap<&str, usize> {
        self.by_action.iter().map(|(k, v)| (k.as_str(), v.len())).collect()
    }

    fn lookup<'a>(
        index: &'a HashMap<String, Vec<Arc<AuditEntry>>>,
        key: &Option<String>,
    ) -> Option<&'a [Arc<AuditEntry>]> {
        key.as_ref()
            .map(|k| index.get(k).map(Vec::as_slice).unwrap_or(&[]))
    }

    /// Matching entries, intersecting every keyed criterion
    fn matching(&self, criteria: &SearchCriteria) -> Vec<&Arc<AuditEntry>> {
        let mut keyed: Vec<&[Arc<AuditEntry>]> = [
            Self::lookup(&self.by_actor, &criteria.actor),
            Self::lookup(&self.by_action, &criteria.action),
            Self::lookup(&self.by_resource, &criteria.resource),
        ]
        .into_iter()
        .flatten()
        .collect();

        if keyed.is_empty() {
            return self.all.iter().collect();
        }
        let first = keyed.remove(0);

        let others: Vec<HashSet<Uuid>> = keyed
            .iter()
            .map(|list| list.iter().map(|e| e.id).collect())
            .collect();

        first
            .iter()
            .filter(|e| others.iter().all(|ids| ids.contains(&e.id)))
            .collect()
    }

    pub fn search(&self, criteria: &SearchCriteria) -> SearchResults {
        let start = Instant::now();

        let matched: Vec<&Arc<AuditEntry>> = self
            .matching(criteria)
            .into_iter()
            .filter(|e| criteria.category.as_deref().map_or(true, |c| e.category == c))
            .filter(|e| criteria.in_range(e))
            .collect();

        let count = matched.len();
        let results = matched
            .into_iter()
            .take(criteria.limit)
            .map(|e| e.as_ref().clone())
            .collect();

        SearchResults {
            results,
            count,
            search_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}
