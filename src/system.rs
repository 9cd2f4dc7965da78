//! Audit Logging System
//!
//! The service that owns every category's chain, open block, search index and
//! integrity result. One instance is constructed at process start and shared
//! by handle; there is no global state.
//!
//! Per category, the sequence open-block → append → threshold check → seal
//! runs under that category's mutex, so two writers can never seal the same
//! block or lose an entry to an interleaved seal. Verification sweeps take a
//! separate per-category lock and only read sealed blocks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audit::entry::AuditEntry;
use crate::audit::merkle::{generate_merkle_proof, leaf_hashes, MerkleProof};
use crate::audit::verify::{verify_chain, IntegrityCheckResult, VerifyOptions};
use crate::chain::{BlockSummary, Chain, ChainHead, OpenBlock, SealedBlock, SealingEngine};
use crate::config::AuditConfig;
use crate::crypto::EntryCipher;
use crate::error::{AuditError, AuditResult};
use crate::events::{ArchivedCategory, AuditEvent, EventBus};
use crate::registry::{AuditCategory, CategoryRegistry};
use crate::report::{build_report, AuditExport, AuditMetrics, AuditReport, ExportFormat, ReportPeriod};
use crate::search::{SearchCriteria, SearchIndices, SearchResults};
use crate::storage::{BlockStore, DirectLogWriter, FileBlockStore};
use crate::validation::validate_payload;

/// Returned for every accepted entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// SHA-256 of the entry's canonical JSON
    pub hash: String,
}

#[derive(Debug, Default)]
struct ChainState {
    chain: Option<Chain>,
    open: Option<OpenBlock>,
}

#[derive(Debug, Default)]
struct CategorySlot {
    state: Mutex<ChainState>,
    sweep: Mutex<()>,
}

impl CategorySlot {
    fn restored(chain: Chain) -> Self {
        Self {
            state: Mutex::new(ChainState {
                chain: Some(chain),
                open: None,
            }),
            sweep: Mutex::new(()),
        }
    }
}

pub struct AuditLoggingSystem {
    config: AuditConfig,
    store: Arc<dyn BlockStore>,
    direct: Option<DirectLogWriter>,
    engine: SealingEngine,
    registry: RwLock<CategoryRegistry>,
    slots: RwLock<HashMap<String, Arc<CategorySlot>>>,
    indices: RwLock<SearchIndices>,
    integrity: RwLock<HashMap<String, IntegrityCheckResult>>,
    metrics: RwLock<AuditMetrics>,
    events: EventBus,
}

/// Everything rebuilt from storage on startup
#[derive(Default)]
struct Restored {
    slots: HashMap<String, Arc<CategorySlot>>,
    indices: SearchIndices,
    metrics: AuditMetrics,
}

impl AuditLoggingSystem {
    /// Open the system over a file store rooted at `config.storage_dir`
    pub fn open(config: AuditConfig) -> AuditResult<Self> {
        let store = FileBlockStore::open(&config.storage_dir)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Open the system over any block store
    pub fn with_store(config: AuditConfig, store: Arc<dyn BlockStore>) -> AuditResult<Self> {
        config.validate()?;

        let mut registry = CategoryRegistry::with_defaults();
        if let Some(path) = &config.categories_file {
            registry.load_catalog(path, config.retention_days)?;
        }

        let cipher = if config.encryption_enabled {
            Some(Arc::new(EntryCipher::from_config(&config)?))
        } else {
            None
        };

        let engine = SealingEngine::from_config(&config, cipher);
        let direct = if config.blockchain_enabled {
            None
        } else {
            Some(DirectLogWriter::new(&config.storage_dir))
        };

        let restored = restore(store.as_ref(), &mut registry, engine.cipher())?;

        info!(
            "Audit logging system ready: {} categories, {} chains, {} entries, {} blocks",
            registry.len(),
            restored.slots.len(),
            restored.metrics.total_entries,
            restored.metrics.total_blocks
        );

        Ok(Self {
            events: EventBus::with_capacity(config.event_buffer),
            config,
            store,
            direct,
            engine,
            registry: RwLock::new(registry),
            slots: RwLock::new(restored.slots),
            indices: RwLock::new(restored.indices),
            integrity: RwLock::new(HashMap::new()),
            metrics: RwLock::new(restored.metrics),
        })
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn BlockStore> {
        self.store.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuditEvent> {
        self.events.subscribe()
    }

    pub async fn metrics(&self) -> AuditMetrics {
        self.metrics.read().await.clone()
    }

    pub async fn categories(&self) -> Vec<AuditCategory> {
        self.registry.read().await.iter().cloned().collect()
    }

    /// Register a new category
    pub async fn add_category(&self, category: AuditCategory) -> AuditResult<()> {
        let category = category.with_default_retention(self.config.retention_days);
        let id = category.id.clone();
        self.registry.write().await.add_category(category)?;
        info!("Added audit category {}", id);
        Ok(())
    }

    async fn require_category(&self, category: &str) -> AuditResult<AuditCategory> {
        self.registry.read().await.require(category).cloned()
    }

    async fn slot(&self, category: &str) -> Arc<CategorySlot> {
        if let Some(slot) = self.slots.read().await.get(category) {
            return slot.clone();
        }
        self.slots
            .write()
            .await
            .entry(category.to_string())
            .or_default()
            .clone()
    }

    async fn existing_slot(&self, category: &str) -> Option<Arc<CategorySlot>> {
        self.slots.read().await.get(category).cloned()
    }

    fn encrypts(&self, category: &AuditCategory) -> bool {
        category.encryption && self.engine.cipher().is_some()
    }

    /// Validate and record one audit entry
    pub async fn write_audit_log(
        &self,
        category: &str,
        data: Map<String, Value>,
    ) -> AuditResult<WriteReceipt> {
        let definition = self.require_category(category).await?;
        validate_payload(&definition, &data)?;

        let entry = AuditEntry::new(category, data, &self.config.host_id);
        let hash = entry.content_hash()?;

        let receipt = WriteReceipt {
            id: entry.id,
            timestamp: entry.timestamp,
            hash: hash.clone(),
        };

        match &self.direct {
            Some(direct) => {
                direct.append(&entry)?;
                self.indices.write().await.insert(entry);
            }
            None => self.append_to_chain(&definition, entry).await?,
        }

        self.registry.write().await.record_entries(category, 1);
        self.metrics.write().await.total_entries += 1;

        debug!("Logged audit entry {} in {}", receipt.id, category);
        self.events.publish(AuditEvent::EntryLogged {
            category: category.to_string(),
            entry_id: receipt.id,
            hash,
        });

        Ok(receipt)
    }

    /// Append under the category lock, indexing in chain order
    async fn append_to_chain(&self, category: &AuditCategory, entry: AuditEntry) -> AuditResult<()> {
        let slot = self.slot(&category.id).await;
        let mut state = slot.state.lock().await;

        if state.chain.is_none() {
            let chain = Chain::new(&category.id, self.encrypts(category));
            self.store.write_genesis(&chain)?;
            info!("Created audit chain {} for {}", chain.id, category.id);
            state.chain = Some(chain);
        }

        if state.open.is_none() {
            let block = state
                .chain
                .as_ref()
                .map(Chain::open_block)
                .ok_or_else(|| AuditError::StorageError(format!("No chain for {}", category.id)))?;
            debug!("Opened block {} for {}", block.block_number, category.id);
            state.open = Some(block);
        }

        let should_seal = match state.open.as_mut() {
            Some(open) => {
                open.push(entry.clone());
                open.should_seal(Utc::now(), &self.engine.policy)
            }
            None => false,
        };

        if should_seal {
            if let Err(e) = self.seal_locked(&mut state, category).await {
                if let Some(open) = state.open.as_mut() {
                    open.pop();
                }
                return Err(e);
            }
        }

        self.indices.write().await.insert(entry);
        Ok(())
    }

    /// Seal the open block, if it has entries
    ///
    /// On failure the block is put back unsealed and the chain is untouched.
    async fn seal_locked(
        &self,
        state: &mut ChainState,
        category: &AuditCategory,
    ) -> AuditResult<Option<SealedBlock>> {
        let Some(open) = state.open.take() else {
            return Ok(None);
        };
        if open.is_empty() {
            state.open = Some(open);
            return Ok(None);
        }

        let pending = open.clone();
        let result = self
            .engine
            .seal(open, self.encrypts(category))
            .and_then(|sealed| {
                let bytes = self.store.write_block(&category.id, &sealed)?;
                Ok((bytes, sealed))
            });
        let (bytes, sealed) = match result {
            Ok(result) => result,
            Err(e) => {
                error!(
                    "Failed to seal block {} for {}: {}",
                    pending.block_number, category.id, e
                );
                state.open = Some(pending);
                return Err(e);
            }
        };

        let chain = state
            .chain
            .as_mut()
            .ok_or_else(|| AuditError::StorageError(format!("No chain for {}", category.id)))?;
        chain.record_sealed(&sealed)?;
        if let Err(e) = self.store.write_head(&category.id, &chain.head()) {
            warn!("Failed to record head of {}: {}", category.id, e);
        }

        {
            let mut metrics = self.metrics.write().await;
            metrics.total_blocks += 1;
            metrics.bytes_stored += bytes;
        }

        info!(
            "Sealed block {} for {}: {} entries, hash {}, nonce {}",
            sealed.block_number, category.id, sealed.entry_count, sealed.hash, sealed.nonce
        );
        self.events.publish(AuditEvent::BlockSealed {
            category: category.id.clone(),
            block_number: sealed.block_number,
            hash: sealed.hash.clone(),
            entry_count: sealed.entry_count,
        });

        Ok(Some(sealed))
    }

    /// Seal a category's open block regardless of thresholds
    pub async fn flush(&self, category: &str) -> AuditResult<Option<u64>> {
        let definition = self.require_category(category).await?;
        let Some(slot) = self.existing_slot(category).await else {
            return Ok(None);
        };
        let mut state = slot.state.lock().await;
        let sealed = self.seal_locked(&mut state, &definition).await?;
        Ok(sealed.map(|b| b.block_number))
    }

    async fn seal_each(&self, stale_only: bool) -> AuditResult<usize> {
        let slots: Vec<(String, Arc<CategorySlot>)> = self
            .slots
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let now = Utc::now();
        let mut sealed = 0;
        let mut first_error = None;

        for (id, slot) in slots {
            let Some(definition) = self.registry.read().await.get(&id).cloned() else {
                continue;
            };
            let mut state = slot.state.lock().await;
            let due = state.open.as_ref().is_some_and(|open| {
                !open.is_empty() && (!stale_only || open.age(now) >= self.engine.policy.max_age)
            });
            if !due {
                continue;
            }

            match self.seal_locked(&mut state, &definition).await {
                Ok(Some(_)) => sealed += 1,
                Ok(None) => {}
                Err(e) => {
                    warn!("Failed to seal open block for {}: {}", id, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) if stale_only => {
                debug!("Stale sweep sealed {} blocks before error: {}", sealed, e);
                Ok(sealed)
            }
            Some(e) => Err(e),
            None => Ok(sealed),
        }
    }

    /// Seal open blocks past the age threshold
    pub async fn seal_stale_blocks(&self) -> AuditResult<usize> {
        let sealed = self.seal_each(true).await?;
        if sealed > 0 {
            debug!("Sealed {} stale blocks", sealed);
        }
        Ok(sealed)
    }

    /// Seal every open block so no accepted entry is left unsealed
    pub async fn shutdown(&self) -> AuditResult<usize> {
        info!("Shutting down audit logging system");
        let sealed = self.seal_each(false).await?;
        info!("Sealed {} open blocks on shutdown", sealed);
        Ok(sealed)
    }

    /// Search accepted entries
    pub async fn search_audit_logs(&self, criteria: &SearchCriteria) -> SearchResults {
        self.indices.read().await.search(criteria)
    }

    /// Verify a category's chain against its stored blocks
    pub async fn verify_integrity(
        &self,
        category: &str,
        options: VerifyOptions,
    ) -> AuditResult<IntegrityCheckResult> {
        self.require_category(category).await?;

        let result = match self.existing_slot(category).await {
            Some(slot) => {
                let _sweep = slot.sweep.lock().await;
                let summaries = slot
                    .state
                    .lock()
                    .await
                    .chain
                    .as_ref()
                    .map(|c| c.blocks.clone())
                    .unwrap_or_default();
                verify_chain(self.store.as_ref(), category, &summaries, options)
            }
            None => verify_chain(self.store.as_ref(), category, &[], options),
        };

        {
            let mut metrics = self.metrics.write().await;
            metrics.integrity_checks += 1;
            if !result.valid {
                metrics.violations += 1;
            }
        }
        self.integrity
            .write()
            .await
            .insert(category.to_string(), result.clone());

        self.events.publish(AuditEvent::IntegrityChecked {
            category: category.to_string(),
            valid: result.valid,
            blocks_checked: result.blocks_checked,
            errors: result.errors.len(),
        });

        Ok(result)
    }

    /// Verify every registered category
    pub async fn verify_all(&self, options: VerifyOptions) -> Vec<IntegrityCheckResult> {
        let ids = self.registry.read().await.ids();
        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.verify_integrity(&id, options).await {
                Ok(result) => results.push(result),
                Err(e) => warn!("Integrity check failed for {}: {}", id, e),
            }
        }
        results
    }

    pub async fn generate_audit_report(&self, period: ReportPeriod) -> AuditReport {
        let registry = self.registry.read().await;
        let indices = self.indices.read().await;
        let integrity = self.integrity.read().await;
        let metrics = self.metrics.read().await;
        build_report(period, &registry, &indices, &integrity, &metrics)
    }

    /// Export matching entries as `json`, `csv` or `evidence`
    pub async fn export_audit_logs(
        &self,
        criteria: &SearchCriteria,
        format: &str,
    ) -> AuditResult<AuditExport> {
        let format: ExportFormat = format.parse()?;
        let results = self.search_audit_logs(criteria).await;
        info!("Exporting {} audit entries as {:?}", results.results.len(), format);
        AuditExport::build(results.results, format, &self.config.certifier)
    }

    /// Count sealed blocks past each category's retention period
    ///
    /// Nothing is moved or deleted.
    pub async fn archive_old_logs(&self) -> Vec<ArchivedCategory> {
        let now = Utc::now();
        let categories = self.categories().await;
        let mut archived = Vec::with_capacity(categories.len());

        for category in categories {
            let cutoff_date = now - Duration::days(i64::from(category.retention_days));
            let eligible_blocks = match self.existing_slot(&category.id).await {
                Some(slot) => slot
                    .state
                    .lock()
                    .await
                    .chain
                    .as_ref()
                    .map(|c| c.blocks.iter().filter(|b| b.timestamp < cutoff_date).count())
                    .unwrap_or(0),
                None => 0,
            };

            archived.push(ArchivedCategory {
                category: category.id,
                cutoff_date,
                retention_days: category.retention_days,
                eligible_blocks,
            });
        }

        let eligible: usize = archived.iter().map(|a| a.eligible_blocks).sum();
        info!(
            "Archive sweep complete: {} blocks past retention across {} categories",
            eligible,
            archived.len()
        );
        self.events.publish(AuditEvent::ArchiveCompleted {
            categories: archived.clone(),
        });
        archived
    }

    /// Snapshot of a category's chain
    pub async fn chain(&self, category: &str) -> Option<Chain> {
        let slot = self.existing_slot(category).await?;
        let state = slot.state.lock().await;
        state.chain.clone()
    }

    /// Entries accepted into the open block but not yet sealed
    pub async fn pending_entries(&self, category: &str) -> usize {
        match self.existing_slot(category).await {
            Some(slot) => slot
                .state
                .lock()
                .await
                .open
                .as_ref()
                .map_or(0, OpenBlock::entry_count),
            None => 0,
        }
    }

    /// Merkle inclusion proof for an entry in a sealed block
    pub async fn prove_entry(
        &self,
        category: &str,
        block_number: u64,
        entry_id: Uuid,
    ) -> AuditResult<MerkleProof> {
        self.require_category(category).await?;
        let block = self.store.read_block(category, block_number)?;
        let entries = match self.engine.cipher() {
            Some(cipher) => block.decrypt_entries(cipher)?,
            None => block
                .plain_entries()
                .map(<[AuditEntry]>::to_vec)
                .ok_or_else(|| {
                    AuditError::CryptoError(format!(
                        "Block {} of {} is encrypted and no key is configured",
                        block_number, category
                    ))
                })?,
        };

        let index = entries
            .iter()
            .position(|e| e.id == entry_id)
            .ok_or_else(|| {
                AuditError::invalid_field(
                    "entryId",
                    format!("{} not in block {} of {}", entry_id, block_number, category),
                )
            })?;

        generate_merkle_proof(&leaf_hashes(&entries)?, index)
    }
}

/// Rebuild chains, counters and indices from storage
///
/// Missing or unreadable blocks never stop the system from opening. They are
/// kept in the chain as placeholder summaries so verification reports them.
fn restore(
    store: &dyn BlockStore,
    registry: &mut CategoryRegistry,
    cipher: Option<&EntryCipher>,
) -> AuditResult<Restored> {
    let mut restored = Restored::default();

    for category in store.list_chains()? {
        if !registry.contains(&category) {
            warn!("Skipping stored chain for unregistered category {}", category);
            continue;
        }
        let Some(mut chain) = store.read_genesis(&category)? else {
            continue;
        };

        let head = recorded_head(store, &chain, &category);
        let blocks = read_stored_blocks(store, &category, head.as_ref())?;

        for (index, block) in blocks.iter().enumerate() {
            let block_number = index as u64 + 1;
            let recorded_hash = head
                .as_ref()
                .filter(|h| h.block_count == block_number)
                .and_then(|h| h.last_block_hash.clone());

            let Some(block) = block else {
                let linked_hash = blocks
                    .get(index + 1)
                    .and_then(Option::as_ref)
                    .and_then(|next| next.previous_hash.clone());
                let timestamp = chain.blocks.last().map_or(chain.created, |b| b.timestamp);
                chain.restore_summary(BlockSummary {
                    block_number,
                    hash: recorded_hash.or(linked_hash).unwrap_or_default(),
                    timestamp,
                    entry_count: 0,
                });
                continue;
            };

            chain.restore_summary(BlockSummary {
                block_number,
                hash: recorded_hash.unwrap_or_else(|| block.hash.clone()),
                timestamp: block.sealed_at,
                entry_count: block.entry_count,
            });
            restored.metrics.total_blocks += 1;
            restored.metrics.total_entries += block.entry_count as u64;
            restored.metrics.bytes_stored += serde_json::to_vec_pretty(block)?.len() as u64;
            registry.record_entries(&category, block.entry_count as u64);

            let entries = match (block.plain_entries(), cipher) {
                (Some(entries), _) => entries.to_vec(),
                (None, Some(cipher)) => match block.decrypt_entries(cipher) {
                    Ok(entries) => entries,
                    Err(e) => {
                        warn!(
                            "Cannot decrypt block {} of {} for indexing: {}",
                            block_number, category, e
                        );
                        Vec::new()
                    }
                },
                (None, None) => {
                    warn!(
                        "Block {} of {} is encrypted and no key is configured; not indexed",
                        block_number, category
                    );
                    Vec::new()
                }
            };
            for entry in entries {
                restored.indices.insert(entry);
            }
        }

        debug!(
            "Restored chain {} ({} blocks, head {:?})",
            category,
            chain.blocks.len(),
            chain.last_block_hash
        );
        restored
            .slots
            .insert(category, Arc::new(CategorySlot::restored(chain)));
    }

    Ok(restored)
}

/// The persisted head of a chain, if it is readable and belongs to the chain
fn recorded_head(store: &dyn BlockStore, chain: &Chain, category: &str) -> Option<ChainHead> {
    match store.read_head(category) {
        Ok(Some(head)) if head.chain_id == chain.id => Some(head),
        Ok(Some(head)) => {
            warn!(
                "Ignoring head record of {}: chain {} does not match {}",
                category, head.chain_id, chain.id
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            warn!("Cannot read head record of {}: {}", category, e);
            None
        }
    }
}

/// Blocks 1..=n, where n covers both the files on disk and the recorded head
///
/// A `None` slot is a block that is missing or cannot be parsed.
fn read_stored_blocks(
    store: &dyn BlockStore,
    category: &str,
    head: Option<&ChainHead>,
) -> AuditResult<Vec<Option<SealedBlock>>> {
    let listed = store.list_blocks(category)?;
    let on_disk = listed.last().copied().unwrap_or(0);
    let length = on_disk.max(head.map_or(0, |h| h.block_count));

    let mut blocks = Vec::new();
    for block_number in 1..=length {
        if listed.binary_search(&block_number).is_err() {
            warn!("Chain {} is missing block {}", category, block_number);
            blocks.push(None);
            continue;
        }
        match store.read_block(category, block_number) {
            Ok(block) => blocks.push(Some(block)),
            Err(e) => {
                warn!("Cannot read block {} of {}: {}", block_number, category, e);
                blocks.push(None);
            }
        }
    }
    Ok(blocks)
}
