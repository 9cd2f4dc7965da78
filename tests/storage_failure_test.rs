mod common;

use audit_ledger::chain::{Chain, ChainHead, SealedBlock};
use audit_ledger::storage::{BlockStore, FileBlockStore};
use audit_ledger::{AuditError, AuditLoggingSystem, AuditResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use common::*;

/// File store whose block writes can be made to fail
struct FlakyStore {
    inner: FileBlockStore,
    fail_blocks: AtomicBool,
}

impl BlockStore for FlakyStore {
    fn write_genesis(&self, chain: &Chain) -> AuditResult<u64> {
        self.inner.write_genesis(chain)
    }

    fn read_genesis(&self, category: &str) -> AuditResult<Option<Chain>> {
        self.inner.read_genesis(category)
    }

    fn write_block(&self, category: &str, block: &SealedBlock) -> AuditResult<u64> {
        if self.fail_blocks.load(Ordering::SeqCst) {
            return Err(AuditError::StorageError("disk full".to_string()));
        }
        self.inner.write_block(category, block)
    }

    fn read_block(&self, category: &str, block_number: u64) -> AuditResult<SealedBlock> {
        self.inner.read_block(category, block_number)
    }

    fn write_head(&self, category: &str, head: &ChainHead) -> AuditResult<()> {
        self.inner.write_head(category, head)
    }

    fn read_head(&self, category: &str) -> AuditResult<Option<ChainHead>> {
        self.inner.read_head(category)
    }

    fn list_blocks(&self, category: &str) -> AuditResult<Vec<u64>> {
        self.inner.list_blocks(category)
    }

    fn list_chains(&self) -> AuditResult<Vec<String>> {
        self.inner.list_chains()
    }
}

fn flaky_system(dir: &TempDir) -> (AuditLoggingSystem, Arc<FlakyStore>) {
    let store = Arc::new(FlakyStore {
        inner: FileBlockStore::open(dir.path()).unwrap(),
        fail_blocks: AtomicBool::new(false),
    });
    let system = AuditLoggingSystem::with_store(test_config(dir), store.clone()).unwrap();
    (system, store)
}

#[tokio::test]
async fn test_failed_seal_leaves_chain_unchanged() {
    let dir = TempDir::new().unwrap();
    let (system, store) = flaky_system(&dir);

    for n in 0..99 {
        system.write_audit_log("system", system_event(n)).await.unwrap();
    }

    store.fail_blocks.store(true, Ordering::SeqCst);
    let err = system
        .write_audit_log("system", system_event(99))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::StorageError(_)));

    let chain = system.chain("system").await.unwrap();
    assert!(chain.blocks.is_empty());
    assert!(chain.last_block_hash.is_none());
    assert_eq!(system.pending_entries("system").await, 99);
    assert_eq!(system.metrics().await.total_entries, 99);
    assert!(!block_file(&dir, "system", 1).exists());

    store.fail_blocks.store(false, Ordering::SeqCst);
    system.write_audit_log("system", system_event(100)).await.unwrap();

    let chain = system.chain("system").await.unwrap();
    assert_eq!(chain.blocks.len(), 1);
    assert_eq!(chain.blocks[0].entry_count, 100);
    assert_eq!(system.pending_entries("system").await, 0);
}

#[tokio::test]
async fn test_failed_flush_keeps_entries_pending() {
    let dir = TempDir::new().unwrap();
    let (system, store) = flaky_system(&dir);

    system.write_audit_log("system", system_event(0)).await.unwrap();
    store.fail_blocks.store(true, Ordering::SeqCst);
    assert!(system.flush("system").await.is_err());
    assert!(system.shutdown().await.is_err());
    assert_eq!(system.pending_entries("system").await, 1);

    store.fail_blocks.store(false, Ordering::SeqCst);
    assert_eq!(system.shutdown().await.unwrap(), 1);
    assert_eq!(system.chain("system").await.unwrap().blocks.len(), 1);
}

#[tokio::test]
async fn test_existing_block_file_is_never_overwritten() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);
    system.write_audit_log("system", system_event(0)).await.unwrap();
    system.flush("system").await.unwrap();

    let block = system.store().read_block("system", 1).unwrap();
    assert!(system.store().write_block("system", &block).is_err());
}
