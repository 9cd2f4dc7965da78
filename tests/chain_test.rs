mod common;

use audit_ledger::audit::VerifyOptions;
use audit_ledger::chain::SealedBlock;
use audit_ledger::search::SearchCriteria;
use audit_ledger::{AuditConfig, AuditError, AuditLoggingSystem};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use common::*;

#[tokio::test]
async fn test_exactly_one_hundred_entries_seal_one_block() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    for n in 0..100 {
        system.write_audit_log("system", system_event(n)).await.unwrap();
    }

    let chain = system.chain("system").await.unwrap();
    assert_eq!(chain.blocks.len(), 1);
    assert_eq!(chain.blocks[0].entry_count, 100);
    assert_eq!(system.pending_entries("system").await, 0);

    let block = system.store().read_block("system", 1).unwrap();
    assert_eq!(block.entry_count, 100);
    assert!(block.sealed);
    assert!(block.previous_hash.is_none());
}

#[tokio::test]
async fn test_one_hundred_and_one_entries_open_second_block() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    for n in 0..101 {
        system.write_audit_log("system", system_event(n)).await.unwrap();
    }

    assert_eq!(system.chain("system").await.unwrap().blocks.len(), 1);
    assert_eq!(system.pending_entries("system").await, 1);

    assert_eq!(system.flush("system").await.unwrap(), Some(2));
    let chain = system.chain("system").await.unwrap();
    assert_eq!(chain.blocks.len(), 2);
    assert_eq!(chain.blocks[1].entry_count, 1);
}

#[tokio::test]
async fn test_chain_continuity() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    for n in 0..350 {
        system.write_audit_log("system", system_event(n)).await.unwrap();
    }
    system.flush("system").await.unwrap();

    let chain = system.chain("system").await.unwrap();
    assert_eq!(chain.blocks.len(), 4);

    let store = system.store();
    for summary in &chain.blocks {
        let block = store.read_block("system", summary.block_number).unwrap();
        if summary.block_number == 1 {
            assert!(block.previous_hash.is_none());
        } else {
            let previous = &chain.blocks[summary.block_number as usize - 2];
            assert_eq!(block.previous_hash.as_deref(), Some(previous.hash.as_str()));
        }
    }
    assert_eq!(chain.last_block_hash, Some(chain.blocks[3].hash.clone()));
    assert_eq!(chain.total_entries(), 350);
}

#[tokio::test]
async fn test_hash_determinism_on_read_back() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    for n in 0..150 {
        system.write_audit_log("system", system_event(n)).await.unwrap();
    }
    system.flush("system").await.unwrap();

    let chain = system.chain("system").await.unwrap();
    for summary in &chain.blocks {
        let bytes = std::fs::read(block_file(&dir, "system", summary.block_number)).unwrap();
        let block: SealedBlock = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(block.compute_hash().unwrap(), block.hash);
        assert_eq!(block.hash, summary.hash);
        assert_eq!(serde_json::to_vec_pretty(&block).unwrap(), bytes);
        assert_eq!(
            block.recompute_merkle_root().unwrap(),
            Some(block.merkle_root.clone())
        );
    }
}

#[tokio::test]
async fn test_concurrent_writers_lose_nothing() {
    let dir = TempDir::new().unwrap();
    let system = Arc::new(open_system(&dir));

    let mut handles = Vec::new();
    for worker in 0..10 {
        let system = system.clone();
        handles.push(tokio::spawn(async move {
            for n in 0..25 {
                system
                    .write_audit_log("system", system_event(worker * 100 + n))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    system.shutdown().await.unwrap();

    let chain = system.chain("system").await.unwrap();
    let counts: Vec<usize> = chain.blocks.iter().map(|b| b.entry_count).collect();
    assert_eq!(counts, vec![100, 100, 50]);
    assert_eq!(system.metrics().await.total_entries, 250);

    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(result.valid, "{}", result.detailed_status());
    assert_eq!(result.blocks_checked, 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_index_follows_chain_order() {
    let dir = TempDir::new().unwrap();
    let system = Arc::new(open_system(&dir));

    let mut handles = Vec::new();
    for worker in 0..8 {
        let system = system.clone();
        handles.push(tokio::spawn(async move {
            for n in 0..30 {
                let resource = format!("doc-{}-{}", worker, n);
                system
                    .write_audit_log("data_access", data_access("alice", "read", &resource))
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    system.shutdown().await.unwrap();

    let chain = system.chain("data_access").await.unwrap();
    let mut chained = Vec::new();
    for summary in &chain.blocks {
        let block = system
            .store()
            .read_block("data_access", summary.block_number)
            .unwrap();
        chained.extend(block.plain_entries().unwrap().iter().map(|e| e.id));
    }

    let found = system
        .search_audit_logs(&SearchCriteria::default().actor("alice").limit(1000))
        .await;
    let indexed: Vec<_> = found.results.iter().map(|e| e.id).collect();
    assert_eq!(chained.len(), 240);
    assert_eq!(indexed, chained);
}

#[tokio::test]
async fn test_authentication_scenario() {
    let dir = TempDir::new().unwrap();
    let config = AuditConfig {
        categories_file: Some(write_auth_catalog(dir.path())),
        ..test_config(&dir)
    };
    let system = AuditLoggingSystem::open(config).unwrap();

    let receipt = system
        .write_audit_log(
            "authentication",
            payload(json!({"userId": "u1", "method": "password", "result": "success"})),
        )
        .await
        .unwrap();
    assert_eq!(receipt.hash.len(), 64);

    let err = system
        .write_audit_log(
            "authentication",
            payload(json!({"userId": "u1", "method": "password"})),
        )
        .await
        .unwrap_err();
    assert_eq!(err.missing_fields().unwrap(), &["result".to_string()]);
    assert_eq!(system.pending_entries("authentication").await, 1);
}

#[tokio::test]
async fn test_two_missing_fields_are_both_reported() {
    let dir = TempDir::new().unwrap();
    let config = AuditConfig {
        categories_file: Some(write_auth_catalog(dir.path())),
        ..test_config(&dir)
    };
    let system = AuditLoggingSystem::open(config).unwrap();

    let err = system
        .write_audit_log("authentication", payload(json!({"userId": "u1"})))
        .await
        .unwrap_err();
    assert_eq!(
        err.missing_fields().unwrap(),
        &["method".to_string(), "result".to_string()]
    );
}

#[tokio::test]
async fn test_unknown_category() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    let err = system
        .write_audit_log("billing", system_event(0))
        .await
        .unwrap_err();
    assert!(matches!(err, AuditError::UnknownCategory(_)));
}

#[tokio::test]
async fn test_added_category_accepts_entries() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    system
        .add_category(audit_ledger::registry::AuditCategory::new(
            "billing",
            "Billing",
            &["userId", "invoice"],
            365,
            false,
            &["SOX"],
        ))
        .await
        .unwrap();

    system
        .write_audit_log("billing", payload(json!({"userId": "u1", "invoice": "INV-1"})))
        .await
        .unwrap();
    assert_eq!(system.flush("billing").await.unwrap(), Some(1));
}
