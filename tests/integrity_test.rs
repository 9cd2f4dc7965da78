mod common;

use audit_ledger::audit::VerifyOptions;
use audit_ledger::chain::BlockEntries;
use audit_ledger::search::SearchCriteria;
use audit_ledger::storage::{BlockStore, FileBlockStore};
use audit_ledger::AuditLoggingSystem;
use serde_json::json;
use tempfile::TempDir;

use common::*;

/// Flip one hex digit of the stored Merkle root in a block file
fn flip_merkle_root(path: &std::path::Path) {
    let mut contents = std::fs::read_to_string(path).unwrap();
    let marker = "\"merkleRoot\": \"";
    let position = contents.find(marker).unwrap() + marker.len();
    let original = contents.as_bytes()[position] as char;
    let replacement = if original == '0' { "1" } else { "0" };
    contents.replace_range(position..position + 1, replacement);
    std::fs::write(path, contents).unwrap();
}

async fn two_sealed_blocks(dir: &TempDir) -> AuditLoggingSystem {
    let system = open_system(dir);
    for n in 0..200 {
        system.write_audit_log("system", system_event(n)).await.unwrap();
    }
    assert_eq!(system.chain("system").await.unwrap().blocks.len(), 2);
    system
}

#[tokio::test]
async fn test_intact_chain_verifies() {
    let dir = TempDir::new().unwrap();
    let system = two_sealed_blocks(&dir).await;

    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(result.valid);
    assert_eq!(result.blocks_checked, 2);
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn test_flipped_byte_is_one_hash_mismatch() {
    let dir = TempDir::new().unwrap();
    let system = two_sealed_blocks(&dir).await;
    flip_merkle_root(&block_file(&dir, "system", 1));

    let result = system
        .verify_integrity("system", VerifyOptions::default())
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.blocks_checked, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_hash_mismatch());
    assert_eq!(result.errors[0].block_number(), 1);
}

#[tokio::test]
async fn test_flipped_byte_deep_adds_merkle_mismatch() {
    let dir = TempDir::new().unwrap();
    let system = two_sealed_blocks(&dir).await;
    flip_merkle_root(&block_file(&dir, "system", 1));

    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert_eq!(result.errors.len(), 2);
    assert_eq!(result.errors.iter().filter(|e| e.is_hash_mismatch()).count(), 1);
    assert_eq!(result.errors.iter().filter(|e| e.is_merkle_mismatch()).count(), 1);
    assert!(!result.errors.iter().any(|e| e.is_chain_discontinuity()));

    let metrics = system.metrics().await;
    assert_eq!(metrics.integrity_checks, 1);
    assert_eq!(metrics.violations, 1);
}

#[tokio::test]
async fn test_edited_entry_needs_deep_check() {
    let dir = TempDir::new().unwrap();
    let system = two_sealed_blocks(&dir).await;

    let path = block_file(&dir, "system", 2);
    let contents = std::fs::read_to_string(&path).unwrap();
    std::fs::write(&path, contents.replace("tick-150", "tick-XYZ")).unwrap();

    let shallow = system
        .verify_integrity("system", VerifyOptions::default())
        .await
        .unwrap();
    assert!(shallow.valid);

    let deep = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert_eq!(deep.errors.len(), 1);
    assert!(deep.errors[0].is_merkle_mismatch());
    assert_eq!(deep.errors[0].block_number(), 2);
}

#[tokio::test]
async fn test_deleted_block_is_read_failure() {
    let dir = TempDir::new().unwrap();
    let system = two_sealed_blocks(&dir).await;
    std::fs::remove_file(block_file(&dir, "system", 1)).unwrap();

    let result = system
        .verify_integrity("system", VerifyOptions::default())
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.blocks_checked, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_read_failure());
}

#[tokio::test]
async fn test_category_without_chain_is_valid() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    let result = system
        .verify_integrity("security", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(result.valid);
    assert_eq!(result.blocks_checked, 0);
}

#[tokio::test]
async fn test_encrypted_blocks_restore_and_verify() {
    let dir = TempDir::new().unwrap();
    {
        let system = AuditLoggingSystem::open(encrypted_config(&dir)).unwrap();
        for n in 0..3 {
            system
                .write_audit_log("data_access", data_access("alice", "read", &format!("doc-{}", n)))
                .await
                .unwrap();
        }
        system.shutdown().await.unwrap();
    }

    let raw = std::fs::read_to_string(block_file(&dir, "data_access", 1)).unwrap();
    assert!(raw.contains("\"authTag\""));
    assert!(!raw.contains("alice"));

    let system = AuditLoggingSystem::open(encrypted_config(&dir)).unwrap();
    let block = system.store().read_block("data_access", 1).unwrap();
    assert!(block.encrypted);
    assert!(block.plain_entries().is_none());

    let found = system
        .search_audit_logs(&SearchCriteria::default().actor("alice"))
        .await;
    assert_eq!(found.count, 3);

    let result = system
        .verify_integrity("data_access", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(result.valid, "{}", result.detailed_status());
}

#[tokio::test]
async fn test_unencrypted_category_stays_plain_with_encryption_on() {
    let dir = TempDir::new().unwrap();
    let system = AuditLoggingSystem::open(encrypted_config(&dir)).unwrap();
    system.write_audit_log("system", system_event(1)).await.unwrap();
    system.flush("system").await.unwrap();

    let block = system.store().read_block("system", 1).unwrap();
    assert!(!block.encrypted);
    assert_eq!(block.plain_entries().unwrap().len(), 1);
}

#[tokio::test]
async fn test_float_payloads_verify_deep_and_prove() {
    let dir = TempDir::new().unwrap();
    let system = open_system(&dir);

    let mut receipts = Vec::new();
    for n in 0..100 {
        let duration = ((n * 7 + 1) as f64).sqrt() * 1.0e14 / 3.0;
        let receipt = system
            .write_audit_log(
                "api",
                payload(json!({
                    "endpoint": format!("/v1/items/{}", n),
                    "method": "GET",
                    "userId": "alice",
                    "responseCode": 200,
                    "duration": duration
                })),
            )
            .await
            .unwrap();
        receipts.push(receipt);
    }
    assert_eq!(system.chain("api").await.unwrap().blocks.len(), 1);

    let result = system
        .verify_integrity("api", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(result.valid, "{}", result.detailed_status());

    for receipt in [&receipts[0], &receipts[57], &receipts[99]] {
        let proof = system.prove_entry("api", 1, receipt.id).await.unwrap();
        assert_eq!(proof.leaf_hash, receipt.hash);
        assert!(proof.verify());
    }
}

#[tokio::test]
async fn test_reopen_with_deleted_block_reports_read_failure() {
    let dir = TempDir::new().unwrap();
    two_sealed_blocks(&dir).await.shutdown().await.unwrap();
    std::fs::remove_file(block_file(&dir, "system", 1)).unwrap();

    let system = open_system(&dir);
    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.blocks_checked, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_read_failure());
    assert_eq!(result.errors[0].block_number(), 1);

    system.write_audit_log("system", system_event(500)).await.unwrap();
    assert_eq!(system.flush("system").await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_reopen_with_corrupt_block_reports_read_failure() {
    let dir = TempDir::new().unwrap();
    two_sealed_blocks(&dir).await.shutdown().await.unwrap();

    let path = block_file(&dir, "system", 1);
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = b'X';
    std::fs::write(&path, bytes).unwrap();

    let system = open_system(&dir);
    let result = system
        .verify_integrity("system", VerifyOptions::default())
        .await
        .unwrap();
    assert_eq!(result.blocks_checked, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_read_failure());
    assert_eq!(result.errors[0].block_number(), 1);
    assert_eq!(system.metrics().await.total_entries, 100);
}

#[tokio::test]
async fn test_truncated_tail_detected_after_reopen() {
    let dir = TempDir::new().unwrap();
    let head = {
        let system = two_sealed_blocks(&dir).await;
        system.chain("system").await.unwrap().last_block_hash
    };
    std::fs::remove_file(block_file(&dir, "system", 2)).unwrap();

    let system = open_system(&dir);
    let chain = system.chain("system").await.unwrap();
    assert_eq!(chain.blocks.len(), 2);
    assert_eq!(chain.last_block_hash, head);

    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert!(!result.valid);
    assert_eq!(result.blocks_checked, 1);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_read_failure());
    assert_eq!(result.errors[0].block_number(), 2);

    system.write_audit_log("system", system_event(900)).await.unwrap();
    system.flush("system").await.unwrap();
    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert_eq!(result.blocks_checked, 2);
    assert_eq!(result.errors.len(), 1);
}

#[tokio::test]
async fn test_rewritten_tail_detected_after_reopen() {
    let dir = TempDir::new().unwrap();
    two_sealed_blocks(&dir).await;

    let store = FileBlockStore::open(dir.path()).unwrap();
    let mut block = store.read_block("system", 2).unwrap();
    if let BlockEntries::Plain(entries) = &mut block.entries {
        entries.pop();
    }
    block.entry_count -= 1;
    block.merkle_root = block.recompute_merkle_root().unwrap().unwrap();
    block.hash = block.compute_hash().unwrap();
    std::fs::remove_file(block_file(&dir, "system", 2)).unwrap();
    store.write_block("system", &block).unwrap();

    let system = open_system(&dir);
    let result = system
        .verify_integrity("system", VerifyOptions::deep())
        .await
        .unwrap();
    assert_eq!(result.blocks_checked, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].is_hash_mismatch());
    assert_eq!(result.errors[0].block_number(), 2);
}
