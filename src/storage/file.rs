//! File-backed block store
//!
//! Layout, one directory per category:
//!
//! ```text
//! <root>/<category>/genesis.json
//! <root>/<category>/head.json
//! <root>/<category>/block_00000001.json
//! ```

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use super::BlockStore;
use crate::chain::{Chain, ChainHead, SealedBlock};
use crate::error::{AuditError, AuditResult};

const GENESIS_FILE: &str = "genesis.json";
const HEAD_FILE: &str = "head.json";
const HEAD_TMP_FILE: &str = "head.json.tmp";
const BLOCK_PREFIX: &str = "block_";
const BLOCK_SUFFIX: &str = ".json";

pub fn block_file_name(block_number: u64) -> String {
    format!("{}{:08}{}", BLOCK_PREFIX, block_number, BLOCK_SUFFIX)
}

fn parse_block_file_name(name: &str) -> Option<u64> {
    name.strip_prefix(BLOCK_PREFIX)?
        .strip_suffix(BLOCK_SUFFIX)?
        .parse()
        .ok()
}

#[derive(Debug, Clone)]
pub struct FileBlockStore {
    root: PathBuf,
}

impl FileBlockStore {
    /// Open a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> AuditResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            AuditError::StorageError(format!("Failed to create storage directory {:?}: {}", root, e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: &str) -> PathBuf {
        self.root.join(category)
    }

    pub fn genesis_path(&self, category: &str) -> PathBuf {
        self.category_dir(category).join(GENESIS_FILE)
    }

    pub fn head_path(&self, category: &str) -> PathBuf {
        self.category_dir(category).join(HEAD_FILE)
    }

    pub fn block_path(&self, category: &str, block_number: u64) -> PathBuf {
        self.category_dir(category).join(block_file_name(block_number))
    }

    /// Write a new file; refuses to replace an existing one
    fn write_once(&self, path: &Path, contents: &[u8]) -> AuditResult<u64> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AuditError::StorageError(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| AuditError::StorageError(format!("Failed to create {:?}: {}", path, e)))?;

        let written = file
            .write_all(contents)
            .and_then(|_| file.sync_all());

        if let Err(e) = written {
            error!("Failed to write {:?}: {}", path, e);
            drop(file);
            if let Err(cleanup) = fs::remove_file(path) {
                warn!("Failed to remove partial file {:?}: {}", path, cleanup);
            }
            return Err(AuditError::StorageError(format!("Failed to write {:?}: {}", path, e)));
        }

        Ok(contents.len() as u64)
    }

    /// Replace a file atomically through a temporary sibling
    fn replace(&self, dir: &Path, name: &str, contents: &[u8]) -> AuditResult<()> {
        let path = dir.join(name);
        let tmp = dir.join(HEAD_TMP_FILE);

        let written = fs::create_dir_all(dir)
            .and_then(|_| fs::File::create(&tmp))
            .and_then(|mut file| {
                file.write_all(contents)?;
                file.sync_all()
            })
            .and_then(|_| fs::rename(&tmp, &path));

        written.map_err(|e| {
            error!("Failed to replace {:?}: {}", path, e);
            AuditError::StorageError(format!("Failed to write {:?}: {}", path, e))
        })
    }

    fn read_json<T: serde::de::DeserializeOwned>(&self, path: &Path) -> AuditResult<T> {
        let contents = fs::read(path)
            .map_err(|e| AuditError::StorageError(format!("Failed to read {:?}: {}", path, e)))?;
        serde_json::from_slice(&contents).map_err(|e| {
            AuditError::SerializationError(format!("Failed to parse {:?}: {}", path, e))
        })
    }
}

impl BlockStore for FileBlockStore {
    fn write_genesis(&self, chain: &Chain) -> AuditResult<u64> {
        let json = serde_json::to_vec_pretty(&chain.genesis())?;
        let bytes = self.write_once(&self.genesis_path(&chain.category), &json)?;
        debug!("Wrote genesis for chain {} ({})", chain.id, chain.category);
        Ok(bytes)
    }

    fn read_genesis(&self, category: &str) -> AuditResult<Option<Chain>> {
        let path = self.genesis_path(category);
        if !path.exists() {
            return Ok(None);
        }
        self.read_json(&path).map(Some)
    }

    fn write_block(&self, category: &str, block: &SealedBlock) -> AuditResult<u64> {
        let json = serde_json::to_vec_pretty(block)?;
        let bytes = self.write_once(&self.block_path(category, block.block_number), &json)?;
        debug!(
            "Wrote block {} for {} ({} bytes)",
            block.block_number, category, bytes
        );
        Ok(bytes)
    }

    fn read_block(&self, category: &str, block_number: u64) -> AuditResult<SealedBlock> {
        self.read_json(&self.block_path(category, block_number))
    }

    fn write_head(&self, category: &str, head: &ChainHead) -> AuditResult<()> {
        let json = serde_json::to_vec_pretty(head)?;
        self.replace(&self.category_dir(category), HEAD_FILE, &json)?;
        debug!("Recorded head of {} at block {}", category, head.block_count);
        Ok(())
    }

    fn read_head(&self, category: &str) -> AuditResult<Option<ChainHead>> {
        let path = self.head_path(category);
        if !path.exists() {
            return Ok(None);
        }
        self.read_json(&path).map(Some)
    }

    fn list_blocks(&self, category: &str) -> AuditResult<Vec<u64>> {
        let dir = self.category_dir(category);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut numbers = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if let Some(number) = entry.file_name().to_str().and_then(parse_block_file_name) {
                numbers.push(number);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn list_chains(&self) -> AuditResult<Vec<String>> {
        let mut categories = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().join(GENESIS_FILE).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                categories.push(name.to_string());
            }
        }
        categories.sort();
        Ok(categories)
    }
}
