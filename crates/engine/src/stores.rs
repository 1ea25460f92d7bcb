// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Collaborator storage interfaces.
//!
//! The surrounding service owns document and configuration storage;
//! the engine only needs byte streams by id. The filesystem-backed
//! implementations cover the daemon and tests; ids are validated so a
//! crafted id cannot escape the storage root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Byte-stream document access by document id.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, document_id: &str) -> Result<Vec<u8>, StoreError>;
    async fn put(&self, document_id: &str, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Plugin source access by configuration id.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn plugin_source(&self, config_id: &str) -> Result<String, StoreError>;
}

/// Reject ids that could escape the storage root.
fn checked_path(root: &Path, id: &str) -> Result<PathBuf, StoreError> {
    if id.is_empty()
        || id.starts_with('/')
        || id.contains("..")
        || id.contains('\\')
        || id.starts_with('~')
    {
        return Err(StoreError::InvalidId(id.to_string()));
    }
    Ok(root.join(id))
}

/// Documents as flat files under a root directory.
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn get(&self, document_id: &str) -> Result<Vec<u8>, StoreError> {
        let path = checked_path(&self.root, document_id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(document_id.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn put(&self, document_id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = checked_path(&self.root, document_id)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        Ok(())
    }
}

/// Plugin sources as `<config_id>.py` files under a root directory.
pub struct FsConfigStore {
    root: PathBuf,
}

impl FsConfigStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ConfigStore for FsConfigStore {
    async fn plugin_source(&self, config_id: &str) -> Result<String, StoreError> {
        let path = checked_path(&self.root, &format!("{config_id}.py"))?;
        match tokio::fs::read_to_string(&path).await {
            Ok(source) => Ok(source),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(config_id.to_string()))
            }
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

#[cfg(test)]
#[path = "stores_tests.rs"]
mod tests;
