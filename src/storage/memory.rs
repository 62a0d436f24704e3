//! In-process asset store
//!
//! Backs `--dry-run` and the tests: deletions are recorded instead of being
//! sent anywhere. References can be seeded as existing, and individual
//! references can be made to fail.

use std::collections::HashSet;
use std::sync::Mutex;

use super::{AssetGateway, DeleteOutcome};
use crate::types::{CuratorError, Result};

#[derive(Debug, Default)]
struct Inner {
    existing: HashSet<String>,
    failing: HashSet<String>,
    deleted: Vec<String>,
    requests: Vec<String>,
}

/// Gateway that keeps its objects in memory
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    inner: Mutex<Inner>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with existing objects
    pub fn with_assets<I, S>(assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for asset in assets {
            store.insert(asset);
        }
        store
    }

    pub fn insert(&self, reference: impl Into<String>) {
        self.lock().existing.insert(reference.into());
    }

    /// Make every delete of `reference` return a gateway error
    pub fn fail_on(&self, reference: impl Into<String>) {
        self.lock().failing.insert(reference.into());
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.lock().existing.contains(reference)
    }

    /// References actually removed, in request order
    pub fn deleted(&self) -> Vec<String> {
        self.lock().deleted.clone()
    }

    /// Every reference a delete was requested for, in request order
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait::async_trait]
impl AssetGateway for MemoryAssetStore {
    async fn delete(&self, reference: &str) -> Result<DeleteOutcome> {
        let mut inner = self.lock();
        inner.requests.push(reference.to_string());

        if inner.failing.contains(reference) {
            return Err(CuratorError::Gateway(format!(
                "simulated failure for {}",
                reference
            )));
        }

        if inner.existing.remove(reference) {
            inner.deleted.push(reference.to_string());
            Ok(DeleteOutcome::Deleted)
        } else {
            Ok(DeleteOutcome::NotFound)
        }
    }
}
