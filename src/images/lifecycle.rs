//! Image lifecycle manager
//!
//! Called by the CRUD layer around record writes:
//!
//! - before a delete: [`ImageLifecycle::cleanup_all`] removes every image the
//!   stored record references
//! - before an update: [`ImageLifecycle::cleanup_changed`] compares the stored
//!   record with the incoming payload and removes only what was replaced or
//!   dropped
//!
//! Both are best-effort. A failed deletion is logged and the rest continue;
//! nothing is returned that the caller has to act on.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::images::diff::diff;
use crate::images::registry::ImageRegistry;
use crate::images::resolve::resolve_paths;
use crate::storage::{AssetGateway, DeleteOutcome};

/// Default number of deletions in flight per cleanup
pub const DEFAULT_MAX_CONCURRENT_DELETES: usize = 4;

/// Tally of one cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub requested: usize,
    pub deleted: usize,
    pub not_found: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl CleanupReport {
    fn record(&mut self, outcome: &crate::types::Result<DeleteOutcome>) {
        match outcome {
            Ok(DeleteOutcome::Deleted) => self.deleted += 1,
            Ok(DeleteOutcome::NotFound) => self.not_found += 1,
            Ok(DeleteOutcome::Skipped(_)) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }
}

/// Removes remote images as records change
#[derive(Clone)]
pub struct ImageLifecycle {
    registry: Arc<ImageRegistry>,
    gateway: Arc<dyn AssetGateway>,
    max_concurrent: usize,
}

impl ImageLifecycle {
    pub fn new(registry: Arc<ImageRegistry>, gateway: Arc<dyn AssetGateway>) -> Self {
        Self {
            registry,
            gateway,
            max_concurrent: DEFAULT_MAX_CONCURRENT_DELETES,
        }
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Every image reachable from `record` under the registered paths
    pub fn images_of(&self, record: &Value, record_type: &str) -> Vec<String> {
        resolve_paths(record, self.registry.paths(record_type))
    }

    /// Images that `cleanup_changed` would remove for this update
    pub fn changed_images(&self, old: &Value, new: &Value, record_type: &str) -> Vec<String> {
        let paths = self.registry.paths(record_type);

        // Anything the new payload still points at, at any registered path,
        // must survive even if its position moved.
        let retained: HashSet<String> = resolve_paths(new, paths).into_iter().collect();

        let mut seen = HashSet::new();
        paths
            .iter()
            .flat_map(|path| diff(old, new, path))
            .filter(|reference| !retained.contains(reference))
            .filter(|reference| seen.insert(reference.clone()))
            .collect()
    }

    /// Delete every image of a record that is about to be removed
    pub async fn cleanup_all(&self, record: &Value, record_type: &str) -> CleanupReport {
        let references = self.images_of(record, record_type);
        debug!(
            record_type = %record_type,
            count = references.len(),
            "Full image cleanup"
        );
        self.delete_all(references, record_type).await
    }

    /// Delete images that `new_payload` replaces or drops relative to `old_record`
    pub async fn cleanup_changed(
        &self,
        old_record: &Value,
        new_payload: &Value,
        record_type: &str,
    ) -> CleanupReport {
        let references = self.changed_images(old_record, new_payload, record_type);
        debug!(
            record_type = %record_type,
            count = references.len(),
            "Differential image cleanup"
        );
        self.delete_all(references, record_type).await
    }

    async fn delete_all(&self, references: Vec<String>, record_type: &str) -> CleanupReport {
        let mut report = CleanupReport {
            requested: references.len(),
            ..Default::default()
        };
        if references.is_empty() {
            return report;
        }

        let gateway = &self.gateway;
        let mut results = stream::iter(references)
            .map(|reference| async move {
                let outcome = gateway.delete(&reference).await;
                (reference, outcome)
            })
            .buffer_unordered(self.max_concurrent);

        while let Some((reference, outcome)) = results.next().await {
            match &outcome {
                Ok(DeleteOutcome::Deleted) => {
                    debug!(reference = %reference, "Deleted image");
                }
                Ok(DeleteOutcome::NotFound) => {
                    debug!(reference = %reference, "Image already gone");
                }
                Ok(DeleteOutcome::Skipped(reason)) => {
                    debug!(reference = %reference, reason = %reason, "Image not deleted");
                }
                Err(e) => {
                    warn!(
                        record_type = %record_type,
                        reference = %reference,
                        error = %e,
                        "Failed to delete image"
                    );
                }
            }
            report.record(&outcome);
        }

        info!(
            record_type = %record_type,
            requested = report.requested,
            deleted = report.deleted,
            not_found = report.not_found,
            skipped = report.skipped,
            failed = report.failed,
            "Image cleanup finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryAssetStore;
    use serde_json::json;

    fn registry() -> Arc<ImageRegistry> {
        let mut registry = ImageRegistry::empty();
        registry
            .register(
                "Service",
                "services",
                ["cover_image", "gallery[]", "points[].image", "hero.image"],
            )
            .unwrap();
        Arc::new(registry)
    }

    fn lifecycle(store: Arc<MemoryAssetStore>) -> ImageLifecycle {
        ImageLifecycle::new(registry(), store)
    }

    fn sorted(mut v: Vec<String>) -> Vec<String> {
        v.sort();
        v
    }

    #[tokio::test]
    async fn test_cleanup_all_reaches_every_shape() {
        let record = json!({
            "cover_image": "C",
            "gallery": ["G1", "G2", "C"],
            "points": [{ "image": "P1" }, { "text": "none" }, { "image": "P2" }],
            "hero": { "image": "H" },
            "unregistered": "U"
        });
        let store = Arc::new(MemoryAssetStore::with_assets(["C", "G1", "G2", "P1", "P2", "H", "U"]));

        let report = lifecycle(store.clone()).cleanup_all(&record, "Service").await;

        assert_eq!(report.requested, 6);
        assert_eq!(report.deleted, 6);
        assert_eq!(
            sorted(store.requests()),
            vec!["C", "G1", "G2", "H", "P1", "P2"]
        );
        assert!(store.contains("U"));
    }

    #[tokio::test]
    async fn test_cleanup_changed_only_removed_or_replaced() {
        let old = json!({
            "cover_image": "C",
            "gallery": ["A", "B", "C2"],
            "points": [{ "image": "P1" }, { "image": "P2" }]
        });
        let new = json!({
            "cover_image": "C",
            "gallery": ["A", "X"],
            "points": [{ "image": "P1" }, { "image": "P3" }]
        });
        let store = Arc::new(MemoryAssetStore::with_assets(["C", "A", "B", "C2", "P1", "P2"]));

        let report = lifecycle(store.clone())
            .cleanup_changed(&old, &new, "Service")
            .await;

        assert_eq!(report.deleted, 3);
        assert_eq!(sorted(store.deleted()), vec!["B", "C2", "P2"]);
    }

    #[tokio::test]
    async fn test_reorder_keeps_referenced_images() {
        let old = json!({ "gallery": ["A", "B"] });
        let new = json!({ "gallery": ["B", "A"] });
        let store = Arc::new(MemoryAssetStore::with_assets(["A", "B"]));

        let report = lifecycle(store.clone())
            .cleanup_changed(&old, &new, "Service")
            .await;

        assert_eq!(report, CleanupReport::default());
        assert!(store.requests().is_empty());
    }

    #[tokio::test]
    async fn test_moved_between_fields_is_kept() {
        let old = json!({ "cover_image": "A", "gallery": ["B"] });
        let new = json!({ "cover_image": "B", "gallery": [] });
        let store = Arc::new(MemoryAssetStore::with_assets(["A", "B"]));

        lifecycle(store.clone())
            .cleanup_changed(&old, &new, "Service")
            .await;

        assert_eq!(store.deleted(), vec!["A"]);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_cleanup() {
        let record = json!({ "gallery": ["A", "B", "C"] });
        let store = Arc::new(MemoryAssetStore::with_assets(["A", "C"]));
        store.fail_on("A");

        let report = lifecycle(store.clone())
            .with_max_concurrent(1)
            .cleanup_all(&record, "Service")
            .await;

        assert_eq!(
            report,
            CleanupReport {
                requested: 3,
                deleted: 1,
                not_found: 1,
                skipped: 0,
                failed: 1,
            }
        );
        assert_eq!(store.deleted(), vec!["C"]);
    }

    #[tokio::test]
    async fn test_unknown_record_type_is_noop() {
        let store = Arc::new(MemoryAssetStore::with_assets(["A"]));
        let report = lifecycle(store.clone())
            .cleanup_all(&json!({ "cover_image": "A" }), "Mystery")
            .await;

        assert_eq!(report.requested, 0);
        assert!(store.contains("A"));
    }

    #[tokio::test]
    async fn test_duplicate_references_deleted_once() {
        let old = json!({ "cover_image": "A", "gallery": ["A"] });
        let store = Arc::new(MemoryAssetStore::with_assets(["A"]));

        let report = lifecycle(store.clone())
            .cleanup_changed(&old, &json!({}), "Service")
            .await;

        assert_eq!(report.requested, 1);
        assert_eq!(store.requests(), vec!["A"]);
    }
}
