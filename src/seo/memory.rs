//! In-memory stores for the SEO synchronizer

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use bson::{oid::ObjectId, Bson, DateTime, Document};

use super::store::{ContentStore, ContentSummary, SeoStore};
use crate::db::schemas::{ContentKind, Metadata, SeoMetadataDoc};
use crate::types::{CuratorError, Result};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// `SeoStore` with the same unique-slug rule as the MongoDB index.
///
/// Entries are kept as raw documents and updated with the same
/// `$set`/`$unset` document the MongoDB store sends, so fields sync does not
/// model behave as they would in the real collection.
#[derive(Debug, Default)]
pub struct MemorySeoStore {
    docs: Mutex<Vec<Document>>,
}

impl MemorySeoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        lock(&self.docs).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a document as another writer of the collection would, assigning
    /// an `_id` when it has none
    pub fn insert_raw(&self, mut raw: Document) -> ObjectId {
        let id = raw.get_object_id("_id").unwrap_or_else(|_| {
            let id = ObjectId::new();
            raw.insert("_id", id);
            id
        });
        lock(&self.docs).push(raw);
        id
    }

    /// The stored document for a slug, including fields sync does not model
    pub fn raw_by_slug(&self, slug: &str) -> Option<Document> {
        lock(&self.docs).iter().find(|d| has_slug(d, slug)).cloned()
    }

    fn slug_taken(docs: &[Document], slug: &str, except: Option<ObjectId>) -> bool {
        docs.iter()
            .any(|d| has_slug(d, slug) && d.get_object_id("_id").ok() != except)
    }
}

fn has_slug(doc: &Document, slug: &str) -> bool {
    doc.get_str("slug").ok() == Some(slug)
}

fn decode(raw: &Document) -> Result<SeoMetadataDoc> {
    bson::from_document(raw.clone())
        .map_err(|e| CuratorError::Internal(format!("malformed SEO entry: {}", e)))
}

fn apply_update(stored: &mut Document, update: &Document) {
    if let Ok(set) = update.get_document("$set") {
        for (key, value) in set {
            stored.insert(key.clone(), value.clone());
        }
    }
    if let Ok(unset) = update.get_document("$unset") {
        for key in unset.keys() {
            stored.remove(key);
        }
    }
    if !matches!(stored.get("metadata"), Some(Bson::Document(_))) {
        stored.insert("metadata", Document::new());
    }
    if let Ok(metadata) = stored.get_document_mut("metadata") {
        metadata.insert("updated_at", DateTime::now());
    }
}

#[async_trait::async_trait]
impl SeoStore for MemorySeoStore {
    async fn find_by_link(&self, kind: ContentKind, record_id: &ObjectId) -> Result<Option<SeoMetadataDoc>> {
        lock(&self.docs)
            .iter()
            .find(|d| d.get_object_id(kind.link_field()).ok() == Some(*record_id))
            .map(decode)
            .transpose()
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<SeoMetadataDoc>> {
        lock(&self.docs)
            .iter()
            .find(|d| has_slug(d, slug))
            .map(decode)
            .transpose()
    }

    async fn insert(&self, mut doc: SeoMetadataDoc) -> Result<ObjectId> {
        let mut docs = lock(&self.docs);
        if Self::slug_taken(&docs, &doc.slug, None) {
            return Err(CuratorError::Conflict(format!("duplicate slug '{}'", doc.slug)));
        }
        let id = ObjectId::new();
        doc.id = Some(id);
        doc.metadata = Metadata::new();
        let raw = bson::to_document(&doc)
            .map_err(|e| CuratorError::Internal(format!("cannot encode SEO entry: {}", e)))?;
        docs.push(raw);
        Ok(id)
    }

    async fn update(&self, doc: &SeoMetadataDoc) -> Result<bool> {
        let mut docs = lock(&self.docs);
        if Self::slug_taken(&docs, &doc.slug, doc.id) {
            return Err(CuratorError::Conflict(format!("duplicate slug '{}'", doc.slug)));
        }
        let Some(id) = doc.id else {
            return Ok(false);
        };
        match docs.iter_mut().find(|d| d.get_object_id("_id").ok() == Some(id)) {
            Some(stored) => {
                apply_update(stored, &doc.update_document());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        let mut docs = lock(&self.docs);
        let before = docs.len();
        docs.retain(|d| !has_slug(d, slug));
        Ok(docs.len() != before)
    }
}

/// `ContentStore` keyed by kind and id
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    records: Mutex<HashMap<(ContentKind, ObjectId), ContentSummary>>,
    unavailable: Mutex<bool>,
}

impl MemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: ContentKind, slug: &str, title: &str) -> ObjectId {
        let id = ObjectId::new();
        lock(&self.records).insert(
            (kind, id),
            ContentSummary {
                id,
                slug: slug.to_string(),
                title: title.to_string(),
            },
        );
        id
    }

    pub fn get(&self, kind: ContentKind, id: &ObjectId) -> Option<ContentSummary> {
        lock(&self.records).get(&(kind, *id)).cloned()
    }

    /// Make every call fail, as if the database were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        *lock(&self.unavailable) = unavailable;
    }

    fn check_available(&self) -> Result<()> {
        if *lock(&self.unavailable) {
            Err(CuratorError::Database("content store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait::async_trait]
impl ContentStore for MemoryContentStore {
    async fn find(&self, kind: ContentKind, record_id: &ObjectId) -> Result<Option<ContentSummary>> {
        self.check_available()?;
        Ok(self.get(kind, record_id))
    }

    async fn rename(&self, kind: ContentKind, record_id: &ObjectId, slug: &str, title: &str) -> Result<bool> {
        self.check_available()?;
        match lock(&self.records).get_mut(&(kind, *record_id)) {
            Some(record) => {
                record.slug = slug.to_string();
                record.title = title.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
