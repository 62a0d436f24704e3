//! Storage seams for the SEO synchronizer
//!
//! The synchronizer only needs a handful of single-document operations on
//! two aggregates: the SEO metadata collection and the content records that
//! own slugs. Each has a MongoDB implementation here.

use bson::{doc, oid::ObjectId};
use tracing::debug;

use crate::db::schemas::{ContentKind, SeoMetadataDoc, SEO_COLLECTION};
use crate::db::{MongoClient, MongoCollection};
use crate::types::{CuratorError, Result};

/// Slug and display title of a Service or HirePage record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSummary {
    pub id: ObjectId,
    pub slug: String,
    pub title: String,
}

/// Field on content records holding the display title
pub const CONTENT_TITLE_FIELD: &str = "subCategory";

/// SEO metadata persistence
#[async_trait::async_trait]
pub trait SeoStore: Send + Sync {
    async fn find_by_link(&self, kind: ContentKind, record_id: &ObjectId) -> Result<Option<SeoMetadataDoc>>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<SeoMetadataDoc>>;
    /// Insert a new document. A taken slug is `CuratorError::Conflict`.
    async fn insert(&self, doc: SeoMetadataDoc) -> Result<ObjectId>;
    /// Write the sync-owned fields onto the stored document with the same id,
    /// leaving every other stored field alone. A taken slug is
    /// `CuratorError::Conflict`.
    async fn update(&self, doc: &SeoMetadataDoc) -> Result<bool>;
    async fn delete_by_slug(&self, slug: &str) -> Result<bool>;
}

/// Content record persistence, limited to what slug sync touches
#[async_trait::async_trait]
pub trait ContentStore: Send + Sync {
    async fn find(&self, kind: ContentKind, record_id: &ObjectId) -> Result<Option<ContentSummary>>;
    /// Write slug and title onto a content record. Returns whether it exists.
    async fn rename(&self, kind: ContentKind, record_id: &ObjectId, slug: &str, title: &str) -> Result<bool>;
}

/// `SeoStore` over the `seo_metadata` collection
#[derive(Clone)]
pub struct MongoSeoStore {
    collection: MongoCollection<SeoMetadataDoc>,
}

impl MongoSeoStore {
    pub async fn new(mongo: &MongoClient) -> Result<Self> {
        let collection = mongo.collection::<SeoMetadataDoc>(SEO_COLLECTION).await?;
        Ok(Self { collection })
    }
}

#[async_trait::async_trait]
impl SeoStore for MongoSeoStore {
    async fn find_by_link(&self, kind: ContentKind, record_id: &ObjectId) -> Result<Option<SeoMetadataDoc>> {
        self.collection
            .find_one(doc! { kind.link_field(): *record_id })
            .await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<SeoMetadataDoc>> {
        self.collection.find_one(doc! { "slug": slug }).await
    }

    async fn insert(&self, doc: SeoMetadataDoc) -> Result<ObjectId> {
        self.collection.insert_one(doc).await
    }

    async fn update(&self, doc: &SeoMetadataDoc) -> Result<bool> {
        let id = doc
            .id
            .ok_or_else(|| CuratorError::Internal(format!("SEO entry '{}' has no id", doc.slug)))?;
        self.collection
            .update_one(doc! { "_id": id }, doc.update_document())
            .await
    }

    async fn delete_by_slug(&self, slug: &str) -> Result<bool> {
        self.collection.delete_one(doc! { "slug": slug }).await
    }
}

/// `ContentStore` over the services and hirepages collections
#[derive(Clone)]
pub struct MongoContentStore {
    mongo: MongoClient,
}

impl MongoContentStore {
    pub fn new(mongo: MongoClient) -> Self {
        Self { mongo }
    }
}

#[async_trait::async_trait]
impl ContentStore for MongoContentStore {
    async fn find(&self, kind: ContentKind, record_id: &ObjectId) -> Result<Option<ContentSummary>> {
        let Some(record) = self.mongo.records(kind.collection()).find_by_id(record_id).await? else {
            return Ok(None);
        };

        let field = |name: &str| {
            record
                .get(name)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        };

        Ok(Some(ContentSummary {
            id: *record_id,
            slug: field("slug"),
            title: field(CONTENT_TITLE_FIELD),
        }))
    }

    async fn rename(&self, kind: ContentKind, record_id: &ObjectId, slug: &str, title: &str) -> Result<bool> {
        debug!(kind = %kind, id = %record_id, slug = %slug, "Writing slug back to content record");
        self.mongo
            .records(kind.collection())
            .set_fields(record_id, doc! { "slug": slug, CONTENT_TITLE_FIELD: title })
            .await
    }
}
