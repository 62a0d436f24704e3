//! MongoDB client and collection wrappers
//!
//! `MongoCollection<T>` serves typed schemas that declare their own indexes.
//! `RecordCollection` serves the CMS content collections, whose shapes curator
//! does not know; their documents are handed out as JSON trees.

use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use mongodb::{
    error::{Error as MongoError, ErrorKind, WriteFailure},
    options::IndexOptions,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::info;

use crate::db::schemas::Metadata;
use crate::types::CuratorError;

const DUPLICATE_KEY: i32 = 11000;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Map a driver error, keeping unique index violations distinguishable
fn map_mongo_err(action: &str, e: MongoError) -> CuratorError {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => {
            CuratorError::Conflict(we.message.clone())
        }
        _ => CuratorError::Database(format!("{} failed: {}", action, e)),
    }
}

/// Parse a hex ObjectId coming from a caller
pub fn parse_object_id(id: &str) -> Result<ObjectId, CuratorError> {
    ObjectId::parse_str(id.trim())
        .map_err(|_| CuratorError::NotFound(format!("'{}' is not a valid record id", id)))
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Create a new MongoDB client
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, CuratorError> {
        info!("Connecting to MongoDB at {}", uri);

        // Use serverSelectionTimeoutMS to avoid hanging on unreachable MongoDB
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| CuratorError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| CuratorError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, creating its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, CuratorError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    /// Get an untyped content collection
    pub fn records(&self, name: &str) -> RecordCollection {
        RecordCollection {
            inner: self.client.database(&self.db_name).collection::<Document>(name),
        }
    }
}

/// Typed MongoDB collection with automatic indexing
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + IntoIndexes + MutMetadata,
{
    /// Create a new collection and apply indexes
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, CuratorError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    /// Apply schema-defined indexes
    async fn apply_indexes(&self) -> Result<(), CuratorError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| CuratorError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, CuratorError> {
        let metadata = item.mut_metadata();
        metadata.created_at = Some(DateTime::now());
        metadata.updated_at = Some(DateTime::now());

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| map_mongo_err("Insert", e))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| CuratorError::Database("Failed to get inserted ID".into()))
    }

    /// Find one document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, CuratorError> {
        self.inner
            .find_one(filter)
            .await
            .map_err(|e| map_mongo_err("Find", e))
    }

    /// Apply an update document to one match, bumping `metadata.updated_at`.
    /// Fields the update does not name are left as stored.
    pub async fn update_one(&self, filter: Document, mut update: Document) -> Result<bool, CuratorError> {
        if !matches!(update.get("$set"), Some(Bson::Document(_))) {
            update.insert("$set", Document::new());
        }
        if let Ok(set) = update.get_document_mut("$set") {
            set.insert("metadata.updated_at", DateTime::now());
        }

        let result = self
            .inner
            .update_one(filter, update)
            .await
            .map_err(|e| map_mongo_err("Update", e))?;

        Ok(result.matched_count > 0)
    }

    /// Hard delete one document. Returns whether anything was removed.
    pub async fn delete_one(&self, filter: Document) -> Result<bool, CuratorError> {
        let result = self
            .inner
            .delete_one(filter)
            .await
            .map_err(|e| map_mongo_err("Delete", e))?;

        Ok(result.deleted_count > 0)
    }
}

/// Content collection read and written as raw documents
#[derive(Debug, Clone)]
pub struct RecordCollection {
    inner: Collection<Document>,
}

impl RecordCollection {
    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Load a record by id as a JSON tree
    pub async fn find_by_id(&self, id: &ObjectId) -> Result<Option<Value>, CuratorError> {
        let found = self
            .inner
            .find_one(doc! { "_id": *id })
            .await
            .map_err(|e| map_mongo_err("Find", e))?;

        Ok(found.map(|d| Bson::Document(d).into_relaxed_extjson()))
    }

    /// `$set` the given fields on a record. Returns whether it matched.
    pub async fn set_fields(&self, id: &ObjectId, fields: Document) -> Result<bool, CuratorError> {
        let result = self
            .inner
            .update_one(doc! { "_id": *id }, doc! { "$set": fields })
            .await
            .map_err(|e| map_mongo_err("Update", e))?;

        Ok(result.matched_count > 0)
    }

    pub async fn delete_by_id(&self, id: &ObjectId) -> Result<bool, CuratorError> {
        let result = self
            .inner
            .delete_one(doc! { "_id": *id })
            .await
            .map_err(|e| map_mongo_err("Delete", e))?;

        Ok(result.deleted_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_object_id() {
        let id = ObjectId::new();
        assert_eq!(parse_object_id(&id.to_hex()).unwrap(), id);
        assert_eq!(parse_object_id(&format!(" {} ", id.to_hex())).unwrap(), id);
        assert!(matches!(
            parse_object_id("not-an-id"),
            Err(CuratorError::NotFound(_))
        ));
    }
}
