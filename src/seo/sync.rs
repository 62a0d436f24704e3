//! Slug-keyed SEO metadata synchronizer
//!
//! Service and HirePage records each own the SEO entry for their public
//! slug. This keeps those entries in step as content records are created,
//! renamed, and deleted, and lets operators rename an owned entry from the
//! SEO admin surface with the change carried back to the content record.
//!
//! ```text
//!   Independent ──(content claims slug)──▶ AutoManaged ──(content deleted)──▶ Deleted
//!        │                                                                    ▲
//!        └──────────────────(operator delete)─────────────────────────────────┘
//! ```
//!
//! Content and metadata are separate aggregates with no transaction between
//! them. Every operation is safe to retry: re-running it once the target
//! state is reached performs no write.

use std::sync::Arc;

use bson::oid::ObjectId;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::store::{ContentStore, SeoStore};
use crate::db::schemas::{ContentKind, LinkedType, SeoMetadataDoc};
use crate::types::CuratorError;

/// Site-wide defaults for generated SEO fields
#[derive(Debug, Clone)]
pub struct SeoDefaults {
    /// Brand appended to generated titles
    pub brand: String,
    /// Meta description template; `{title}` and `{brand}` are substituted
    pub description_template: String,
}

impl Default for SeoDefaults {
    fn default() -> Self {
        Self {
            brand: "Our Company".to_string(),
            description_template: "{title} from {brand}. Talk to our team about your project today."
                .to_string(),
        }
    }
}

impl SeoDefaults {
    pub fn new(brand: &str) -> Self {
        Self {
            brand: brand.to_string(),
            ..Default::default()
        }
    }

    pub fn seo_title(&self, title: &str) -> String {
        if self.brand.is_empty() {
            title.to_string()
        } else {
            format!("{} | {}", title, self.brand)
        }
    }

    pub fn meta_description(&self, title: &str) -> String {
        self.description_template
            .replace("{title}", title)
            .replace("{brand}", &self.brand)
    }

    pub fn keyphrase(&self, title: &str) -> String {
        title.trim().to_lowercase()
    }

    fn fill_missing(&self, doc: &mut SeoMetadataDoc) {
        if doc.seo_title.trim().is_empty() {
            doc.seo_title = self.seo_title(&doc.title);
        }
        if doc.meta_description.trim().is_empty() {
            doc.meta_description = self.meta_description(&doc.title);
        }
        if doc.seo_keyphrase.trim().is_empty() {
            doc.seo_keyphrase = self.keyphrase(&doc.title);
        }
    }
}

/// What a content create/rename did to the SEO collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "id", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// No entry existed; a new owned entry was created
    Created(ObjectId),
    /// An independent entry with the slug was taken over
    Claimed(ObjectId),
    /// The owned entry's slug or title changed
    Updated(ObjectId),
    /// Already in the target state
    Unchanged(ObjectId),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("slug '{slug}' already belongs to another {owner} record")]
    SlugConflict { slug: String, owner: String },

    #[error(transparent)]
    Store(#[from] CuratorError),
}

/// Result of an operator asking to delete an SEO entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum MetadataDeletion {
    Deleted,
    NotFound,
    /// Owned by a content record; delete that record instead
    Blocked { linked_type: LinkedType },
}

impl MetadataDeletion {
    /// Rejection text for the admin surface, when the delete was refused
    pub fn blocked_message(&self) -> Option<String> {
        match self {
            MetadataDeletion::Blocked { linked_type } => {
                let owner = match linked_type {
                    LinkedType::Service => "service",
                    LinkedType::Hire => "hire page",
                    LinkedType::Independent => "content",
                };
                Some(format!(
                    "This SEO entry is managed by a {} record. Delete that {} instead.",
                    owner, owner
                ))
            }
            _ => None,
        }
    }
}

/// Result of renaming an SEO entry from the admin surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum RenameOutcome {
    NotFound,
    /// Hand-managed entry; nothing to carry back
    Independent,
    /// Linked content record now carries the new slug and title
    Propagated { kind: ContentKind, record_id: ObjectId },
    /// Metadata renamed but the linked content record was not updated
    PropagationFailed { kind: ContentKind, record_id: ObjectId },
}

/// Keeps SEO entries in step with the content records that own them
#[derive(Clone)]
pub struct SeoSync {
    seo: Arc<dyn SeoStore>,
    content: Arc<dyn ContentStore>,
    defaults: SeoDefaults,
}

impl SeoSync {
    pub fn new(seo: Arc<dyn SeoStore>, content: Arc<dyn ContentStore>, defaults: SeoDefaults) -> Self {
        Self {
            seo,
            content,
            defaults,
        }
    }

    /// A Service or HirePage record was created or changed its slug/title.
    ///
    /// Looks the entry up by link first, then by slug. An independent entry
    /// with the slug is claimed and an entry owned by this kind is updated in
    /// place, keeping its link. An entry owned by the other kind is a
    /// conflict. Otherwise a new owned entry is created with generated SEO
    /// fields.
    pub async fn on_content_create_or_rename(
        &self,
        title: &str,
        slug: &str,
        kind: ContentKind,
        record_id: ObjectId,
    ) -> Result<SyncOutcome, SyncError> {
        let existing = match self.seo.find_by_link(kind, &record_id).await? {
            Some(doc) => Some(doc),
            None => self.seo.find_by_slug(slug).await?,
        };

        let Some(mut doc) = existing else {
            let mut doc = SeoMetadataDoc::independent(slug, title);
            doc.link_to(kind, record_id);
            self.defaults.fill_missing(&mut doc);

            let id = self
                .seo
                .insert(doc)
                .await
                .map_err(|e| conflict_or_store(e, slug))?;
            info!(kind = %kind, slug = %slug, "Created SEO entry");
            return Ok(SyncOutcome::Created(id));
        };

        let id = doc
            .id
            .ok_or_else(|| CuratorError::Internal(format!("SEO entry '{}' has no id", doc.slug)))?;

        // An entry owned by the same kind keeps its link, even when found by
        // slug with a different record id. Only the other kind conflicts.
        let owner_id = match doc.linked_record() {
            Some((owner_kind, _)) if owner_kind != kind => {
                return Err(SyncError::SlugConflict {
                    slug: slug.to_string(),
                    owner: owner_kind.to_string(),
                });
            }
            Some((_, owner_id)) => owner_id,
            None => record_id,
        };
        if owner_id != record_id {
            warn!(
                kind = %kind,
                slug = %slug,
                linked = %owner_id,
                id = %record_id,
                "SEO entry is linked to another record; keeping its link"
            );
        }

        let claimed = !doc.is_auto_managed;
        if !claimed && doc.slug == slug && doc.title == title && doc.is_consistent() {
            debug!(kind = %kind, slug = %slug, "SEO entry already in sync");
            return Ok(SyncOutcome::Unchanged(id));
        }

        doc.slug = slug.to_string();
        doc.title = title.to_string();
        doc.link_to(kind, owner_id);
        self.defaults.fill_missing(&mut doc);

        self.seo
            .update(&doc)
            .await
            .map_err(|e| conflict_or_store(e, slug))?;

        if claimed {
            info!(kind = %kind, slug = %slug, "Claimed independent SEO entry");
            Ok(SyncOutcome::Claimed(id))
        } else {
            info!(kind = %kind, slug = %slug, "Updated SEO entry");
            Ok(SyncOutcome::Updated(id))
        }
    }

    /// [`Self::on_content_create_or_rename`] for callers whose own write must
    /// not fail because of SEO bookkeeping. Errors are logged.
    pub async fn sync_content_quietly(
        &self,
        title: &str,
        slug: &str,
        kind: ContentKind,
        record_id: ObjectId,
    ) -> Option<SyncOutcome> {
        match self
            .on_content_create_or_rename(title, slug, kind, record_id)
            .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!(kind = %kind, slug = %slug, error = %e, "SEO sync failed; content write kept");
                None
            }
        }
    }

    /// The owning content record was deleted: remove its entry whatever its state.
    pub async fn on_content_delete(&self, slug: &str) -> Result<bool, CuratorError> {
        let deleted = self.seo.delete_by_slug(slug).await?;
        if deleted {
            info!(slug = %slug, "Removed SEO entry with its content record");
        } else {
            debug!(slug = %slug, "No SEO entry to remove");
        }
        Ok(deleted)
    }

    /// Operator delete from the SEO admin surface. Owned entries are refused.
    pub async fn on_metadata_delete_request(&self, slug: &str) -> Result<MetadataDeletion, CuratorError> {
        let Some(doc) = self.seo.find_by_slug(slug).await? else {
            return Ok(MetadataDeletion::NotFound);
        };

        if doc.is_auto_managed {
            warn!(slug = %slug, linked_type = ?doc.linked_type, "Refused delete of managed SEO entry");
            return Ok(MetadataDeletion::Blocked {
                linked_type: doc.linked_type,
            });
        }

        if self.seo.delete_by_slug(slug).await? {
            info!(slug = %slug, "Deleted independent SEO entry");
            Ok(MetadataDeletion::Deleted)
        } else {
            Ok(MetadataDeletion::NotFound)
        }
    }

    /// Operator renamed an SEO entry. Owned entries carry the new slug and
    /// title back to their content record, best-effort.
    pub async fn on_metadata_rename(
        &self,
        old_slug: &str,
        new_slug: &str,
        new_title: &str,
    ) -> Result<RenameOutcome, CuratorError> {
        let doc = match self.seo.find_by_slug(old_slug).await? {
            Some(doc) => Some(doc),
            // Retry after the metadata half already landed
            None if old_slug != new_slug => self.seo.find_by_slug(new_slug).await?,
            None => None,
        };
        let Some(mut doc) = doc else {
            return Ok(RenameOutcome::NotFound);
        };

        if doc.slug != new_slug || doc.title != new_title {
            doc.slug = new_slug.to_string();
            doc.title = new_title.to_string();
            self.seo.update(&doc).await?;
            info!(old_slug = %old_slug, new_slug = %new_slug, "Renamed SEO entry");
        }

        let Some((kind, record_id)) = doc.linked_record().filter(|_| doc.is_auto_managed) else {
            return Ok(RenameOutcome::Independent);
        };

        match self
            .content
            .rename(kind, &record_id, new_slug, new_title)
            .await
        {
            Ok(true) => {
                info!(kind = %kind, id = %record_id, slug = %new_slug, "Carried SEO rename to content record");
                Ok(RenameOutcome::Propagated { kind, record_id })
            }
            Ok(false) => {
                warn!(kind = %kind, id = %record_id, "Linked content record is missing");
                Ok(RenameOutcome::PropagationFailed { kind, record_id })
            }
            Err(e) => {
                warn!(kind = %kind, id = %record_id, error = %e, "Failed to carry SEO rename to content record");
                Ok(RenameOutcome::PropagationFailed { kind, record_id })
            }
        }
    }

    /// Re-run create/rename sync for a stored content record
    pub async fn resync_content(&self, kind: ContentKind, record_id: ObjectId) -> Result<SyncOutcome, SyncError> {
        let record = self.content.find(kind, &record_id).await?.ok_or_else(|| {
            CuratorError::NotFound(format!("{} record {}", kind, record_id))
        })?;
        if record.slug.is_empty() {
            return Err(CuratorError::NotFound(format!("{} record {} has no slug", kind, record_id)).into());
        }
        self.on_content_create_or_rename(&record.title, &record.slug, kind, record_id)
            .await
    }
}

fn conflict_or_store(e: CuratorError, slug: &str) -> SyncError {
    match e {
        CuratorError::Conflict(_) => SyncError::SlugConflict {
            slug: slug.to_string(),
            owner: "SEO".to_string(),
        },
        other => SyncError::Store(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seo::memory::{MemoryContentStore, MemorySeoStore};
    use bson::{doc, DateTime};

    struct Fixture {
        seo: Arc<MemorySeoStore>,
        content: Arc<MemoryContentStore>,
        sync: SeoSync,
    }

    fn fixture() -> Fixture {
        let seo = Arc::new(MemorySeoStore::new());
        let content = Arc::new(MemoryContentStore::new());
        let sync = SeoSync::new(seo.clone(), content.clone(), SeoDefaults::new("Acme"));
        Fixture { seo, content, sync }
    }

    async fn seed_independent(seo: &MemorySeoStore, slug: &str, title: &str) {
        let mut doc = SeoMetadataDoc::independent(slug, title);
        doc.seo_title = "Hand written".to_string();
        seo.insert(doc).await.unwrap();
    }

    #[tokio::test]
    async fn test_claim_independent_then_safe_delete_blocked() {
        let f = fixture();
        seed_independent(&f.seo, "react-dev", "React").await;
        let id1 = ObjectId::new();

        let outcome = f
            .sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, id1)
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Claimed(_)));

        let doc = f.seo.find_by_slug("react-dev").await.unwrap().unwrap();
        assert!(doc.is_auto_managed);
        assert_eq!(doc.linked_type, LinkedType::Service);
        assert_eq!(doc.linked_service, Some(id1));
        assert_eq!(doc.title, "React Dev");
        assert_eq!(doc.seo_title, "Hand written");
        assert!(doc.is_consistent());

        let deletion = f.sync.on_metadata_delete_request("react-dev").await.unwrap();
        assert_eq!(
            deletion,
            MetadataDeletion::Blocked {
                linked_type: LinkedType::Service
            }
        );
        assert!(deletion.blocked_message().unwrap().contains("service"));
        assert_eq!(f.seo.len(), 1);
    }

    #[tokio::test]
    async fn test_create_when_missing() {
        let f = fixture();
        let id = ObjectId::new();

        let outcome = f
            .sync
            .on_content_create_or_rename("New Thing", "new-slug", ContentKind::Hire, id)
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Created(_)));

        let doc = f.seo.find_by_slug("new-slug").await.unwrap().unwrap();
        assert!(doc.is_auto_managed);
        assert_eq!(doc.linked_hire_page, Some(id));
        assert_eq!(doc.seo_title, "New Thing | Acme");
        assert!(doc.meta_description.contains("New Thing"));
        assert_eq!(doc.seo_keyphrase, "new thing");
    }

    #[tokio::test]
    async fn test_force_delete_bypasses_block() {
        let f = fixture();
        f.sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, ObjectId::new())
            .await
            .unwrap();

        assert!(matches!(
            f.sync.on_metadata_delete_request("react-dev").await.unwrap(),
            MetadataDeletion::Blocked { .. }
        ));
        assert!(f.sync.on_content_delete("react-dev").await.unwrap());
        assert!(f.seo.is_empty());
        assert!(!f.sync.on_content_delete("react-dev").await.unwrap());
    }

    #[tokio::test]
    async fn test_independent_delete_allowed() {
        let f = fixture();
        seed_independent(&f.seo, "about-us", "About").await;

        assert_eq!(
            f.sync.on_metadata_delete_request("about-us").await.unwrap(),
            MetadataDeletion::Deleted
        );
        assert_eq!(
            f.sync.on_metadata_delete_request("about-us").await.unwrap(),
            MetadataDeletion::NotFound
        );
    }

    #[tokio::test]
    async fn test_rerun_is_noop() {
        let f = fixture();
        let id = ObjectId::new();
        let first = f
            .sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, id)
            .await
            .unwrap();
        let second = f
            .sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, id)
            .await
            .unwrap();

        let SyncOutcome::Created(created_id) = first else {
            panic!("expected Created, got {:?}", first);
        };
        assert_eq!(second, SyncOutcome::Unchanged(created_id));
        assert_eq!(f.seo.len(), 1);
    }

    #[tokio::test]
    async fn test_rename_found_by_link() {
        let f = fixture();
        let id = ObjectId::new();
        f.sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, id)
            .await
            .unwrap();

        let outcome = f
            .sync
            .on_content_create_or_rename("React Developers", "react-developers", ContentKind::Service, id)
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Updated(_)));
        assert!(f.seo.find_by_slug("react-dev").await.unwrap().is_none());

        let doc = f.seo.find_by_slug("react-developers").await.unwrap().unwrap();
        assert_eq!(doc.title, "React Developers");
        assert_eq!(doc.linked_service, Some(id));
        assert_eq!(f.seo.len(), 1);
    }

    #[tokio::test]
    async fn test_same_kind_owner_found_by_slug_keeps_link() {
        let f = fixture();
        let first = ObjectId::new();
        f.sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, first)
            .await
            .unwrap();

        // A second Service takes the slug while the first one's entry is still linked
        let second = ObjectId::new();
        let outcome = f
            .sync
            .on_content_create_or_rename("React Developers", "react-dev", ContentKind::Service, second)
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Updated(_)));

        let doc = f.seo.find_by_slug("react-dev").await.unwrap().unwrap();
        assert_eq!(doc.title, "React Developers");
        assert_eq!(doc.linked_service, Some(first));
        assert!(doc.is_consistent());
        assert_eq!(f.seo.len(), 1);
    }

    #[tokio::test]
    async fn test_slug_owned_by_other_kind_conflicts() {
        let f = fixture();
        f.sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, ObjectId::new())
            .await
            .unwrap();

        let err = f
            .sync
            .on_content_create_or_rename("React Hire", "react-dev", ContentKind::Hire, ObjectId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SlugConflict { ref owner, .. } if owner == "service"));

        let quiet = f
            .sync
            .sync_content_quietly("React Hire", "react-dev", ContentKind::Hire, ObjectId::new())
            .await;
        assert!(quiet.is_none());
    }

    #[tokio::test]
    async fn test_claim_keeps_fields_it_does_not_own() {
        let f = fixture();
        f.seo.insert_raw(doc! {
            "slug": "react-dev",
            "title": "React",
            "seo_title": "Hand written",
            "linkedType": "independent",
            "isAutoManaged": false,
            "canonical_url": "https://example.com/react",
            "createdAt": DateTime::now(),
            "__v": 3,
        });
        let id = ObjectId::new();

        let outcome = f
            .sync
            .on_content_create_or_rename("React Dev", "react-dev", ContentKind::Service, id)
            .await
            .unwrap();
        assert!(matches!(outcome, SyncOutcome::Claimed(_)));

        let raw = f.seo.raw_by_slug("react-dev").unwrap();
        assert_eq!(raw.get_str("canonical_url").unwrap(), "https://example.com/react");
        assert_eq!(raw.get_i32("__v").unwrap(), 3);
        assert!(raw.contains_key("createdAt"));
        assert_eq!(raw.get_str("seo_title").unwrap(), "Hand written");
        assert_eq!(raw.get_str("title").unwrap(), "React Dev");
        assert_eq!(raw.get_str("linkedType").unwrap(), "service");
        assert_eq!(raw.get_object_id("linkedService").unwrap(), id);
        assert!(!raw.contains_key("linkedHirePage"));

        // Metadata rename goes through the same partial update
        f.sync
            .on_metadata_rename("react-dev", "react-developers", "React Developers")
            .await
            .unwrap();
        let raw = f.seo.raw_by_slug("react-developers").unwrap();
        assert_eq!(raw.get_str("canonical_url").unwrap(), "https://example.com/react");
        assert_eq!(raw.get_i32("__v").unwrap(), 3);
    }

    #[tokio::test]
    async fn test_rename_into_taken_slug_conflicts() {
        let f = fixture();
        seed_independent(&f.seo, "taken", "Taken").await;
        let id = ObjectId::new();
        f.sync
            .on_content_create_or_rename("Mine", "mine", ContentKind::Service, id)
            .await
            .unwrap();

        // Found by link, then the new slug collides with the independent entry
        let err = f
            .sync
            .on_content_create_or_rename("Mine", "taken", ContentKind::Service, id)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SlugConflict { .. }));
    }

    #[tokio::test]
    async fn test_metadata_rename_propagates_to_content() {
        let f = fixture();
        let id = f.content.insert(ContentKind::Hire, "hire-react", "Hire React");
        f.sync.resync_content(ContentKind::Hire, id).await.unwrap();

        let outcome = f
            .sync
            .on_metadata_rename("hire-react", "hire-react-developers", "Hire React Developers")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenameOutcome::Propagated {
                kind: ContentKind::Hire,
                record_id: id
            }
        );

        let record = f.content.get(ContentKind::Hire, &id).unwrap();
        assert_eq!(record.slug, "hire-react-developers");
        assert_eq!(record.title, "Hire React Developers");

        // Retrying after the first attempt landed finds the entry by its new slug
        let retry = f
            .sync
            .on_metadata_rename("hire-react", "hire-react-developers", "Hire React Developers")
            .await
            .unwrap();
        assert!(matches!(retry, RenameOutcome::Propagated { .. }));
    }

    #[tokio::test]
    async fn test_metadata_rename_independent_and_missing() {
        let f = fixture();
        seed_independent(&f.seo, "about-us", "About").await;

        assert_eq!(
            f.sync
                .on_metadata_rename("about-us", "about", "About")
                .await
                .unwrap(),
            RenameOutcome::Independent
        );
        assert!(f.seo.find_by_slug("about").await.unwrap().is_some());
        assert_eq!(
            f.sync.on_metadata_rename("nope", "still-nope", "X").await.unwrap(),
            RenameOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_metadata_rename_survives_content_failure() {
        let f = fixture();
        let id = f.content.insert(ContentKind::Service, "seo-audit", "SEO Audit");
        f.sync.resync_content(ContentKind::Service, id).await.unwrap();
        f.content.set_unavailable(true);

        let outcome = f
            .sync
            .on_metadata_rename("seo-audit", "technical-seo-audit", "Technical SEO Audit")
            .await
            .unwrap();
        assert_eq!(
            outcome,
            RenameOutcome::PropagationFailed {
                kind: ContentKind::Service,
                record_id: id
            }
        );
        assert!(f
            .seo
            .find_by_slug("technical-seo-audit")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_resync_missing_record() {
        let f = fixture();
        let err = f
            .sync
            .resync_content(ContentKind::Service, ObjectId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Store(CuratorError::NotFound(_))));
    }
}
