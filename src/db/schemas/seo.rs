//! SEO metadata document schema
//!
//! One document per public slug. A document is either managed by hand
//! (`linkedType: "independent"`) or owned by exactly one Service or HirePage
//! record, in which case `isAutoManaged` is set and the matching link field
//! holds that record's id.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for SEO metadata
pub const SEO_COLLECTION: &str = "seo_metadata";

/// Content record types that own a public slug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Service,
    Hire,
}

impl ContentKind {
    pub fn collection(self) -> &'static str {
        match self {
            ContentKind::Service => "services",
            ContentKind::Hire => "hirepages",
        }
    }

    /// Field on the SEO document that links to this kind
    pub fn link_field(self) -> &'static str {
        match self {
            ContentKind::Service => "linkedService",
            ContentKind::Hire => "linkedHirePage",
        }
    }

    pub fn linked_type(self) -> LinkedType {
        match self {
            ContentKind::Service => LinkedType::Service,
            ContentKind::Hire => LinkedType::Hire,
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ContentKind::Service => "service",
            ContentKind::Hire => "hire",
        })
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "service" | "services" => Ok(ContentKind::Service),
            "hire" | "hirepage" | "hirepages" => Ok(ContentKind::Hire),
            other => Err(format!("unknown content kind '{}'", other)),
        }
    }
}

/// What an SEO document describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkedType {
    Service,
    Hire,
    #[default]
    Independent,
}

impl LinkedType {
    pub fn as_str(self) -> &'static str {
        match self {
            LinkedType::Service => "service",
            LinkedType::Hire => "hire",
            LinkedType::Independent => "independent",
        }
    }
}

/// SEO metadata document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SeoMetadataDoc {
    /// MongoDB document ID
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at)
    #[serde(default)]
    pub metadata: Metadata,

    /// Public slug, unique across the collection
    pub slug: String,

    pub title: String,

    #[serde(default)]
    pub seo_title: String,

    #[serde(default)]
    pub meta_description: String,

    #[serde(default)]
    pub seo_keyphrase: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,

    #[serde(rename = "linkedType", default)]
    pub linked_type: LinkedType,

    #[serde(rename = "isAutoManaged", default)]
    pub is_auto_managed: bool,

    #[serde(rename = "linkedService", default, skip_serializing_if = "Option::is_none")]
    pub linked_service: Option<ObjectId>,

    #[serde(rename = "linkedHirePage", default, skip_serializing_if = "Option::is_none")]
    pub linked_hire_page: Option<ObjectId>,
}

impl SeoMetadataDoc {
    /// A hand-managed entry
    pub fn independent(slug: &str, title: &str) -> Self {
        Self {
            slug: slug.to_string(),
            title: title.to_string(),
            metadata: Metadata::new(),
            ..Default::default()
        }
    }

    /// The content record this entry is owned by, if any
    pub fn linked_record(&self) -> Option<(ContentKind, ObjectId)> {
        match self.linked_type {
            LinkedType::Service => self.linked_service.map(|id| (ContentKind::Service, id)),
            LinkedType::Hire => self.linked_hire_page.map(|id| (ContentKind::Hire, id)),
            LinkedType::Independent => None,
        }
    }

    /// Hand ownership to a content record, clearing any other link
    pub fn link_to(&mut self, kind: ContentKind, record_id: ObjectId) {
        self.linked_type = kind.linked_type();
        self.is_auto_managed = true;
        match kind {
            ContentKind::Service => {
                self.linked_service = Some(record_id);
                self.linked_hire_page = None;
            }
            ContentKind::Hire => {
                self.linked_hire_page = Some(record_id);
                self.linked_service = None;
            }
        }
    }

    /// `isAutoManaged` ⇔ linked type is service/hire ⇔ exactly one link set
    pub fn is_consistent(&self) -> bool {
        let links = usize::from(self.linked_service.is_some())
            + usize::from(self.linked_hire_page.is_some());
        match self.linked_type {
            LinkedType::Independent => !self.is_auto_managed && links == 0,
            LinkedType::Service => {
                self.is_auto_managed && links == 1 && self.linked_service.is_some()
            }
            LinkedType::Hire => {
                self.is_auto_managed && links == 1 && self.linked_hire_page.is_some()
            }
        }
    }

    /// `$set`/`$unset` update covering only the fields sync owns.
    ///
    /// The CMS writes to the same collection, so anything not modeled here
    /// (its own timestamps, `__v`, extra SEO fields) must survive a sync.
    pub fn update_document(&self) -> Document {
        let mut set = doc! {
            "slug": self.slug.as_str(),
            "title": self.title.as_str(),
            "seo_title": self.seo_title.as_str(),
            "meta_description": self.meta_description.as_str(),
            "seo_keyphrase": self.seo_keyphrase.as_str(),
            "linkedType": self.linked_type.as_str(),
            "isAutoManaged": self.is_auto_managed,
        };
        let mut unset = Document::new();

        for (field, link) in [
            ("linkedService", self.linked_service),
            ("linkedHirePage", self.linked_hire_page),
        ] {
            match link {
                Some(id) => {
                    set.insert(field, id);
                }
                None => {
                    unset.insert(field, "");
                }
            }
        }

        let mut update = doc! { "$set": set };
        if !unset.is_empty() {
            update.insert("$unset", unset);
        }
        update
    }
}

impl IntoIndexes for SeoMetadataDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on slug
            (
                doc! { "slug": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("slug_unique".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "linkedService": 1 },
                Some(
                    IndexOptions::builder()
                        .sparse(true)
                        .name("linked_service_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "linkedHirePage": 1 },
                Some(
                    IndexOptions::builder()
                        .sparse(true)
                        .name("linked_hire_page_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for SeoMetadataDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
