//! Database schemas for curator
//!
//! Curator owns only the SEO metadata collection; content collections are
//! handled as untyped records.

mod metadata;
mod seo;

pub use metadata::Metadata;
pub use seo::{ContentKind, LinkedType, SeoMetadataDoc, SEO_COLLECTION};
