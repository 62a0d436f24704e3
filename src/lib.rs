//! Curator - image lifecycle and SEO metadata sync for the CMS
//!
//! Two pieces of bookkeeping the content CRUD layer calls into:
//!
//! - [`images`]: knows where image references live inside each record type
//!   and deletes remote images that an update replaces or a delete orphans.
//! - [`seo`]: keeps the slug-keyed SEO metadata collection in step with the
//!   Service and HirePage records that own entries in it.
//!
//! Both are best-effort with respect to the primary write. Cleanup failures
//! are logged and reported, never raised; SEO sync failures can be logged
//! and swallowed with the `*_quietly` helpers.

pub mod config;
pub mod db;
pub mod images;
pub mod seo;
pub mod storage;
pub mod types;

pub use config::Args;
pub use images::{CleanupReport, ImageLifecycle, ImageRegistry};
pub use seo::{SeoDefaults, SeoSync};
pub use storage::{AssetGateway, DeleteOutcome};
pub use types::{CuratorError, Result};
