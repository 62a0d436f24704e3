//! SEO metadata ownership and sync

pub mod memory;
pub mod store;
pub mod sync;

pub use memory::{MemoryContentStore, MemorySeoStore};
pub use store::{ContentStore, ContentSummary, MongoContentStore, MongoSeoStore, SeoStore, CONTENT_TITLE_FIELD};
pub use sync::{MetadataDeletion, RenameOutcome, SeoDefaults, SeoSync, SyncError, SyncOutcome};
