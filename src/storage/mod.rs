//! Remote asset deletion
//!
//! The lifecycle manager talks to remote storage only through
//! [`AssetGateway`]. Deleting something that is already gone is a success.

mod cloudinary;
mod memory;

pub use cloudinary::{
    asset_id_from_reference, CloudinaryConfig, CloudinaryGateway, SignatureAlgorithm,
};
pub use memory::MemoryAssetStore;

use crate::types::Result;

/// Terminal result of a deletion request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The remote object existed and was removed
    Deleted,
    /// Nothing to remove; counts as success
    NotFound,
    /// The reference was not produced by our uploads, no call was made
    Skipped(String),
}

impl DeleteOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DeleteOutcome::Deleted | DeleteOutcome::NotFound)
    }
}

/// Deletes remote objects by image reference
#[async_trait::async_trait]
pub trait AssetGateway: Send + Sync {
    async fn delete(&self, reference: &str) -> Result<DeleteOutcome>;
}
