//! Nested image reference tracking
//!
//! Records are handled as generic JSON trees. A per-type registry of path
//! descriptors says where image references live; the resolver collects them
//! and the differ finds the ones an update replaces or drops.

pub mod diff;
pub mod lifecycle;
pub mod path;
pub mod registry;
pub mod resolve;

pub use diff::diff;
pub use lifecycle::{CleanupReport, ImageLifecycle, DEFAULT_MAX_CONCURRENT_DELETES};
pub use path::{FieldPath, Segment};
pub use registry::{ImageRegistry, RecordImages};
pub use resolve::{resolve_all, resolve_paths};
