//! Access to the remote object/relationship repository.
//!
//! `ObjectRepository` is the raw seam (errors propagate); the
//! `RelationshipQueryClient` layered on top adds caching, request pacing
//! and the "failure reads as empty" policy the traversal relies on.

pub mod odata;
pub mod pacer;
pub mod query;

pub use odata::ODataClient;
pub use pacer::RequestPacer;
pub use query::RelationshipQueryClient;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{ArchitectureObject, Relation};

/// Options for object lookups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectQuery {
    /// Restrict results to one `Definition`; `None` means any type.
    pub type_filter: Option<String>,
    /// Request the extended (prefixed) property columns.
    pub extended: bool,
}

impl ObjectQuery {
    pub fn summary() -> Self {
        Self::default()
    }

    pub fn full() -> Self {
        Self {
            type_filter: None,
            extended: true,
        }
    }
}

/// Remote repository operations. Implementations report failures as errors;
/// callers decide how to degrade.
#[async_trait]
pub trait ObjectRepository: Send + Sync {
    /// Relations with `object_id` on either endpoint, both endpoints in
    /// `workspace`, related side restricted to the traversable kinds.
    async fn relations_for(&self, object_id: &str, workspace: &str) -> Result<Vec<Relation>>;

    /// Resolve a batch of IDs. Unknown IDs are omitted from the result.
    async fn objects_by_ids(
        &self,
        ids: &[String],
        workspace: &str,
        query: &ObjectQuery,
    ) -> Result<Vec<ArchitectureObject>>;

    /// Resolve a single ID.
    async fn object_by_id(
        &self,
        id: &str,
        workspace: &str,
        extended: bool,
    ) -> Result<Option<ArchitectureObject>>;
}
