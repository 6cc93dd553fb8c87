//! Data model shared by traversal, enrichment and saved runs.

mod object;
mod result;

pub use object::{ArchitectureObject, FieldValue, ObjectKind, Relation};
pub use result::{
    EnrichedTraversal, HierarchicalObject, HierarchyLevel, LevelBuckets, PathEdge,
    PayloadMetadata, TraversalMetadata, TraversalResult,
};
