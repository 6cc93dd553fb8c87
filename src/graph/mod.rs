//! Relationship graph discovery and the report built from it.
//!
//! `traversal` walks the remote graph from a seed, `hierarchy` places each
//! discovered object in the containment hierarchy, and `aggregate` groups
//! the result by semantic type.

mod aggregate;
mod hierarchy;
mod traversal;

pub use aggregate::ResultAggregator;
pub use hierarchy::HierarchyClassifier;
pub use traversal::{
    DiscoveredObject, Discovery, GraphTraversalEngine, ResolverFactory, TraversalConfig,
};
