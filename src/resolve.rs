//! Ordered ID-resolution strategies.
//!
//! A `ResolverChain` hands the IDs still unresolved after one strategy to the
//! next. The default chain is a batch `ID in (...)` lookup followed by paced
//! single-ID lookups, for services that reject or mishandle the batch form.
//! IDs that no strategy resolves are dropped.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

use crate::model::ArchitectureObject;
use crate::repository::{ObjectQuery, RelationshipQueryClient};

#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolve what it can; never fails, may return a subset.
    async fn resolve(&self, ids: &[String], workspace: &str) -> Vec<ArchitectureObject>;
}

/// One `objects_by_ids` request for the whole set.
pub struct BatchLookup {
    query: Arc<RelationshipQueryClient>,
    options: ObjectQuery,
}

impl BatchLookup {
    pub fn new(query: Arc<RelationshipQueryClient>, options: ObjectQuery) -> Self {
        Self { query, options }
    }
}

#[async_trait]
impl ResolutionStrategy for BatchLookup {
    fn name(&self) -> &'static str {
        "batch"
    }

    async fn resolve(&self, ids: &[String], workspace: &str) -> Vec<ArchitectureObject> {
        self.query.get_objects_by_ids(ids, workspace, &self.options).await
    }
}

/// One paced request per ID.
pub struct PerIdLookup {
    query: Arc<RelationshipQueryClient>,
    extended: bool,
}

impl PerIdLookup {
    pub fn new(query: Arc<RelationshipQueryClient>, extended: bool) -> Self {
        Self { query, extended }
    }
}

#[async_trait]
impl ResolutionStrategy for PerIdLookup {
    fn name(&self) -> &'static str {
        "per-id"
    }

    async fn resolve(&self, ids: &[String], workspace: &str) -> Vec<ArchitectureObject> {
        let mut objects = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(object) = self.query.get_object_by_id(id, workspace, self.extended).await {
                objects.push(object);
            }
        }
        objects
    }
}

#[derive(Clone)]
pub struct ResolverChain {
    strategies: Vec<Arc<dyn ResolutionStrategy>>,
}

impl ResolverChain {
    pub fn new(strategies: Vec<Arc<dyn ResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Batch lookup, then per-ID lookup for whatever the batch missed.
    pub fn standard(query: Arc<RelationshipQueryClient>, options: ObjectQuery) -> Self {
        let extended = options.extended;
        Self::new(vec![
            Arc::new(BatchLookup::new(query.clone(), options)) as Arc<dyn ResolutionStrategy>,
            Arc::new(PerIdLookup::new(query, extended)),
        ])
    }

    /// Resolve `ids`; each object appears at most once and only if requested.
    pub async fn resolve(&self, ids: &[String], workspace: &str) -> Vec<ArchitectureObject> {
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        let mut resolved: Vec<ArchitectureObject> = Vec::with_capacity(ids.len());
        let mut seen: HashSet<String> = HashSet::new();
        let mut pending: Vec<String> = ids.to_vec();

        for strategy in &self.strategies {
            if pending.is_empty() {
                break;
            }
            let found = strategy.resolve(&pending, workspace).await;
            let before = resolved.len();
            for object in found {
                if requested.contains(object.id.as_str()) && seen.insert(object.id.clone()) {
                    resolved.push(object);
                }
            }
            log::debug!(
                "Resolution strategy '{}' resolved {}/{} ids",
                strategy.name(),
                resolved.len() - before,
                pending.len()
            );
            pending.retain(|id| !seen.contains(id));
        }

        if !pending.is_empty() {
            log::debug!("Dropping {} unresolvable ids: {:?}", pending.len(), pending);
        }
        resolved
    }
}
