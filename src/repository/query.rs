use std::sync::Arc;
use std::time::Duration;

use super::{ObjectQuery, ObjectRepository, RequestPacer};
use crate::cache::{keys, TtlCache};
use crate::model::{ArchitectureObject, Relation};

/// Cached query results. One cache holds both query kinds; the key prefix
/// keeps them apart.
#[derive(Debug, Clone)]
pub enum QueryPayload {
    Relations(Vec<Relation>),
    Objects(Vec<ArchitectureObject>),
}

/// Repository queries as the traversal consumes them
///
/// Failures are logged and read as "nothing found" so one bad request never
/// aborts a traversal. Only non-empty results are cached; an empty or failed
/// lookup is retried the next time it is asked.
pub struct RelationshipQueryClient {
    repository: Arc<dyn ObjectRepository>,
    cache: Option<Arc<TtlCache<QueryPayload>>>,
    pacer: Arc<RequestPacer>,
}

impl RelationshipQueryClient {
    pub fn new(
        repository: Arc<dyn ObjectRepository>,
        cache: Option<Arc<TtlCache<QueryPayload>>>,
        lookup_delay: Duration,
    ) -> Self {
        Self {
            repository,
            cache,
            pacer: Arc::new(RequestPacer::new(lookup_delay)),
        }
    }

    pub fn cache(&self) -> Option<&Arc<TtlCache<QueryPayload>>> {
        self.cache.as_ref()
    }

    /// Same repository, pacer and cache, with caching switched off.
    pub fn without_cache(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            cache: None,
            pacer: self.pacer.clone(),
        }
    }

    fn cached(&self, key: &str) -> Option<QueryPayload> {
        self.cache.as_ref().and_then(|c| c.get(key))
    }

    fn remember(&self, key: String, payload: QueryPayload) {
        if let Some(cache) = &self.cache {
            cache.set(key, payload);
        }
    }

    /// Relations touching `object_id` in `workspace`; empty on failure.
    pub async fn get_relationships(&self, object_id: &str, workspace: &str) -> Vec<Relation> {
        let key = keys::relationships_key(object_id, workspace);
        if let Some(QueryPayload::Relations(relations)) = self.cached(&key) {
            log::debug!("Cache hit for relationships of {}", object_id);
            return relations;
        }

        match self.repository.relations_for(object_id, workspace).await {
            Ok(relations) => {
                log::debug!("Found {} relationships for {}", relations.len(), object_id);
                if !relations.is_empty() {
                    self.remember(key, QueryPayload::Relations(relations.clone()));
                }
                relations
            }
            Err(e) => {
                log::warn!("Relationship query for {} failed: {}", object_id, e);
                Vec::new()
            }
        }
    }

    /// Resolve a batch of IDs; missing IDs are omitted, failure yields empty.
    pub async fn get_objects_by_ids(
        &self,
        ids: &[String],
        workspace: &str,
        query: &ObjectQuery,
    ) -> Vec<ArchitectureObject> {
        if ids.is_empty() {
            return Vec::new();
        }
        let key = keys::objects_key(ids, workspace, query.type_filter.as_deref(), query.extended);
        if let Some(QueryPayload::Objects(objects)) = self.cached(&key) {
            log::debug!("Cache hit for {} objects", ids.len());
            return objects;
        }

        match self.repository.objects_by_ids(ids, workspace, query).await {
            Ok(objects) => {
                log::debug!("Batch lookup resolved {}/{} objects", objects.len(), ids.len());
                if !objects.is_empty() {
                    self.remember(key, QueryPayload::Objects(objects.clone()));
                }
                objects
            }
            Err(e) => {
                log::warn!("Batch object lookup ({} ids) failed: {}", ids.len(), e);
                Vec::new()
            }
        }
    }

    /// Resolve one ID. Remote calls are paced across all callers.
    pub async fn get_object_by_id(
        &self,
        id: &str,
        workspace: &str,
        extended: bool,
    ) -> Option<ArchitectureObject> {
        let key = keys::object_key(id, workspace, extended);
        if let Some(QueryPayload::Objects(mut objects)) = self.cached(&key) {
            if !objects.is_empty() {
                return Some(objects.swap_remove(0));
            }
        }

        self.pacer.wait().await;
        match self.repository.object_by_id(id, workspace, extended).await {
            Ok(Some(object)) => {
                self.remember(key, QueryPayload::Objects(vec![object.clone()]));
                Some(object)
            }
            Ok(None) => {
                log::debug!("Object {} not found in workspace {}", id, workspace);
                None
            }
            Err(e) => {
                log::warn!("Lookup of object {} failed: {}", id, e);
                None
            }
        }
    }

    /// (hits, misses) of the underlying cache, zero when caching is off.
    pub fn cache_counters(&self) -> (u64, u64) {
        self.cache.as_ref().map(|c| c.counters()).unwrap_or((0, 0))
    }
}
