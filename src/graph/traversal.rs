//! Bounded recursive discovery from a seed object.

use futures_util::future::{join_all, BoxFuture, FutureExt};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;

use super::aggregate::ResultAggregator;
use crate::config::TraversalSettings;
use crate::error::{RelgraphError, Result};
use crate::model::{ArchitectureObject, Relation, TraversalResult};
use crate::repository::{ObjectQuery, RelationshipQueryClient};
use crate::resolve::ResolverChain;

/// Per-call traversal bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraversalConfig {
    pub max_depth: usize,
    /// Cap on new objects claimed per expanded object.
    pub max_objects_per_level: usize,
    pub cache_enabled: bool,
    /// Remote calls in flight at once across sibling branches.
    pub max_concurrency: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_objects_per_level: 100,
            cache_enabled: true,
            max_concurrency: 4,
        }
    }
}

impl From<&TraversalSettings> for TraversalConfig {
    fn from(settings: &TraversalSettings) -> Self {
        Self {
            max_depth: settings.max_depth,
            max_objects_per_level: settings.max_objects_per_level,
            cache_enabled: settings.cache_enabled,
            max_concurrency: settings.max_concurrency,
        }
    }
}

/// An object found during discovery and the hop count it was found at.
#[derive(Debug, Clone)]
pub struct DiscoveredObject {
    pub object: ArchitectureObject,
    pub depth: usize,
}

/// Flat output of discovery: unique objects plus every relation seen.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub objects: Vec<DiscoveredObject>,
    pub relations: Vec<Relation>,
}

/// State shared by every branch of one traversal call.
struct RunContext<'a> {
    workspace: &'a str,
    config: &'a TraversalConfig,
    query: &'a RelationshipQueryClient,
    resolver: &'a ResolverChain,
    visited: Mutex<HashSet<String>>,
    relations: Mutex<(HashSet<String>, Vec<Relation>)>,
    permits: Semaphore,
}

impl RunContext<'_> {
    fn record_relations(&self, relations: &[Relation]) {
        let mut guard = self.relations.lock().unwrap();
        let (seen, all) = &mut *guard;
        for rel in relations {
            if seen.insert(rel.dedup_key()) {
                all.push(rel.clone());
            }
        }
    }

    /// Claim unvisited neighbours of `object_id`. Check-and-insert happens
    /// under one lock, so concurrent branches never claim the same ID.
    fn claim_neighbours(&self, object_id: &str, relations: &[Relation]) -> Vec<String> {
        let mut candidates: Vec<&str> = Vec::new();
        for rel in relations {
            for id in [rel.source_id.as_str(), rel.target_id.as_str()] {
                if id != object_id && !id.is_empty() && !candidates.contains(&id) {
                    candidates.push(id);
                }
            }
        }

        let cap = self.config.max_objects_per_level;
        let mut visited = self.visited.lock().unwrap();
        let mut claimed = Vec::new();
        let mut skipped = 0usize;
        for id in candidates {
            if visited.contains(id) {
                continue;
            }
            if claimed.len() >= cap {
                skipped += 1;
                continue;
            }
            visited.insert(id.to_string());
            claimed.push(id.to_string());
        }
        if skipped > 0 {
            log::warn!(
                "Object {} has {} more related objects than max_objects_per_level ({}); skipped",
                object_id,
                skipped,
                cap
            );
        }
        claimed
    }

    /// Hand back claimed IDs that did not resolve, so another branch that
    /// reaches them can try again.
    fn release_unresolved(&self, claimed: &[String], resolved: &[ArchitectureObject]) {
        let found: HashSet<&str> = resolved.iter().map(|o| o.id.as_str()).collect();
        let mut visited = self.visited.lock().unwrap();
        for id in claimed {
            if !found.contains(id.as_str()) {
                visited.remove(id);
            }
        }
    }
}

/// Discovers the objects transitively related to a seed
///
/// Expansion of one object: fetch its relations, claim the unvisited IDs on
/// either endpoint, resolve them, then expand each resolved object one level
/// deeper. Sibling subtrees run concurrently; remote calls are bounded by
/// `max_concurrency`. Remote failures read as "nothing found" and never abort
/// the walk.
pub struct GraphTraversalEngine {
    query: Arc<RelationshipQueryClient>,
    resolver: Option<Arc<ResolverFactory>>,
    aggregator: ResultAggregator,
}

/// Builds the resolution chain for one run from that run's query client.
pub type ResolverFactory = dyn Fn(Arc<RelationshipQueryClient>) -> ResolverChain + Send + Sync;

impl GraphTraversalEngine {
    pub fn new(query: Arc<RelationshipQueryClient>) -> Self {
        Self {
            query,
            resolver: None,
            aggregator: ResultAggregator,
        }
    }

    /// Use a custom resolution chain instead of batch-then-per-ID.
    ///
    /// The factory receives the client for each run, which bypasses the
    /// cache when the run has caching disabled.
    pub fn with_resolver<F>(mut self, factory: F) -> Self
    where
        F: Fn(Arc<RelationshipQueryClient>) -> ResolverChain + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(factory));
        self
    }

    fn query_for(&self, config: &TraversalConfig) -> Arc<RelationshipQueryClient> {
        if config.cache_enabled {
            self.query.clone()
        } else {
            Arc::new(self.query.without_cache())
        }
    }

    fn resolver_for(&self, query: &Arc<RelationshipQueryClient>) -> ResolverChain {
        match &self.resolver {
            Some(factory) => factory(query.clone()),
            None => ResolverChain::standard(query.clone(), ObjectQuery::summary()),
        }
    }

    /// Discover, classify and aggregate everything reachable from `seed_id`.
    ///
    /// Fails only when the input is empty or the seed itself cannot be
    /// resolved in `workspace`.
    pub async fn traverse(
        &self,
        seed_id: &str,
        workspace: &str,
        config: &TraversalConfig,
    ) -> Result<TraversalResult> {
        if seed_id.trim().is_empty() {
            return Err(RelgraphError::InvalidInput("seed object id is empty".into()));
        }
        if workspace.trim().is_empty() {
            return Err(RelgraphError::InvalidInput("workspace is empty".into()));
        }

        let start = Instant::now();
        let query = self.query_for(config);
        let resolver = self.resolver_for(&query);
        let (hits_before, misses_before) = query.cache_counters();

        log::info!(
            "Starting relationship traversal from {} in workspace {} (max depth {})",
            seed_id,
            workspace,
            config.max_depth
        );

        let seed = resolver
            .resolve(&[seed_id.to_string()], workspace)
            .await
            .into_iter()
            .next()
            .ok_or_else(|| RelgraphError::SeedNotFound {
                id: seed_id.to_string(),
                workspace: workspace.to_string(),
            })?;

        let discovery = self
            .discover_with(&seed.id, workspace, config, &query, &resolver)
            .await;

        let (hits, misses) = query.cache_counters();
        let run_hits = hits.saturating_sub(hits_before);
        let lookups = run_hits + misses.saturating_sub(misses_before);
        let cache_hit_rate = if lookups == 0 {
            0.0
        } else {
            run_hits as f64 / lookups as f64
        };

        let result = self.aggregator.aggregate(
            seed,
            workspace,
            discovery,
            config.max_depth,
            start.elapsed(),
            cache_hit_rate,
        );

        log::info!(
            "Traversal of {} completed in {}ms: {} objects ({} business processes, {} application services, {} application interfaces, {} deliverables, {} related functions)",
            result.seed_name,
            result.traversal_metadata.processing_time_ms,
            result.traversal_metadata.total_objects_found,
            result.business_processes.len(),
            result.application_services.len(),
            result.application_interfaces.len(),
            result.deliverables.len(),
            result.related_application_functions.len(),
        );

        Ok(result)
    }

    /// Flat discovery from `seed_id`, seed excluded.
    pub async fn discover(
        &self,
        seed_id: &str,
        workspace: &str,
        config: &TraversalConfig,
    ) -> Discovery {
        let query = self.query_for(config);
        let resolver = self.resolver_for(&query);
        self.discover_with(seed_id, workspace, config, &query, &resolver)
            .await
    }

    async fn discover_with(
        &self,
        seed_id: &str,
        workspace: &str,
        config: &TraversalConfig,
        query: &RelationshipQueryClient,
        resolver: &ResolverChain,
    ) -> Discovery {
        let ctx = RunContext {
            workspace,
            config,
            query,
            resolver,
            visited: Mutex::new(HashSet::from([seed_id.to_string()])),
            relations: Mutex::new((HashSet::new(), Vec::new())),
            permits: Semaphore::new(config.max_concurrency.max(1)),
        };

        let objects = expand(seed_id.to_string(), 0, &ctx).await;
        let (_, relations) = ctx.relations.into_inner().unwrap_or_else(|e| e.into_inner());

        Discovery { objects, relations }
    }
}

fn expand<'a>(
    object_id: String,
    depth: usize,
    ctx: &'a RunContext<'a>,
) -> BoxFuture<'a, Vec<DiscoveredObject>> {
    async move {
        if depth >= ctx.config.max_depth {
            log::debug!("Max depth {} reached at {}", ctx.config.max_depth, object_id);
            return Vec::new();
        }

        let relations = {
            let _permit = ctx.permits.acquire().await;
            ctx.query.get_relationships(&object_id, ctx.workspace).await
        };
        if relations.is_empty() {
            return Vec::new();
        }
        ctx.record_relations(&relations);

        let claimed = ctx.claim_neighbours(&object_id, &relations);
        log::debug!(
            "Depth {}: {} relations, {} new related ids for {}",
            depth,
            relations.len(),
            claimed.len(),
            object_id
        );
        if claimed.is_empty() {
            return Vec::new();
        }

        let resolved = {
            let _permit = ctx.permits.acquire().await;
            ctx.resolver.resolve(&claimed, ctx.workspace).await
        };
        ctx.release_unresolved(&claimed, &resolved);
        for object in &resolved {
            log::debug!("  {} [{}] {}", object.id, object.definition, object.title);
        }

        let deeper = join_all(
            resolved
                .iter()
                .map(|object| expand(object.id.clone(), depth + 1, ctx)),
        )
        .await;

        let mut found: Vec<DiscoveredObject> = resolved
            .into_iter()
            .map(|object| DiscoveredObject {
                object,
                depth: depth + 1,
            })
            .collect();
        found.extend(deeper.into_iter().flatten());
        found
    }
    .boxed()
}
