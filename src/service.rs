//! Entry point tying traversal, enrichment and saved runs together.

use std::sync::Arc;

use crate::cache::{CacheStats, TtlCache};
use crate::config::{Config, TraversalSettings};
use crate::db::Db;
use crate::enrich::PayloadEnricher;
use crate::error::Result;
use crate::graph::{GraphTraversalEngine, TraversalConfig};
use crate::model::{EnrichedTraversal, TraversalResult};
use crate::repository::{ODataClient, ObjectRepository, RelationshipQueryClient};
use crate::runs::{RunIndex, SavedPayload, SavedRun, SqliteRunStore, StoredRun};

/// Traversal service over one repository and one saved-run index.
///
/// The query cache lives as long as the service and is shared by every
/// traversal and enrichment it runs.
pub struct TraceService {
    query: Arc<RelationshipQueryClient>,
    engine: GraphTraversalEngine,
    enricher: PayloadEnricher,
    runs: RunIndex,
    defaults: TraversalConfig,
}

impl TraceService {
    pub fn new(
        repository: Arc<dyn ObjectRepository>,
        runs: RunIndex,
        settings: &TraversalSettings,
    ) -> Self {
        let cache = Arc::new(TtlCache::new(settings.cache_capacity, settings.cache_ttl()));
        let query = Arc::new(RelationshipQueryClient::new(
            repository,
            Some(cache),
            settings.lookup_delay(),
        ));

        Self {
            engine: GraphTraversalEngine::new(query.clone()),
            enricher: PayloadEnricher::new(query.clone()),
            query,
            runs,
            defaults: TraversalConfig::from(settings),
        }
    }

    /// OData repository and SQLite run store as configured.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let repository = Arc::new(ODataClient::from_config(config)?);
        let store = SqliteRunStore::open(Db::new(config.db_path())).await?;
        let runs = RunIndex::new(Arc::new(store), config.storage.key_prefix.clone());
        Ok(Self::new(repository, runs, &config.traversal))
    }

    /// Bounds used when a traversal is not given its own.
    pub fn defaults(&self) -> &TraversalConfig {
        &self.defaults
    }

    pub async fn traverse(
        &self,
        seed_id: &str,
        workspace: &str,
        config: Option<&TraversalConfig>,
    ) -> Result<TraversalResult> {
        self.engine
            .traverse(seed_id, workspace, config.unwrap_or(&self.defaults))
            .await
    }

    pub async fn enrich(&self, result: &TraversalResult) -> EnrichedTraversal {
        self.enricher.enrich(result).await
    }

    pub async fn save_run(&self, payload: impl Into<SavedPayload>) -> Option<String> {
        self.runs.save(payload).await
    }

    pub async fn load_run(&self, key: &str) -> Option<StoredRun> {
        self.runs.load(key).await
    }

    pub async fn list_runs(&self) -> Vec<SavedRun> {
        self.runs.list_all().await
    }

    pub async fn remove_run(&self, key: &str) -> bool {
        self.runs.remove(key).await
    }

    pub async fn clear_runs(&self) -> bool {
        self.runs.clear().await
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.query.cache().map(|c| c.stats())
    }

    pub fn clear_cache(&self) {
        if let Some(cache) = self.query.cache() {
            cache.clear();
            log::info!("Query cache cleared");
        }
    }
}
