use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::store::RunStore;
use crate::model::{EnrichedTraversal, TraversalResult};

/// A saved result: enriched or plain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SavedPayload {
    Enriched(EnrichedTraversal),
    Plain(TraversalResult),
}

impl SavedPayload {
    pub fn result(&self) -> &TraversalResult {
        match self {
            SavedPayload::Enriched(enriched) => &enriched.result,
            SavedPayload::Plain(result) => result,
        }
    }
}

impl From<TraversalResult> for SavedPayload {
    fn from(result: TraversalResult) -> Self {
        SavedPayload::Plain(result)
    }
}

impl From<EnrichedTraversal> for SavedPayload {
    fn from(enriched: EnrichedTraversal) -> Self {
        SavedPayload::Enriched(enriched)
    }
}

/// The JSON document written for one saved run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredRun {
    pub storage_key: String,
    pub saved_at: DateTime<Utc>,
    pub workspace_filter: String,
    #[serde(flatten)]
    pub payload: SavedPayload,
}

/// Listing entry for a saved run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRun {
    pub key: String,
    pub function_name: String,
    pub saved_at: DateTime<Utc>,
    pub workspace_filter: String,
    pub total_objects_found: usize,
    pub enriched: bool,
}

/// Saved traversal runs over a `RunStore`
///
/// Keeps its own list of keys under `{prefix}Index`. Storage failures are
/// logged and surface as `None`/`false`/empty, never as errors.
pub struct RunIndex {
    store: Arc<dyn RunStore>,
    prefix: String,
    index_lock: Mutex<()>,
}

impl RunIndex {
    pub fn new(store: Arc<dyn RunStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            index_lock: Mutex::new(()),
        }
    }

    fn index_key(&self) -> String {
        format!("{}Index", self.prefix)
    }

    async fn read_index(&self) -> Vec<String> {
        match self.store.get(&self.index_key()).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Saved-run index is corrupt, starting a new one: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("Failed to read saved-run index: {}", e);
                Vec::new()
            }
        }
    }

    async fn write_index(&self, keys: &[String]) -> bool {
        let raw = match serde_json::to_string(keys) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Failed to encode saved-run index: {}", e);
                return false;
            }
        };
        match self.store.set(&self.index_key(), &raw).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to write saved-run index: {}", e);
                false
            }
        }
    }

    /// Persist `payload`; returns the generated key.
    pub async fn save(&self, payload: impl Into<SavedPayload>) -> Option<String> {
        let payload = payload.into();
        let saved_at = Utc::now();
        let result = payload.result();
        let key = format!(
            "{}_{}_{}",
            self.prefix,
            result.seed_name,
            saved_at.timestamp_millis()
        );
        let run = StoredRun {
            storage_key: key.clone(),
            saved_at,
            workspace_filter: result.workspace.clone(),
            payload,
        };

        let raw = match serde_json::to_string(&run) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("Failed to encode run {}: {}", key, e);
                return None;
            }
        };
        if let Err(e) = self.store.set(&key, &raw).await {
            log::warn!("Failed to save run {}: {}", key, e);
            return None;
        }

        let _guard = self.index_lock.lock().await;
        let mut keys = self.read_index().await;
        if !keys.contains(&key) {
            keys.push(key.clone());
        }
        if !self.write_index(&keys).await {
            // Unindexed runs are never listed.
            if let Err(e) = self.store.remove(&key).await {
                log::warn!("Run {} left behind without an index entry: {}", key, e);
            }
            return None;
        }
        log::info!("Saved traversal run {}", key);
        Some(key)
    }

    pub async fn load(&self, key: &str) -> Option<StoredRun> {
        let raw = match self.store.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                log::debug!("No saved run under {}", key);
                return None;
            }
            Err(e) => {
                log::warn!("Failed to load run {}: {}", key, e);
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(run) => Some(run),
            Err(e) => {
                log::warn!("Saved run {} is unreadable: {}", key, e);
                None
            }
        }
    }

    /// Summaries of every indexed run, newest first. Unreadable runs are skipped.
    pub async fn list_all(&self) -> Vec<SavedRun> {
        let keys = self.read_index().await;
        let mut runs = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(run) = self.load(&key).await {
                let result = run.payload.result();
                runs.push(SavedRun {
                    function_name: result.seed_name.clone(),
                    total_objects_found: result.traversal_metadata.total_objects_found,
                    enriched: matches!(run.payload, SavedPayload::Enriched(_)),
                    key,
                    saved_at: run.saved_at,
                    workspace_filter: run.workspace_filter,
                });
            }
        }
        runs.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        runs
    }

    pub async fn remove(&self, key: &str) -> bool {
        if let Err(e) = self.store.remove(key).await {
            log::warn!("Failed to remove run {}: {}", key, e);
            return false;
        }
        let _guard = self.index_lock.lock().await;
        let mut keys = self.read_index().await;
        keys.retain(|k| k != key);
        let ok = self.write_index(&keys).await;
        if ok {
            log::info!("Removed saved run {}", key);
        }
        ok
    }

    /// Remove every saved run, including prefixed keys missing from the index.
    pub async fn clear(&self) -> bool {
        let _guard = self.index_lock.lock().await;
        let mut keys = self.read_index().await;
        match self.store.keys(&format!("{}_", self.prefix)).await {
            Ok(stored) => {
                for key in stored {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
            }
            Err(e) => log::warn!("Failed to enumerate saved runs: {}", e),
        }

        let mut ok = true;
        for key in &keys {
            if let Err(e) = self.store.remove(key).await {
                log::warn!("Failed to remove run {}: {}", key, e);
                ok = false;
            }
        }
        if let Err(e) = self.store.remove(&self.index_key()).await {
            log::warn!("Failed to remove saved-run index: {}", e);
            ok = false;
        }
        log::info!("Cleared {} saved runs", keys.len());
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;
    use crate::error::{RelgraphError, Result};
    use crate::model::{ArchitectureObject, PayloadMetadata, TraversalMetadata};
    use crate::runs::store::{MemoryRunStore, SqliteRunStore};
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn result(seed_name: &str, total: usize) -> TraversalResult {
        TraversalResult {
            seed: ArchitectureObject::new("AF-1", seed_name, "Application Function", "W"),
            seed_name: seed_name.to_string(),
            workspace: "W".to_string(),
            business_processes: Default::default(),
            application_services: Default::default(),
            application_interfaces: Default::default(),
            deliverables: Default::default(),
            related_application_functions: Default::default(),
            traversal_metadata: TraversalMetadata {
                total_objects_found: total,
                ..Default::default()
            },
        }
    }

    fn memory_index() -> RunIndex {
        RunIndex::new(Arc::new(MemoryRunStore::new()), "traversal")
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let index = memory_index();
        let key = index.save(result("Billing", 3)).await.unwrap();

        assert!(key.starts_with("traversal_Billing_"));
        let run = index.load(&key).await.unwrap();
        assert_eq!(run.storage_key, key);
        assert_eq!(run.workspace_filter, "W");
        assert_eq!(run.payload, SavedPayload::Plain(result("Billing", 3)));
    }

    #[tokio::test]
    async fn test_enriched_payload_roundtrips_as_enriched() {
        let index = memory_index();
        let enriched = EnrichedTraversal {
            result: result("Billing", 1),
            payload_metadata: PayloadMetadata {
                total_objects_extracted: 2,
                enhanced_fields_available: 5,
                workspace_scoped: "W".into(),
                extraction_timestamp: Utc::now(),
                extraction_time_ms: 12,
            },
        };
        let key = index.save(enriched.clone()).await.unwrap();

        let run = index.load(&key).await.unwrap();
        assert_eq!(run.payload, SavedPayload::Enriched(enriched));
        assert!(index.list_all().await[0].enriched);
    }

    #[tokio::test]
    async fn test_list_all_newest_first() {
        let index = memory_index();
        index.save(result("First", 1)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        index.save(result("Second", 2)).await.unwrap();

        let runs = index.list_all().await;
        let names: Vec<_> = runs.iter().map(|r| r.function_name.as_str()).collect();
        assert_eq!(names, vec!["Second", "First"]);
        assert_eq!(runs[0].total_objects_found, 2);
    }

    #[tokio::test]
    async fn test_remove_and_clear() {
        let index = memory_index();
        let a = index.save(result("A", 1)).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        index.save(result("B", 1)).await.unwrap();

        assert!(index.remove(&a).await);
        assert!(index.load(&a).await.is_none());
        assert_eq!(index.list_all().await.len(), 1);

        assert!(index.clear().await);
        assert!(index.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_clear_sweeps_unindexed_runs() {
        let store = Arc::new(MemoryRunStore::new());
        store.set("traversal_Orphan_1", "{}").await.unwrap();
        store.set("unrelated", "keep").await.unwrap();
        let index = RunIndex::new(store.clone(), "traversal");

        assert!(index.clear().await);
        assert!(store.get("traversal_Orphan_1").await.unwrap().is_none());
        assert_eq!(store.get("unrelated").await.unwrap().as_deref(), Some("keep"));
    }

    #[tokio::test]
    async fn test_missing_key_is_none() {
        assert!(memory_index().load("traversal_nope_1").await.is_none());
    }

    #[tokio::test]
    async fn test_persists_in_sqlite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("runs.db");

        let key = {
            let store = SqliteRunStore::open(Db::new(&path)).await.unwrap();
            RunIndex::new(Arc::new(store), "traversal")
                .save(result("Billing", 4))
                .await
                .unwrap()
        };

        let store = SqliteRunStore::open(Db::new(&path)).await.unwrap();
        let index = RunIndex::new(Arc::new(store), "traversal");
        let runs = index.list_all().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].key, key);
        assert_eq!(runs[0].total_objects_found, 4);
    }

    struct BrokenStore;

    #[async_trait]
    impl RunStore for BrokenStore {
        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(RelgraphError::Config("read-only".into()))
        }
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(RelgraphError::Config("offline".into()))
        }
        async fn remove(&self, _key: &str) -> Result<()> {
            Err(RelgraphError::Config("read-only".into()))
        }
        async fn keys(&self, _prefix: &str) -> Result<Vec<String>> {
            Err(RelgraphError::Config("offline".into()))
        }
    }

    /// Stores runs but refuses to write the index.
    struct IndexRejectingStore {
        inner: MemoryRunStore,
        index_key: String,
    }

    #[async_trait]
    impl RunStore for IndexRejectingStore {
        async fn set(&self, key: &str, value: &str) -> Result<()> {
            if key == self.index_key {
                return Err(RelgraphError::Config("index is read-only".into()));
            }
            self.inner.set(key, value).await
        }
        async fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key).await
        }
        async fn remove(&self, key: &str) -> Result<()> {
            self.inner.remove(key).await
        }
        async fn keys(&self, prefix: &str) -> Result<Vec<String>> {
            self.inner.keys(prefix).await
        }
    }

    #[tokio::test]
    async fn test_failed_index_write_fails_save_and_drops_run() {
        let store = Arc::new(IndexRejectingStore {
            inner: MemoryRunStore::new(),
            index_key: "traversalIndex".into(),
        });
        let index = RunIndex::new(store.clone(), "traversal");

        assert!(index.save(result("Billing", 3)).await.is_none());
        assert!(index.list_all().await.is_empty());
        assert!(store.inner.keys("traversal").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failures_never_throw() {
        let index = RunIndex::new(Arc::new(BrokenStore), "traversal");

        assert!(index.save(result("A", 1)).await.is_none());
        assert!(index.load("traversal_A_1").await.is_none());
        assert!(index.list_all().await.is_empty());
        assert!(!index.remove("traversal_A_1").await);
        assert!(!index.clear().await);
    }
}
