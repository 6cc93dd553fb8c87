//! In-memory repository fake shared by unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{RelgraphError, Result};
use crate::model::{ArchitectureObject, FieldValue, Relation};
use crate::repository::{ObjectQuery, ObjectRepository};

/// Extended field the fake adds to every object when full payloads are requested.
pub const FAKE_EXTENDED_FIELD: &str = "Object_Properties_Owner";

#[derive(Default)]
pub struct FakeRepository {
    objects: HashMap<String, ArchitectureObject>,
    relations: Vec<Relation>,
    pub fail_relations: AtomicBool,
    pub fail_batch: AtomicBool,
    pub fail_single: AtomicBool,
    pub relation_calls: AtomicUsize,
    pub batch_calls: AtomicUsize,
    pub single_calls: AtomicUsize,
    pub requested_ids: Mutex<Vec<String>>,
    transient_failures: Mutex<HashMap<String, usize>>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, id: &str, definition: &str, workspace: &str) -> Self {
        let obj = ArchitectureObject::new(id, format!("{} title", id), definition, workspace);
        self.objects.insert(id.to_string(), obj);
        self
    }

    pub fn with_relation(mut self, source: &str, target: &str, relation_type: &str) -> Self {
        let mut rel = Relation::new(source, target, relation_type);
        rel.relationship_id = format!("{}-{}", source, target);
        rel.name = Some(format!("{} {}", relation_type, target));
        self.relations.push(rel);
        self
    }

    /// The next `times` lookups that include `id` fail with a 503.
    pub fn with_transient_failures(self, id: &str, times: usize) -> Self {
        self.transient_failures
            .lock()
            .unwrap()
            .insert(id.to_string(), times);
        self
    }

    pub fn requests_for(&self, id: &str) -> usize {
        self.requested_ids
            .lock()
            .unwrap()
            .iter()
            .filter(|requested| requested.as_str() == id)
            .count()
    }

    fn take_transient_failure<'a>(&self, mut ids: impl Iterator<Item = &'a str>) -> Result<()> {
        let mut remaining = self.transient_failures.lock().unwrap();
        let hit = ids.any(|id| match remaining.get_mut(id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        });
        if hit {
            return Err(RelgraphError::Remote {
                status: 503,
                body: "temporarily unavailable".into(),
            });
        }
        Ok(())
    }

    pub fn relation_calls(&self) -> usize {
        self.relation_calls.load(Ordering::SeqCst)
    }

    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::SeqCst)
    }

    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::SeqCst)
    }

    fn in_workspace(&self, id: &str, workspace: &str) -> bool {
        self.objects
            .get(id)
            .map(|o| o.workspace == workspace)
            .unwrap_or(true)
    }

    fn payload(&self, id: &str, workspace: &str, extended: bool) -> Option<ArchitectureObject> {
        let obj = self.objects.get(id).filter(|o| o.workspace == workspace)?;
        let mut obj = obj.clone();
        if extended {
            obj.extended_fields
                .insert(FAKE_EXTENDED_FIELD.to_string(), FieldValue::Text("ops".into()));
        }
        Some(obj)
    }
}

#[async_trait]
impl ObjectRepository for FakeRepository {
    async fn relations_for(&self, object_id: &str, workspace: &str) -> Result<Vec<Relation>> {
        self.relation_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_relations.load(Ordering::SeqCst) {
            return Err(RelgraphError::Remote {
                status: 503,
                body: "unavailable".into(),
            });
        }
        Ok(self
            .relations
            .iter()
            .filter(|r| r.touches(object_id))
            .filter(|r| {
                self.in_workspace(&r.source_id, workspace)
                    && self.in_workspace(&r.target_id, workspace)
            })
            .cloned()
            .collect())
    }

    async fn objects_by_ids(
        &self,
        ids: &[String],
        workspace: &str,
        query: &ObjectQuery,
    ) -> Result<Vec<ArchitectureObject>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_ids.lock().unwrap().extend(ids.iter().cloned());
        if self.fail_batch.load(Ordering::SeqCst) {
            return Err(RelgraphError::Remote {
                status: 400,
                body: "in operator unsupported".into(),
            });
        }
        self.take_transient_failure(ids.iter().map(String::as_str))?;
        Ok(ids
            .iter()
            .filter_map(|id| self.payload(id, workspace, query.extended))
            .filter(|o| {
                query
                    .type_filter
                    .as_deref()
                    .map(|t| o.definition == t)
                    .unwrap_or(true)
            })
            .collect())
    }

    async fn object_by_id(
        &self,
        id: &str,
        workspace: &str,
        extended: bool,
    ) -> Result<Option<ArchitectureObject>> {
        self.single_calls.fetch_add(1, Ordering::SeqCst);
        self.requested_ids.lock().unwrap().push(id.to_string());
        if self.fail_single.load(Ordering::SeqCst) {
            return Err(RelgraphError::Remote {
                status: 500,
                body: "boom".into(),
            });
        }
        self.take_transient_failure(std::iter::once(id))?;
        Ok(self.payload(id, workspace, extended))
    }
}

/// The worked example: AF-1 composes BP-1, associates AS-1; AS-1 composes AI-1.
pub fn example_repository() -> FakeRepository {
    FakeRepository::new()
        .with_object("AF-1", "Application Function", "W")
        .with_object("BP-1", "Business Process", "W")
        .with_object("AS-1", "Application Service", "W")
        .with_object("AI-1", "Application Interface", "W")
        .with_relation("AF-1", "BP-1", "composition")
        .with_relation("AF-1", "AS-1", "association")
        .with_relation("AS-1", "AI-1", "composition")
}
