//! Classified objects and the traversal report built from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::object::{ArchitectureObject, ObjectKind};

/// Position of an object in the shallow containment hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    Top,
    Child,
    Grandchild,
}

/// One containment edge walked while building a relationship path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathEdge {
    pub source_id: String,
    pub target_id: String,
}

impl fmt::Display for PathEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", self.source_id, self.target_id)
    }
}

/// An object decorated with its hierarchy placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalObject {
    #[serde(flatten)]
    pub object: ArchitectureObject,
    pub hierarchy_level: HierarchyLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_object_id: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub relationship_path: Vec<PathEdge>,
    /// Type of the first relation touching this object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_name: Option<String>,
}

impl HierarchicalObject {
    pub fn id(&self) -> &str {
        &self.object.id
    }
}

/// Objects of one semantic type split by hierarchy level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelBuckets {
    pub top_level: Vec<HierarchicalObject>,
    pub child_level: Vec<HierarchicalObject>,
    pub grandchild_level: Vec<HierarchicalObject>,
}

impl LevelBuckets {
    pub fn from_classified(objects: Vec<HierarchicalObject>) -> Self {
        let mut buckets = Self::default();
        for obj in objects {
            match obj.hierarchy_level {
                HierarchyLevel::Top => buckets.top_level.push(obj),
                HierarchyLevel::Child => buckets.child_level.push(obj),
                HierarchyLevel::Grandchild => buckets.grandchild_level.push(obj),
            }
        }
        buckets
    }

    pub fn iter(&self) -> impl Iterator<Item = &HierarchicalObject> {
        self.top_level
            .iter()
            .chain(self.child_level.iter())
            .chain(self.grandchild_level.iter())
    }

    pub fn len(&self) -> usize {
        self.top_level.len() + self.child_level.len() + self.grandchild_level.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to every contained object, keeping level placement.
    pub fn map_objects<F>(&self, mut f: F) -> Self
    where
        F: FnMut(&HierarchicalObject) -> HierarchicalObject,
    {
        Self {
            top_level: self.top_level.iter().map(&mut f).collect(),
            child_level: self.child_level.iter().map(&mut f).collect(),
            grandchild_level: self.grandchild_level.iter().map(&mut f).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalMetadata {
    pub total_objects_found: usize,
    pub max_depth_reached: usize,
    pub processing_time_ms: u64,
    pub cache_hit_rate: f64,
}

/// Report of one traversal: the seed plus five semantic groupings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalResult {
    pub seed: ArchitectureObject,
    /// Display label of the seed, used to name saved runs.
    pub seed_name: String,
    pub workspace: String,
    pub business_processes: LevelBuckets,
    pub application_services: LevelBuckets,
    pub application_interfaces: LevelBuckets,
    pub deliverables: LevelBuckets,
    pub related_application_functions: LevelBuckets,
    pub traversal_metadata: TraversalMetadata,
}

impl TraversalResult {
    /// The five groupings keyed by the kind they hold.
    pub fn groupings(&self) -> [(ObjectKind, &LevelBuckets); 5] {
        [
            (ObjectKind::BusinessProcess, &self.business_processes),
            (ObjectKind::ApplicationService, &self.application_services),
            (ObjectKind::ApplicationInterface, &self.application_interfaces),
            (ObjectKind::Deliverable, &self.deliverables),
            (ObjectKind::ApplicationFunction, &self.related_application_functions),
        ]
    }

    /// Every classified object, seed excluded.
    pub fn objects(&self) -> impl Iterator<Item = &HierarchicalObject> {
        self.business_processes
            .iter()
            .chain(self.application_services.iter())
            .chain(self.application_interfaces.iter())
            .chain(self.deliverables.iter())
            .chain(self.related_application_functions.iter())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadMetadata {
    pub total_objects_extracted: usize,
    pub enhanced_fields_available: usize,
    pub workspace_scoped: String,
    pub extraction_timestamp: DateTime<Utc>,
    pub extraction_time_ms: u64,
}

/// A traversal result whose objects carry their full payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichedTraversal {
    #[serde(flatten)]
    pub result: TraversalResult,
    pub payload_metadata: PayloadMetadata,
}
