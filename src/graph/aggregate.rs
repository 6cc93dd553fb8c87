use std::collections::HashSet;
use std::time::Duration;

use super::hierarchy::HierarchyClassifier;
use super::traversal::Discovery;
use crate::model::{
    ArchitectureObject, LevelBuckets, ObjectKind, Relation, TraversalMetadata, TraversalResult,
};

/// Turns a flat discovery into the grouped, classified report.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAggregator;

impl ResultAggregator {
    pub fn aggregate(
        &self,
        seed: ArchitectureObject,
        workspace: &str,
        discovery: Discovery,
        max_depth: usize,
        elapsed: Duration,
        cache_hit_rate: f64,
    ) -> TraversalResult {
        let mut seen: HashSet<String> = HashSet::from([seed.id.clone()]);
        let mut by_kind: [Vec<ArchitectureObject>; 5] = Default::default();
        let mut deepest_hop = 0;
        for found in discovery.objects {
            let object = found.object;
            if !seen.insert(object.id.clone()) {
                continue;
            }
            match object.kind().map(slot) {
                Some(i) => {
                    deepest_hop = deepest_hop.max(found.depth.min(max_depth));
                    by_kind[i].push(object);
                }
                None => log::debug!(
                    "Skipping {} with ungrouped definition '{}'",
                    object.id,
                    object.definition
                ),
            }
        }

        let relations = scoped_relations(discovery.relations, &seen);
        let classifier = HierarchyClassifier::new()
            .with_root(seed.id.clone())
            .with_max_path_len(max_depth);

        let [business_processes, application_services, application_interfaces, deliverables, related_application_functions] =
            by_kind.map(|objects| LevelBuckets::from_classified(classifier.classify(&objects, &relations)));

        let mut result = TraversalResult {
            seed_name: display_name(&seed),
            seed,
            workspace: workspace.to_string(),
            business_processes,
            application_services,
            application_interfaces,
            deliverables,
            related_application_functions,
            traversal_metadata: TraversalMetadata::default(),
        };

        // A reported object is never shallower than the hop it was found at,
        // even when no containment path leads to it.
        let longest_path = result
            .objects()
            .map(|o| o.relationship_path.len())
            .max()
            .unwrap_or(0);
        result.traversal_metadata = TraversalMetadata {
            total_objects_found: result.objects().count(),
            max_depth_reached: longest_path.max(deepest_hop),
            processing_time_ms: elapsed.as_millis() as u64,
            cache_hit_rate,
        };
        result
    }
}

/// Index of the grouping a kind lands in, matching `TraversalResult::groupings`.
fn slot(kind: ObjectKind) -> usize {
    match kind {
        ObjectKind::BusinessProcess => 0,
        ObjectKind::ApplicationService => 1,
        ObjectKind::ApplicationInterface => 2,
        ObjectKind::Deliverable => 3,
        ObjectKind::ApplicationFunction => 4,
    }
}

/// Relations whose endpoints are both inside the traversal scope.
fn scoped_relations(relations: Vec<Relation>, in_scope: &HashSet<String>) -> Vec<Relation> {
    relations
        .into_iter()
        .filter(|r| in_scope.contains(&r.source_id) && in_scope.contains(&r.target_id))
        .collect()
}

fn display_name(seed: &ArchitectureObject) -> String {
    if seed.title.trim().is_empty() {
        seed.id.clone()
    } else {
        seed.title.clone()
    }
}
