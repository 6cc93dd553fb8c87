//! Full-payload enrichment of a finished traversal.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use crate::model::{
    ArchitectureObject, EnrichedTraversal, HierarchicalObject, PayloadMetadata, TraversalResult,
};
use crate::repository::{ObjectQuery, RelationshipQueryClient};
use crate::resolve::ResolverChain;

/// Extended-field name prefixes that count as enhanced data.
pub const ENHANCED_FIELD_PREFIXES: [&str; 3] = [
    "Object_Properties_",
    "Deliverable_Object_Status_",
    "Ameff_properties_",
];

/// Swaps every object in a result for its full-column payload
///
/// Hierarchy placement, parents, children and paths are carried over as is.
/// An object whose payload cannot be fetched keeps its summary record.
pub struct PayloadEnricher {
    resolver: ResolverChain,
}

impl PayloadEnricher {
    pub fn new(query: Arc<RelationshipQueryClient>) -> Self {
        Self {
            resolver: ResolverChain::standard(query, ObjectQuery::full()),
        }
    }

    pub async fn enrich(&self, result: &TraversalResult) -> EnrichedTraversal {
        let start = Instant::now();
        let ids = distinct_ids(result);
        log::info!(
            "Fetching full payloads for {} objects in workspace {}",
            ids.len(),
            result.workspace
        );

        let payloads: HashMap<String, ArchitectureObject> = self
            .resolver
            .resolve(&ids, &result.workspace)
            .await
            .into_iter()
            .map(|object| (object.id.clone(), object))
            .collect();
        if payloads.len() < ids.len() {
            log::warn!(
                "Full payload missing for {}/{} objects; keeping summary records",
                ids.len() - payloads.len(),
                ids.len()
            );
        }

        let substitute = |classified: &HierarchicalObject| HierarchicalObject {
            object: payloads
                .get(classified.id())
                .cloned()
                .unwrap_or_else(|| classified.object.clone()),
            ..classified.clone()
        };

        let enriched = TraversalResult {
            seed: payloads
                .get(&result.seed.id)
                .cloned()
                .unwrap_or_else(|| result.seed.clone()),
            seed_name: result.seed_name.clone(),
            workspace: result.workspace.clone(),
            business_processes: result.business_processes.map_objects(substitute),
            application_services: result.application_services.map_objects(substitute),
            application_interfaces: result.application_interfaces.map_objects(substitute),
            deliverables: result.deliverables.map_objects(substitute),
            related_application_functions: result
                .related_application_functions
                .map_objects(substitute),
            traversal_metadata: result.traversal_metadata.clone(),
        };

        let representative = ids.iter().find_map(|id| payloads.get(id));
        let payload_metadata = PayloadMetadata {
            total_objects_extracted: payloads.len(),
            enhanced_fields_available: representative
                .map(|o| o.count_fields_with_prefix(&ENHANCED_FIELD_PREFIXES))
                .unwrap_or(0),
            workspace_scoped: result.workspace.clone(),
            extraction_timestamp: Utc::now(),
            extraction_time_ms: start.elapsed().as_millis() as u64,
        };

        log::info!(
            "Payload extraction completed in {}ms: {} objects, {} enhanced fields",
            payload_metadata.extraction_time_ms,
            payload_metadata.total_objects_extracted,
            payload_metadata.enhanced_fields_available
        );

        EnrichedTraversal {
            result: enriched,
            payload_metadata,
        }
    }
}

/// Seed first, then every classified object, each ID once.
fn distinct_ids(result: &TraversalResult) -> Vec<String> {
    let mut seen = HashSet::new();
    std::iter::once(result.seed.id.as_str())
        .chain(result.objects().map(|o| o.id()))
        .filter(|id| seen.insert(*id))
        .map(String::from)
        .collect()
}
