//! Containment hierarchy detection over a discovered object set.

use std::collections::{HashMap, HashSet};

use crate::model::{ArchitectureObject, HierarchicalObject, HierarchyLevel, PathEdge, Relation};

/// Assigns top/child/grandchild levels from composition and realization edges
///
/// The source of a hierarchical relation is the parent and the target the
/// child. Relations touching the traversal root are ignored for parent
/// linkage: the seed anchors discovery, it is not a container in the report.
/// Classification is a pure function of its inputs.
#[derive(Debug, Clone)]
pub struct HierarchyClassifier {
    root_id: Option<String>,
    max_path_len: usize,
}

impl Default for HierarchyClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl HierarchyClassifier {
    pub fn new() -> Self {
        Self {
            root_id: None,
            max_path_len: usize::MAX,
        }
    }

    /// Exclude relations touching `root_id` from parent linkage.
    pub fn with_root(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = Some(root_id.into());
        self
    }

    /// Stop relationship paths after `max_path_len` edges.
    pub fn with_max_path_len(mut self, max_path_len: usize) -> Self {
        self.max_path_len = max_path_len;
        self
    }

    pub fn classify(
        &self,
        objects: &[ArchitectureObject],
        relations: &[Relation],
    ) -> Vec<HierarchicalObject> {
        let links = Links::build(relations, self.root_id.as_deref());

        objects
            .iter()
            .map(|object| {
                let id = object.id.as_str();
                let parent = links.child_parent.get(id).copied();
                let grandparent = parent.and_then(|p| links.child_parent.get(p).copied());

                let hierarchy_level = match (parent, grandparent) {
                    (Some(_), Some(_)) => HierarchyLevel::Grandchild,
                    (Some(_), None) => HierarchyLevel::Child,
                    _ => HierarchyLevel::Top,
                };

                let discovered_by = relations.iter().find(|r| r.touches(id));

                HierarchicalObject {
                    object: object.clone(),
                    hierarchy_level,
                    parent_object_id: parent.map(String::from),
                    children: links
                        .parent_children
                        .get(id)
                        .map(|c| c.iter().map(|s| s.to_string()).collect())
                        .unwrap_or_default(),
                    relationship_path: links.path_to(id, self.max_path_len),
                    relationship_type: discovered_by.and_then(|r| r.relation_type.clone()),
                    relationship_name: discovered_by.and_then(|r| r.name.clone()),
                }
            })
            .collect()
    }
}

/// Parent/child maps built from hierarchical relations.
struct Links<'a> {
    child_parent: HashMap<&'a str, &'a str>,
    parent_children: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Links<'a> {
    fn build(relations: &'a [Relation], root_id: Option<&str>) -> Self {
        let mut child_parent: HashMap<&str, &str> = HashMap::new();
        let mut parent_children: HashMap<&str, Vec<&str>> = HashMap::new();

        for rel in relations.iter().filter(|r| r.is_hierarchical()) {
            let parent = rel.source_id.as_str();
            let child = rel.target_id.as_str();
            if parent == child || root_id.is_some_and(|root| rel.touches(root)) {
                continue;
            }
            // First parent wins when a child has several.
            child_parent.entry(child).or_insert(parent);
            let children = parent_children.entry(parent).or_default();
            if !children.contains(&child) {
                children.push(child);
            }
        }

        Self {
            child_parent,
            parent_children,
        }
    }

    /// Edges from the outermost ancestor down to `id`.
    fn path_to(&self, id: &str, max_len: usize) -> Vec<PathEdge> {
        let mut path = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut current = id;
        visited.insert(current);

        while path.len() < max_len {
            let Some(&parent) = self.child_parent.get(current) else {
                break;
            };
            path.push(PathEdge {
                source_id: parent.to_string(),
                target_id: current.to_string(),
            });
            if !visited.insert(parent) {
                break;
            }
            current = parent;
        }

        path.reverse();
        path
    }
}
