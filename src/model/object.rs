//! Repository records: architecture objects and the relations between them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Scalar value of an extended (repository-specific) object field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON value; nulls, arrays and objects have no scalar form.
    pub fn from_json(value: serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(FieldValue::Bool(b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(FieldValue::Integer(i)),
                None => n.as_f64().map(FieldValue::Float),
            },
            serde_json::Value::String(s) => Some(FieldValue::Text(s)),
            _ => None,
        }
    }
}

/// Semantic type of an object, derived from its `Definition` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    BusinessProcess,
    ApplicationService,
    ApplicationInterface,
    ApplicationFunction,
    Deliverable,
}

impl ObjectKind {
    /// Kinds the relationship query is restricted to.
    pub const TRAVERSABLE: [ObjectKind; 5] = [
        ObjectKind::ApplicationFunction,
        ObjectKind::ApplicationService,
        ObjectKind::ApplicationInterface,
        ObjectKind::BusinessProcess,
        ObjectKind::Deliverable,
    ];

    pub fn from_definition(definition: &str) -> Option<Self> {
        match definition {
            "Business Process" => Some(ObjectKind::BusinessProcess),
            "Application Service" => Some(ObjectKind::ApplicationService),
            "Application Interface" => Some(ObjectKind::ApplicationInterface),
            "Application Function" => Some(ObjectKind::ApplicationFunction),
            "Deliverable" => Some(ObjectKind::Deliverable),
            _ => None,
        }
    }

    /// The `Definition` tag used by the repository.
    pub fn definition(&self) -> &'static str {
        match self {
            ObjectKind::BusinessProcess => "Business Process",
            ObjectKind::ApplicationService => "Application Service",
            ObjectKind::ApplicationInterface => "Application Interface",
            ObjectKind::ApplicationFunction => "Application Function",
            ObjectKind::Deliverable => "Deliverable",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.definition())
    }
}

/// An entity stored in the remote repository. Identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawObject")]
pub struct ArchitectureObject {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Definition")]
    pub definition: String,
    #[serde(rename = "Workspace")]
    pub workspace: String,
    /// Every other scalar column the repository returned.
    #[serde(flatten)]
    pub extended_fields: BTreeMap<String, FieldValue>,
}

/// Wire shape: remote payloads carry nulls and nested values we don't keep.
#[derive(Deserialize)]
struct RawObject {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Title", default)]
    title: Option<String>,
    #[serde(rename = "Definition", default)]
    definition: Option<String>,
    #[serde(rename = "Workspace", default)]
    workspace: Option<String>,
    #[serde(flatten)]
    rest: BTreeMap<String, serde_json::Value>,
}

impl From<RawObject> for ArchitectureObject {
    fn from(raw: RawObject) -> Self {
        let extended_fields = raw
            .rest
            .into_iter()
            .filter_map(|(k, v)| FieldValue::from_json(v).map(|v| (k, v)))
            .collect();
        Self {
            id: raw.id,
            title: raw.title.unwrap_or_default(),
            definition: raw.definition.unwrap_or_default(),
            workspace: raw.workspace.unwrap_or_default(),
            extended_fields,
        }
    }
}

impl ArchitectureObject {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        definition: impl Into<String>,
        workspace: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            definition: definition.into(),
            workspace: workspace.into(),
            extended_fields: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> Option<ObjectKind> {
        ObjectKind::from_definition(&self.definition)
    }

    /// Number of extended fields whose name starts with one of `prefixes`.
    pub fn count_fields_with_prefix(&self, prefixes: &[&str]) -> usize {
        self.extended_fields
            .keys()
            .filter(|k| prefixes.iter().any(|p| k.starts_with(p)))
            .count()
    }
}

/// An edge between two objects as returned by the relations query.
/// `source_id` is the owning side for hierarchical relation types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    #[serde(rename = "RelationshipId", default)]
    pub relationship_id: String,
    #[serde(rename = "BlueDolphinObjectItemId")]
    pub source_id: String,
    #[serde(rename = "RelatedBlueDolphinObjectItemId")]
    pub target_id: String,
    #[serde(rename = "BlueDolphinObjectDefinitionName", default, skip_serializing_if = "Option::is_none")]
    pub source_definition: Option<String>,
    #[serde(rename = "RelatedBlueDolphinObjectDefinitionName", default, skip_serializing_if = "Option::is_none")]
    pub target_definition: Option<String>,
    #[serde(rename = "Type", default, skip_serializing_if = "Option::is_none")]
    pub relation_type: Option<String>,
    #[serde(rename = "Name", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "BlueDolphinObjectWorkspaceName", default, skip_serializing_if = "Option::is_none")]
    pub source_workspace: Option<String>,
    #[serde(rename = "RelatedBlueDolphinObjectWorkspaceName", default, skip_serializing_if = "Option::is_none")]
    pub target_workspace: Option<String>,
}

impl Relation {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            relationship_id: String::new(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            source_definition: None,
            target_definition: None,
            relation_type: Some(relation_type.into()),
            name: None,
            source_workspace: None,
            target_workspace: None,
        }
    }

    pub fn touches(&self, object_id: &str) -> bool {
        self.source_id == object_id || self.target_id == object_id
    }

    /// Composition and realization encode containment; nothing else does.
    pub fn is_hierarchical(&self) -> bool {
        matches!(
            self.relation_type.as_deref(),
            Some(t) if t.eq_ignore_ascii_case("composition") || t.eq_ignore_ascii_case("realization")
        )
    }

    /// Key used to drop the same edge seen from both endpoints.
    pub fn dedup_key(&self) -> String {
        if self.relationship_id.is_empty() {
            format!(
                "{}|{}|{}",
                self.source_id,
                self.target_id,
                self.relation_type.as_deref().unwrap_or_default()
            )
        } else {
            self.relationship_id.clone()
        }
    }
}
