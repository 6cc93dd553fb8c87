//! Deterministic cache keys built from query shape.

/// Key for "relations touching `object_id` within `workspace`".
pub fn relationships_key(object_id: &str, workspace: &str) -> String {
    format!("relationships:{}:{}", workspace, object_id)
}

/// Key for a batch object lookup. ID order does not matter.
pub fn objects_key(
    ids: &[String],
    workspace: &str,
    type_filter: Option<&str>,
    extended: bool,
) -> String {
    let mut sorted: Vec<&str> = ids.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    format!(
        "objects:{}:{}:{}:{}",
        workspace,
        type_filter.unwrap_or("Any"),
        if extended { "full" } else { "summary" },
        sorted.join(",")
    )
}

/// Key for a single-object lookup.
pub fn object_key(id: &str, workspace: &str, extended: bool) -> String {
    format!(
        "object:{}:{}:{}",
        workspace,
        if extended { "full" } else { "summary" },
        id
    )
}
