//! Collect every image reference reachable at a path

use std::collections::HashSet;

use serde_json::Value;

use crate::images::path::{FieldPath, Segment};

/// Resolve all image references at `path` inside `document`.
///
/// Missing fields and unexpected shapes along the way are treated as
/// absent. A terminal sequence contributes its string elements; empty
/// strings and non-string leaves are dropped. Each reference appears once.
pub fn resolve_all(document: &Value, path: &FieldPath) -> Vec<String> {
    let mut working: Vec<&Value> = vec![document];

    for segment in path.segments() {
        working = match segment {
            Segment::Field(name) => working.into_iter().filter_map(|n| n.get(name)).collect(),
            Segment::Each(name) => working
                .into_iter()
                .filter_map(|n| n.get(name).and_then(Value::as_array))
                .flatten()
                .collect(),
        };
        if working.is_empty() {
            return Vec::new();
        }
    }

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for leaf in working {
        for reference in leaf_strings(leaf) {
            if seen.insert(reference) {
                out.push(reference.to_string());
            }
        }
    }
    out
}

/// Resolve every path and merge the results without duplicates.
pub fn resolve_paths<'a, I>(document: &Value, paths: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a FieldPath>,
{
    let mut seen = HashSet::new();
    paths
        .into_iter()
        .flat_map(|p| resolve_all(document, p))
        .filter(|r| seen.insert(r.clone()))
        .collect()
}

fn leaf_strings(leaf: &Value) -> Vec<&str> {
    match leaf {
        Value::String(s) if !s.is_empty() => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
