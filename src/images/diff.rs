//! Positional old/new comparison of image references
//!
//! Sequences are compared index by index. A reorder without any content
//! change therefore looks like a replacement here; the lifecycle manager
//! guards against deleting references the new document still holds.

use serde_json::Value;

use crate::images::path::{FieldPath, Segment};

/// References at `path` in `old` that were removed or replaced in `new`.
///
/// If the old side cannot be located along the path nothing is reported.
/// An absent new side counts as a removal.
pub fn diff(old: &Value, new: &Value, path: &FieldPath) -> Vec<String> {
    let mut out = Vec::new();
    diff_at(Some(old), Some(new), path.segments(), &mut out);
    out
}

fn diff_at(old: Option<&Value>, new: Option<&Value>, segments: &[Segment], out: &mut Vec<String>) {
    let Some((segment, rest)) = segments.split_first() else {
        compare_leaf(old, new, out);
        return;
    };

    let Some(old_child) = old.and_then(|v| v.get(segment.name())) else {
        return;
    };
    let new_child = new.and_then(|v| v.get(segment.name()));

    match segment {
        Segment::Field(_) => diff_at(Some(old_child), new_child, rest, out),
        Segment::Each(_) => {
            let Some(old_items) = old_child.as_array() else {
                return;
            };
            let new_items = new_child.and_then(Value::as_array);

            for (i, old_item) in old_items.iter().enumerate() {
                let new_item = new_items.and_then(|items| items.get(i));
                diff_at(Some(old_item), new_item, rest, out);
            }
        }
    }
}

fn compare_leaf(old: Option<&Value>, new: Option<&Value>, out: &mut Vec<String>) {
    match old {
        Some(Value::String(old_ref)) => {
            if !old_ref.is_empty() && new.and_then(Value::as_str) != Some(old_ref.as_str()) {
                out.push(old_ref.clone());
            }
        }
        Some(Value::Array(old_items)) => {
            let new_items = new.and_then(Value::as_array);
            for (i, item) in old_items.iter().enumerate() {
                let Some(old_ref) = item.as_str().filter(|s| !s.is_empty()) else {
                    continue;
                };
                let new_ref = new_items.and_then(|items| items.get(i)).and_then(Value::as_str);
                if new_ref != Some(old_ref) {
                    out.push(old_ref.to_string());
                }
            }
        }
        _ => {}
    }
}
