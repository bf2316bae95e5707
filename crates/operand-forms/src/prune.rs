//! Removal of non-meaningful values from an edited data tree.
//!
//! A form produces a tree full of noise: untouched fields left as null or
//! empty strings, containers that only ever held such noise. None of that may
//! reach the backend as a spurious override, while containers a schema
//! intentionally defaults to `[]` or `{}` must survive. [`prune`] deletes
//! every empty value; [`prune_with_sample`] keeps an empty value wherever a
//! sample tree holds an explicit empty value at the same path.

use serde_json::Value;

/// A value is empty when it is null, a zero-length string, or an object/array
/// without entries.
///
/// Non-finite numbers cannot be represented by the data model and arrive as
/// null, so the null rule covers them.
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(string) => string.is_empty(),
        Value::Object(entries) => entries.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

/// Returns a copy of `data` with every empty value removed.
///
/// Emptiness is decided bottom-up: a container whose children are all removed
/// becomes empty itself and is removed from its parent in turn. Array
/// elements that are removed leave no hole, the remaining elements are
/// compacted. The root is never deleted, only emptied.
pub fn prune(data: &Value) -> Value {
    prune_value(data, None)
}

/// Like [`prune`], but preserves an empty value wherever `sample` holds an
/// explicit empty value at the same path.
///
/// A caller declares "this path may be an empty container in the output" by
/// supplying a sample whose corresponding path already holds that empty
/// shape. Paths absent from the sample are pruned as usual.
pub fn prune_with_sample(data: &Value, sample: &Value) -> Value {
    prune_value(data, Some(sample))
}

fn prune_value(value: &Value, sample: Option<&Value>) -> Value {
    match value {
        Value::Object(entries) => {
            let mut pruned = serde_json::Map::new();
            for (key, child) in entries {
                let child_sample = sample.and_then(|sample| sample.get(key.as_str()));
                let child = prune_value(child, child_sample);
                if !is_empty(&child) || keeps_empty(child_sample) {
                    pruned.insert(key.clone(), child);
                }
            }
            Value::Object(pruned)
        }
        Value::Array(items) => {
            let mut pruned = Vec::new();
            for (index, child) in items.iter().enumerate() {
                let child_sample = sample.and_then(|sample| sample.get(index));
                let child = prune_value(child, child_sample);
                if !is_empty(&child) || keeps_empty(child_sample) {
                    pruned.push(child);
                }
            }
            Value::Array(pruned)
        }
        other => other.clone(),
    }
}

// A field survives pruning while empty only if the sample holds an explicit,
// already-empty value at the same path.
fn keeps_empty(sample: Option<&Value>) -> bool {
    sample.is_some_and(is_empty)
}
