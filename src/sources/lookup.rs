//! Key lookup inside nested JSON objects.

use std::sync::Arc;

use serde_json::{Map, Value};

/// Finds the value for a key inside a loaded object.
pub type LookupFn = Arc<dyn Fn(&Map<String, Value>, &str) -> Option<Value> + Send + Sync>;

/// Tries `key`, then `key` with `-` replaced by `.`, with `_` replaced by `.`,
/// and with both replaced. Each variant is matched as a direct property
/// first, then as a path (`a.b`, `arr[1]`, `arr.1`).
pub fn default_lookup(object: &Map<String, Value>, key: &str) -> Option<Value> {
    let mut variants: Vec<String> = Vec::with_capacity(4);
    for candidate in [
        key.to_string(),
        key.replace('-', "."),
        key.replace('_', "."),
        key.replace(['-', '_'], "."),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }

    variants.iter().find_map(|variant| {
        object
            .get(variant.as_str())
            .or_else(|| get_path(object, variant))
            .cloned()
    })
}

/// Follows a dotted or bracketed path through objects and arrays.
pub fn get_path<'a>(object: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let segments = split_path(path);
    let (first, rest) = segments.split_first()?;

    let mut current = object.get(*first)?;
    for segment in rest {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn split_path(path: &str) -> Vec<&str> {
    path.split(['.', '[', ']'])
        .filter(|segment| !segment.is_empty())
        .collect()
}
