//! Key resolution against an ordered list of sources.
//!
//! Sources are asked in list order and the first one answering with a value
//! wins; later sources are not asked for that key. A key no source knows is
//! simply absent from the result. Whether that is an error is decided later,
//! during substitution.

use serde_json::{Map, Value};
use tracing::trace;

use super::source::ConfigSource;
use crate::ConfigError;

/// Resolves every key in `keys` against `sources`, in key order.
pub async fn resolve_keys<'a, I>(
    keys: I,
    sources: &[Box<dyn ConfigSource>],
) -> Result<Map<String, Value>, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut key_values = Map::new();

    for key in keys {
        if let Some((index, value)) = resolve_key(key, sources).await? {
            trace!(key, source_index = index, "resolved config key");
            key_values.insert(key.to_string(), value);
        } else {
            trace!(key, "no source knows config key");
        }
    }

    Ok(key_values)
}

/// Returns the first value any source holds for `key`, with that source's index.
async fn resolve_key(
    key: &str,
    sources: &[Box<dyn ConfigSource>],
) -> Result<Option<(usize, Value)>, ConfigError> {
    for (index, source) in sources.iter().enumerate() {
        let value = source
            .get(key)
            .await
            .map_err(|e| ConfigError::ResolveValue {
                key: key.to_string(),
                source_index: index,
                source_name: source.name().into_owned(),
                source: e,
            })?;

        if let Some(value) = value {
            return Ok(Some((index, value)));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FnSource, MemorySource};
    use crate::BoxError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(data: Value, calls: Arc<AtomicUsize>) -> Box<dyn ConfigSource> {
        Box::new(FnSource::new(move |key| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(data.get(key).cloned())
        }))
    }

    #[tokio::test]
    async fn test_first_source_wins_and_later_sources_are_not_asked() {
        let second_calls = Arc::new(AtomicUsize::new(0));
        let sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(MemorySource::new(json!({ "foo": "first" }))),
            counting(json!({ "foo": "second" }), second_calls.clone()),
        ];

        let values = resolve_keys(["foo"], &sources).await.unwrap();
        assert_eq!(values["foo"], json!("first"));
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_falls_through_to_later_sources() {
        let sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(MemorySource::new(json!({ "a": 1 }))),
            Box::new(MemorySource::new(json!({ "b": 2 }))),
        ];

        let values = resolve_keys(["a", "b", "c"], &sources).await.unwrap();
        assert_eq!(values.get("a"), Some(&json!(1)));
        assert_eq!(values.get("b"), Some(&json!(2)));
        assert!(!values.contains_key("c"));
    }

    #[tokio::test]
    async fn test_getter_error_carries_key_index_and_name() {
        let sources: Vec<Box<dyn ConfigSource>> = vec![
            Box::new(MemorySource::new(json!({}))),
            Box::new(FnSource::new(|_key| -> Result<Option<Value>, BoxError> {
                Err("lookup failed".into())
            })),
        ];

        let err = resolve_keys(["boink"], &sources).await.unwrap_err();
        match err {
            ConfigError::ResolveValue {
                key,
                source_index,
                source_name,
                ..
            } => {
                assert_eq!(key, "boink");
                assert_eq!(source_index, 1);
                assert_eq!(source_name, "[anonymous source]");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
