//! JSON object source, static or loaded at the start of each build.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::file::load_config_file;
use super::lookup::{default_lookup, LookupFn};
use crate::config::{BuildStart, Lifecycle};
use crate::{BoxError, ConfigSource};

#[derive(Debug, Error)]
pub enum JsonSourceError {
    #[error("JSON source was not populated; it is loaded when a build starts")]
    NotPopulated,

    #[error("JSON source must hold an object, got {0}")]
    NotAnObject(&'static str),

    #[error("JSON source loader failed: {0}")]
    Loader(#[source] BoxError),
}

type Loader = Arc<dyn Fn() -> BoxFuture<'static, Result<Value, BoxError>> + Send + Sync>;

/// A source answering keys from a JSON object.
///
/// The object is either given up front or produced by a loader that runs in
/// `on_build_start`. Keys are matched by a lookup function, [`default_lookup`]
/// unless replaced with [`JsonSource::with_lookup`].
#[derive(Clone)]
pub struct JsonSource {
    loader: Option<Loader>,
    object: Option<Arc<Map<String, Value>>>,
    lookup: LookupFn,
}

impl JsonSource {
    /// Creates a source over a fixed object.
    pub fn new(value: Value) -> Result<Self, JsonSourceError> {
        Ok(Self {
            loader: None,
            object: Some(Arc::new(into_object(value)?)),
            lookup: Arc::new(default_lookup),
        })
    }

    /// Creates a source whose object is produced by `loader` at the start of every build.
    pub fn from_loader<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, BoxError>> + Send + 'static,
    {
        Self {
            loader: Some(Arc::new(move || loader().boxed())),
            object: None,
            lookup: Arc::new(default_lookup),
        }
    }

    /// Creates a source reading a JSON or TOML file at the start of every build.
    ///
    /// A missing file is an empty object unless `required` is set.
    pub fn from_file(path: impl Into<PathBuf>, required: bool) -> Self {
        let path = Arc::new(path.into());
        Self::from_loader(move || {
            let path = Arc::clone(&path);
            async move { load_config_file(&path, required).await.map_err(BoxError::from) }
        })
    }

    #[must_use]
    pub fn with_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&Map<String, Value>, &str) -> Option<Value> + Send + Sync + 'static,
    {
        self.lookup = Arc::new(lookup);
        self
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, JsonSourceError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Err(JsonSourceError::NotAnObject("null")),
        Value::Bool(_) => Err(JsonSourceError::NotAnObject("a boolean")),
        Value::Number(_) => Err(JsonSourceError::NotAnObject("a number")),
        Value::String(_) => Err(JsonSourceError::NotAnObject("a string")),
        Value::Array(_) => Err(JsonSourceError::NotAnObject("an array")),
    }
}

impl fmt::Debug for JsonSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonSource")
            .field("has_loader", &self.loader.is_some())
            .field("populated", &self.object.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigSource for JsonSource {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        let object = self.object.as_ref().ok_or(JsonSourceError::NotPopulated)?;
        Ok((self.lookup)(object, key))
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        let object = match self.loader {
            Some(_) => None,
            None => self.object.clone(),
        };
        Box::new(Self {
            loader: self.loader.clone(),
            object,
            lookup: self.lookup.clone(),
        })
    }

    fn listens_to(&self, lifecycle: Lifecycle) -> bool {
        lifecycle == Lifecycle::BuildStart && self.loader.is_some()
    }

    async fn on_build_start(&mut self, _event: BuildStart<'_>) -> Result<(), BoxError> {
        let Some(loader) = &self.loader else {
            return Ok(());
        };
        let value = loader().await.map_err(JsonSourceError::Loader)?;
        let object = into_object(value)?;
        debug!(properties = object.len(), "loaded JSON source");
        self.object = Some(Arc::new(object));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildContext, BuildFnRef, KeySet};
    use serde_json::json;
    use std::io::Write;

    async fn start(source: &mut JsonSource) -> Result<(), BoxError> {
        let keys = KeySet::new();
        let context = BuildContext::new(BuildFnRef::of::<()>(), Default::default());
        source
            .on_build_start(BuildStart {
                required_keys: &keys,
                optional_keys: &keys,
                context: &context,
            })
            .await
    }

    #[tokio::test]
    async fn test_static_object() {
        let source = JsonSource::new(json!({ "db": { "host": "h" }, "port": 1 })).unwrap();
        assert!(!source.listens_to(Lifecycle::BuildStart));
        assert_eq!(source.get("db.host").await.unwrap(), Some(json!("h")));
        assert_eq!(source.get("db-host").await.unwrap(), Some(json!("h")));
        assert_eq!(source.get("port").await.unwrap(), Some(json!(1)));
        assert_eq!(source.get("nope").await.unwrap(), None);
    }

    #[test]
    fn test_rejects_non_objects() {
        assert!(matches!(
            JsonSource::new(json!([1, 2])),
            Err(JsonSourceError::NotAnObject("an array"))
        ));
    }

    #[tokio::test]
    async fn test_loader_runs_on_build_start() {
        let mut source = JsonSource::from_loader(|| async { Ok::<_, BoxError>(json!({ "foo": "bar" })) });
        assert!(source.listens_to(Lifecycle::BuildStart));

        let err = source.get("foo").await.unwrap_err();
        assert!(err.to_string().contains("not populated"));

        start(&mut source).await.unwrap();
        assert_eq!(source.get("foo").await.unwrap(), Some(json!("bar")));

        let clone = source.clone_source();
        assert!(clone.get("foo").await.is_err());
    }

    #[tokio::test]
    async fn test_loader_errors_are_wrapped() {
        let mut source = JsonSource::from_loader(|| async { Err::<Value, BoxError>("offline".into()) });
        let err = start(&mut source).await.unwrap_err();
        assert_eq!(err.to_string(), "JSON source loader failed: offline");

        let mut source = JsonSource::from_loader(|| async { Ok::<_, BoxError>(json!("text")) });
        let err = start(&mut source).await.unwrap_err();
        assert!(err.downcast_ref::<JsonSourceError>().is_some());
    }

    #[tokio::test]
    async fn test_custom_lookup() {
        let source = JsonSource::new(json!({ "A": 1 }))
            .unwrap()
            .with_lookup(|obj, key| obj.get(&key.to_uppercase()).cloned());
        assert_eq!(source.get("a").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[server]\nport = 9000").unwrap();

        let mut source = JsonSource::from_file(file.path(), true);
        start(&mut source).await.unwrap();
        assert_eq!(source.get("server_port").await.unwrap(), Some(json!(9000)));

        let mut missing = JsonSource::from_file("/nonexistent/config.json", false);
        start(&mut missing).await.unwrap();
        assert_eq!(missing.get("anything").await.unwrap(), None);
    }
}
