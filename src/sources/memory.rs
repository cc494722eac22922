//! Sources answering from data already in memory.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{BoxError, ConfigSource};

/// A source backed by a fixed JSON object. Keys match top-level properties exactly.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    values: Arc<Map<String, Value>>,
}

impl MemorySource {
    /// Creates a source from a JSON object. Any other value yields an empty source.
    pub fn new(values: Value) -> Self {
        match values {
            Value::Object(map) => Self::from_map(map),
            _ => Self::default(),
        }
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values: Arc::new(values),
        }
    }
}

#[async_trait]
impl ConfigSource for MemorySource {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        Ok(self.values.get(key).cloned())
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        Box::new(self.clone())
    }
}

type Getter = Arc<dyn Fn(&str) -> Result<Option<Value>, BoxError> + Send + Sync>;

/// A source backed by a closure.
///
/// It has no type of its own to name, so errors report it as
/// [`FnSource::ANONYMOUS`].
#[derive(Clone)]
pub struct FnSource {
    getter: Getter,
}

impl FnSource {
    pub const ANONYMOUS: &'static str = "[anonymous source]";

    pub fn new<F>(getter: F) -> Self
    where
        F: Fn(&str) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        Self {
            getter: Arc::new(getter),
        }
    }
}

impl fmt::Debug for FnSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource").finish_non_exhaustive()
    }
}

#[async_trait]
impl ConfigSource for FnSource {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(Self::ANONYMOUS)
    }

    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        (self.getter)(key)
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        Box::new(self.clone())
    }
}
