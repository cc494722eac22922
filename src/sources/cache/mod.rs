//! Source serving the key/value map of the previous successful build.
//!
//! [`CacheSource`] answers nothing on the first build. When a build succeeds
//! it stores every key/value pair used in a [`CacheService`], and later
//! builds of the same build function read them back at build start. Place it
//! first in the source list to short-circuit slower sources.
//!
//! Entries are keyed by the build function's identity unless the caller puts
//! an explicit suffix in the shared data under [`CACHE_KEY_SUFFIX`]. Function
//! identities are only stable within one process, so caches that outlive the
//! process (such as [`FileCache`]) should be used with an explicit suffix.

mod file;
mod memory;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

pub use file::{FileCache, FileCacheError};
pub use memory::MemoryCache;

use crate::config::{BuildContext, BuildFnRef, BuildStart, BuildSuccess, Lifecycle};
use crate::{BoxError, ConfigSource};

/// Shared data entry overriding the cache key suffix. Must be a string.
pub const CACHE_KEY_SUFFIX: &str = "cache_key_suffix";

/// Storage for cached build results. Values are opaque strings.
#[async_trait]
pub trait CacheService: Send + Sync + fmt::Debug {
    async fn get(&self, key: &str) -> Result<Option<String>, BoxError>;

    /// Stores `data` for `ttl`. Returns whether the value was stored; a zero
    /// `ttl` stores nothing and returns `false`.
    async fn set(&self, key: &str, data: String, ttl: Duration) -> Result<bool, BoxError>;

    /// Returns whether a value was removed.
    async fn del(&self, key: &str) -> Result<bool, BoxError>;
}

/// Whether caching applies to a build.
#[derive(Clone)]
pub enum CacheEnabled {
    Always(bool),
    /// Evaluated at the start of every build.
    When(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl CacheEnabled {
    pub fn when<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::When(Arc::new(predicate))
    }

    fn is_enabled(&self) -> bool {
        match self {
            Self::Always(enabled) => *enabled,
            Self::When(predicate) => predicate(),
        }
    }
}

impl Default for CacheEnabled {
    fn default() -> Self {
        Self::Always(true)
    }
}

impl From<bool> for CacheEnabled {
    fn from(enabled: bool) -> Self {
        Self::Always(enabled)
    }
}

impl fmt::Debug for CacheEnabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always(enabled) => f.debug_tuple("Always").field(enabled).finish(),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSourceOptions {
    pub key_prefix: String,
    pub enabled: CacheEnabled,
    pub ttl: Duration,
    pub cache: Arc<dyn CacheService>,
}

impl Default for CacheSourceOptions {
    fn default() -> Self {
        Self {
            key_prefix: "config_builder_cache_".to_string(),
            enabled: CacheEnabled::default(),
            ttl: Duration::from_secs(60 * 60),
            cache: Arc::new(MemoryCache::new()),
        }
    }
}

/// Suffixes handed out per build function, shared by a source and its clones.
#[derive(Debug, Default)]
struct SuffixTable {
    next: u64,
    by_build_fn: HashMap<BuildFnRef, String>,
}

impl SuffixTable {
    fn suffix_for(&mut self, build_fn: BuildFnRef) -> String {
        let next = &mut self.next;
        self.by_build_fn
            .entry(build_fn)
            .or_insert_with(|| {
                *next += 1;
                format!("build_fn_{next}")
            })
            .clone()
    }
}

#[derive(Debug)]
pub struct CacheSource {
    options: CacheSourceOptions,
    suffixes: Arc<Mutex<SuffixTable>>,
    cache_key: Option<String>,
    cached: Map<String, Value>,
}

impl CacheSource {
    pub fn new(options: CacheSourceOptions) -> Self {
        Self {
            options,
            suffixes: Arc::default(),
            cache_key: None,
            cached: Map::new(),
        }
    }

    /// The cache key of the current build, set at build start when caching is enabled.
    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    fn key_for(&self, context: &BuildContext) -> String {
        let suffix = match context.shared_data().get(CACHE_KEY_SUFFIX) {
            Some(Value::String(suffix)) => suffix.clone(),
            _ => self.suffixes.lock().suffix_for(context.build_fn()),
        };
        format!("{}{}", self.options.key_prefix, suffix)
    }
}

impl Default for CacheSource {
    fn default() -> Self {
        Self::new(CacheSourceOptions::default())
    }
}

#[async_trait]
impl ConfigSource for CacheSource {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        Ok(self.cached.get(key).cloned())
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        Box::new(Self {
            options: self.options.clone(),
            suffixes: self.suffixes.clone(),
            cache_key: None,
            cached: Map::new(),
        })
    }

    fn listens_to(&self, lifecycle: Lifecycle) -> bool {
        matches!(lifecycle, Lifecycle::BuildStart | Lifecycle::BuildSuccess)
    }

    async fn on_build_start(&mut self, event: BuildStart<'_>) -> Result<(), BoxError> {
        self.cached.clear();
        self.cache_key = None;

        if !self.options.enabled.is_enabled() {
            debug!("config cache disabled for this build");
            return Ok(());
        }

        let cache_key = self.key_for(event.context);
        if let Some(data) = self.options.cache.get(&cache_key).await? {
            match serde_json::from_str::<Map<String, Value>>(&data) {
                Ok(cached) => {
                    debug!(%cache_key, keys = cached.len(), "serving cached config values");
                    self.cached = cached;
                }
                Err(e) => warn!(%cache_key, error = %e, "ignoring corrupt config cache entry"),
            }
        }
        self.cache_key = Some(cache_key);
        Ok(())
    }

    async fn on_build_success(&mut self, event: BuildSuccess<'_>) -> Result<(), BoxError> {
        let Some(cache_key) = &self.cache_key else {
            return Ok(());
        };
        let data = serde_json::to_string(event.key_values)?;
        let stored = self.options.cache.set(cache_key, data, self.options.ttl).await?;
        debug!(%cache_key, stored, "cached config values");
        Ok(())
    }
}
