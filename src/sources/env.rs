//! Environment variable source.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{BuildStart, Lifecycle};
use crate::{BoxError, ConfigSource};

/// Maps a configuration key to the variable names tried for it, in order.
pub type KeyTransform = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;

/// When variables are read from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvCacheMode {
    /// Every lookup reads the environment again.
    None,
    /// Variables are captured once at the start of each build.
    #[default]
    PerBuild,
    /// Variables are captured when the source is created and shared by its clones.
    PerInstance,
}

/// Where variables come from.
#[derive(Clone)]
enum EnvVars {
    Process,
    Fixed(Arc<Vec<(String, String)>>),
}

/// Options for [`EnvSource`].
#[derive(Clone)]
pub struct EnvSourceOptions {
    pub key_transform: KeyTransform,
    pub cache_mode: EnvCacheMode,
    /// Only variables starting with this prefix are visible, with the prefix removed.
    pub prefix: Option<String>,
}

impl Default for EnvSourceOptions {
    fn default() -> Self {
        Self {
            key_transform: Arc::new(default_key_transform),
            cache_mode: EnvCacheMode::default(),
            prefix: None,
        }
    }
}

impl fmt::Debug for EnvSourceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSourceOptions")
            .field("cache_mode", &self.cache_mode)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// A source reading environment variables.
///
/// Variable names are upper-cased when read, in every cache mode, so lookups
/// are effectively case-insensitive for keys whose transform yields an
/// upper-case variant (the default transform always does). Values are returned
/// as JSON strings.
#[derive(Clone)]
pub struct EnvSource {
    options: EnvSourceOptions,
    vars: EnvVars,
    snapshot: Option<Arc<HashMap<String, String>>>,
}

impl EnvSource {
    /// Reads the process environment with default options.
    pub fn new() -> Self {
        Self::with_options(EnvSourceOptions::default())
    }

    pub fn with_options(options: EnvSourceOptions) -> Self {
        Self::build(options, EnvVars::Process)
    }

    /// Reads a fixed set of variables instead of the process environment.
    pub fn from_vars<I, K, V>(vars: I, options: EnvSourceOptions) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::build(options, EnvVars::Fixed(Arc::new(vars)))
    }

    fn build(options: EnvSourceOptions, vars: EnvVars) -> Self {
        let mut source = Self {
            options,
            vars,
            snapshot: None,
        };
        if source.options.cache_mode == EnvCacheMode::PerInstance {
            source.snapshot = Some(Arc::new(source.read_vars()));
        }
        source
    }

    fn read_vars(&self) -> HashMap<String, String> {
        let raw: Box<dyn Iterator<Item = (String, String)>> = match &self.vars {
            EnvVars::Process => Box::new(utf8_vars(std::env::vars_os())),
            EnvVars::Fixed(vars) => Box::new(vars.iter().cloned()),
        };

        raw.filter_map(|(key, value)| match &self.options.prefix {
            Some(prefix) => key
                .strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty())
                .map(|rest| (rest.to_uppercase(), value)),
            None => Some((key.to_uppercase(), value)),
        })
        .collect()
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvSource")
            .field("options", &self.options)
            .field("snapshot", &self.snapshot.as_ref().map(|s| s.len()))
            .finish()
    }
}

#[async_trait]
impl ConfigSource for EnvSource {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        let candidates = (self.options.key_transform)(key);

        let found = match &self.snapshot {
            Some(vars) => candidates.iter().find_map(|name| vars.get(name).cloned()),
            None => {
                let vars = self.read_vars();
                candidates.iter().find_map(|name| vars.get(name).cloned())
            }
        };

        Ok(found.map(Value::String))
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        let snapshot = match self.options.cache_mode {
            EnvCacheMode::PerInstance => self.snapshot.clone(),
            EnvCacheMode::None | EnvCacheMode::PerBuild => None,
        };
        Box::new(Self {
            options: self.options.clone(),
            vars: self.vars.clone(),
            snapshot,
        })
    }

    fn listens_to(&self, lifecycle: Lifecycle) -> bool {
        lifecycle == Lifecycle::BuildStart && self.options.cache_mode == EnvCacheMode::PerBuild
    }

    async fn on_build_start(&mut self, _event: BuildStart<'_>) -> Result<(), BoxError> {
        let vars = self.read_vars();
        debug!(variables = vars.len(), "captured environment for build");
        self.snapshot = Some(Arc::new(vars));
        Ok(())
    }
}

/// Tries `key` as given, upper-cased, and with `-`, whitespace, `/` and `\`
/// replaced by `_` (as given and upper-cased). Duplicates are dropped.
pub fn default_key_transform(key: &str) -> Vec<String> {
    let normalized: String = key
        .chars()
        .map(|c| match c {
            '-' | '/' | '\\' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect();

    let mut variants = Vec::with_capacity(4);
    for candidate in [
        key.to_string(),
        key.to_uppercase(),
        normalized.clone(),
        normalized.to_uppercase(),
    ] {
        if !variants.contains(&candidate) {
            variants.push(candidate);
        }
    }
    variants
}

/// Skips variables whose name or value is not valid UTF-8.
fn utf8_vars(vars: impl Iterator<Item = (OsString, OsString)>) -> impl Iterator<Item = (String, String)> {
    vars.filter_map(|(key, value)| match (key.into_string(), value.into_string()) {
        (Ok(key), Ok(value)) => Some((key, value)),
        (key, _) => {
            let name = key.unwrap_or_else(|raw| raw.to_string_lossy().into_owned());
            trace!(var = %name, "skipping non UTF-8 environment variable");
            None
        }
    })
}
