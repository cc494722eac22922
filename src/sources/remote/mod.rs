//! Source backed by a remote key/label configuration service.
//!
//! The service is reached through [`SettingsClient`], which lists every
//! setting at once. Settings are loaded when a build starts (or on the first
//! lookup outside a build), run through the first matching
//! [`ContentTypeResolver`] and kept in a `key -> label -> value` table for the
//! rest of the build.

mod content_type;
mod secret;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

pub use content_type::{ContentTypeMatcher, ContentTypeResolver, JsonContentResolver};
pub use secret::{SecretReferenceResolver, SecretStore, SecretStoreError};

use crate::config::{BuildStart, Lifecycle};
use crate::{BoxError, ConfigSource};

/// A single entry of the configuration service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationSetting {
    pub key: String,
    /// `None` for the unlabelled variant of a key.
    pub label: Option<String>,
    pub value: Option<String>,
    pub content_type: Option<String>,
}

impl ConfigurationSetting {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Client for the configuration service.
#[async_trait]
pub trait SettingsClient: Send + Sync + fmt::Debug {
    async fn list_settings(&self) -> Result<Vec<ConfigurationSetting>, BoxError>;
}

#[derive(Debug, Error)]
pub enum RemoteSourceError {
    #[error("failed to list configuration settings: {0}")]
    ListSettings(#[source] BoxError),

    #[error("content type resolver failed for key \"{key}\" with label \"{label}\": {source}")]
    ContentType {
        key: String,
        label: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to parse secret reference for key \"{key}\" with label \"{label}\": {source}")]
    InvalidSecretReference {
        key: String,
        label: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("secret reference \"{uri}\" does not name a secret")]
    MissingSecretName { uri: String },
}

/// Label selection for [`RemoteSource`].
#[derive(Debug, Clone)]
pub struct RemoteSourceOptions {
    /// Labels to read, highest priority first.
    pub labels: Vec<String>,
    /// Use the unlabelled setting when no listed label has a value.
    pub fallback_to_unlabelled: bool,
}

impl Default for RemoteSourceOptions {
    fn default() -> Self {
        Self {
            labels: Vec::new(),
            fallback_to_unlabelled: true,
        }
    }
}

type Resolvers = Vec<(ContentTypeMatcher, Arc<dyn ContentTypeResolver>)>;

/// Resolved values by key, then by label (`None` for unlabelled).
type SettingsTable = HashMap<String, HashMap<Option<String>, Value>>;

#[derive(Debug)]
pub struct RemoteSource {
    client: Arc<dyn SettingsClient>,
    options: RemoteSourceOptions,
    resolvers: Arc<Resolvers>,
    table: OnceCell<SettingsTable>,
}

impl RemoteSource {
    pub fn new(client: Arc<dyn SettingsClient>, options: RemoteSourceOptions) -> Self {
        Self {
            client,
            options,
            resolvers: Arc::new(Vec::new()),
            table: OnceCell::new(),
        }
    }

    /// Creates a source that parses JSON settings and follows secret references.
    pub fn with_default_resolvers(
        client: Arc<dyn SettingsClient>,
        secrets: Arc<dyn SecretStore>,
        options: RemoteSourceOptions,
    ) -> Self {
        Self::new(client, options)
            .with_resolver(JsonContentResolver::CONTENT_TYPE, JsonContentResolver)
            .with_resolver(
                SecretReferenceResolver::CONTENT_TYPE,
                SecretReferenceResolver::new(secrets),
            )
    }

    /// Registers a resolver. Resolvers are tried in registration order.
    #[must_use]
    pub fn with_resolver(
        mut self,
        matcher: impl Into<ContentTypeMatcher>,
        resolver: impl ContentTypeResolver + 'static,
    ) -> Self {
        Arc::make_mut(&mut self.resolvers).push((matcher.into(), Arc::new(resolver)));
        self
    }

    async fn preload(&self) -> Result<SettingsTable, RemoteSourceError> {
        let settings = self
            .client
            .list_settings()
            .await
            .map_err(RemoteSourceError::ListSettings)?;

        let mut table = SettingsTable::new();
        for setting in settings {
            let Some(value) = self.resolve_content_type(&setting).await? else {
                continue;
            };
            let label = setting.label.filter(|label| !label.is_empty());
            table.entry(setting.key).or_default().insert(label, value);
        }

        debug!(keys = table.len(), "preloaded remote configuration settings");
        Ok(table)
    }

    async fn resolve_content_type(
        &self,
        setting: &ConfigurationSetting,
    ) -> Result<Option<Value>, RemoteSourceError> {
        let content_type = setting.content_type.as_deref();
        let Some((_, resolver)) = self
            .resolvers
            .iter()
            .find(|(matcher, _)| matcher.matches(content_type))
        else {
            return Ok(setting.value.clone().map(Value::String));
        };

        resolver.resolve(setting).await.map_err(|e| match e.downcast::<RemoteSourceError>() {
            Ok(e) => *e,
            Err(e) => RemoteSourceError::ContentType {
                key: setting.key.clone(),
                label: setting.label.clone().unwrap_or_default(),
                source: e,
            },
        })
    }

    fn lookup<'a>(&self, table: &'a SettingsTable, key: &str) -> Option<&'a Value> {
        let labelled = table.get(key)?;

        let unlabelled = self.options.fallback_to_unlabelled.then_some(None);
        self.options
            .labels
            .iter()
            .map(|label| Some(label.clone()))
            .chain(unlabelled)
            .filter_map(|label| labelled.get(&label))
            .find(|value| has_value(value))
    }
}

fn has_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[async_trait]
impl ConfigSource for RemoteSource {
    async fn get(&self, key: &str) -> Result<Option<Value>, BoxError> {
        let table = self.table.get_or_try_init(|| self.preload()).await?;
        Ok(self.lookup(table, key).cloned())
    }

    fn clone_source(&self) -> Box<dyn ConfigSource> {
        Box::new(Self {
            client: self.client.clone(),
            options: self.options.clone(),
            resolvers: self.resolvers.clone(),
            table: OnceCell::new(),
        })
    }

    fn listens_to(&self, lifecycle: Lifecycle) -> bool {
        lifecycle == Lifecycle::BuildStart
    }

    async fn on_build_start(&mut self, _event: BuildStart<'_>) -> Result<(), BoxError> {
        self.table = OnceCell::new_with(Some(self.preload().await?));
        Ok(())
    }
}
