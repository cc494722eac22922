//! Settings that reference a secret held in a vault.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use super::content_type::ContentTypeResolver;
use super::{ConfigurationSetting, RemoteSourceError};
use crate::BoxError;

#[derive(Debug, Error)]
pub enum SecretStoreError {
    #[error("secret \"{name}\" does not exist in vault \"{vault_url}\"")]
    NotFound { name: String, vault_url: String },

    #[error(transparent)]
    Other(BoxError),
}

/// Reads secrets from a vault.
#[async_trait]
pub trait SecretStore: Send + Sync + fmt::Debug {
    async fn get_secret(&self, vault_url: &str, name: &str) -> Result<Option<String>, SecretStoreError>;
}

#[derive(Debug, Deserialize)]
struct SecretReference {
    uri: String,
}

/// Replaces a secret reference with the secret's value.
///
/// The setting value is `{"uri": "<vault url>/secrets/<name>"}`.
#[derive(Debug, Clone)]
pub struct SecretReferenceResolver {
    store: Arc<dyn SecretStore>,
    error_if_not_found: bool,
}

impl SecretReferenceResolver {
    pub const CONTENT_TYPE: &'static str =
        "application/vnd.microsoft.appconfig.keyvaultref+json;charset=utf-8";

    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self {
            store,
            error_if_not_found: true,
        }
    }

    /// When unset, references to missing secrets resolve to no value.
    #[must_use]
    pub fn error_if_not_found(mut self, error_if_not_found: bool) -> Self {
        self.error_if_not_found = error_if_not_found;
        self
    }
}

#[async_trait]
impl ContentTypeResolver for SecretReferenceResolver {
    async fn resolve(&self, setting: &ConfigurationSetting) -> Result<Option<Value>, BoxError> {
        let raw = match setting.value.as_deref() {
            None | Some("") => return Ok(None),
            Some(raw) => raw,
        };

        let reference: SecretReference =
            serde_json::from_str(raw).map_err(|e| RemoteSourceError::InvalidSecretReference {
                key: setting.key.clone(),
                label: setting.label.clone().unwrap_or_default(),
                source: e,
            })?;

        let (vault_url, name) = reference.uri.split_once("/secrets/").ok_or_else(|| {
            RemoteSourceError::MissingSecretName {
                uri: reference.uri.clone(),
            }
        })?;

        match self.store.get_secret(vault_url, name).await {
            Ok(secret) => Ok(secret.map(Value::String)),
            Err(SecretStoreError::NotFound { name, vault_url }) if !self.error_if_not_found => {
                warn!(key = %setting.key, %name, %vault_url, "referenced secret not found, ignoring");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}
