//! Converting setting values according to their content type.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::ConfigurationSetting;
use crate::BoxError;

/// Turns a raw setting into its configuration value.
#[async_trait]
pub trait ContentTypeResolver: Send + Sync + fmt::Debug {
    /// Returns `None` when the setting has no usable value.
    async fn resolve(&self, setting: &ConfigurationSetting) -> Result<Option<Value>, BoxError>;
}

/// Selects which settings a resolver handles.
#[derive(Clone)]
pub enum ContentTypeMatcher {
    /// The whole content type, compared case-insensitively.
    Exact(String),
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl ContentTypeMatcher {
    pub fn predicate<F>(predicate: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    /// Settings without a content type are matched as the empty string.
    pub fn matches(&self, content_type: Option<&str>) -> bool {
        let content_type = content_type.unwrap_or_default();
        match self {
            Self::Exact(expected) => expected.eq_ignore_ascii_case(content_type),
            Self::Predicate(predicate) => predicate(content_type),
        }
    }
}

impl fmt::Debug for ContentTypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(content_type) => f.debug_tuple("Exact").field(content_type).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for ContentTypeMatcher {
    fn from(content_type: &str) -> Self {
        Self::Exact(content_type.to_string())
    }
}

impl From<String> for ContentTypeMatcher {
    fn from(content_type: String) -> Self {
        Self::Exact(content_type)
    }
}

/// Parses setting values holding JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonContentResolver;

impl JsonContentResolver {
    pub const CONTENT_TYPE: &'static str = "application/json";
}

#[async_trait]
impl ContentTypeResolver for JsonContentResolver {
    async fn resolve(&self, setting: &ConfigurationSetting) -> Result<Option<Value>, BoxError> {
        match setting.value.as_deref() {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(serde_json::from_str(raw)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_matcher_ignores_case() {
        let matcher = ContentTypeMatcher::from("application/json");
        assert!(matcher.matches(Some("Application/JSON")));
        assert!(!matcher.matches(Some("application/json;charset=utf-8")));
        assert!(!matcher.matches(None));
    }

    #[test]
    fn test_predicate_matcher() {
        let matcher = ContentTypeMatcher::predicate(|ct| ct.starts_with("text/"));
        assert!(matcher.matches(Some("text/plain")));
        assert!(!matcher.matches(None));
    }

    #[tokio::test]
    async fn test_json_resolver() {
        let setting = ConfigurationSetting::new("k", r#"{ "a": [1, 2] }"#);
        assert_eq!(
            JsonContentResolver.resolve(&setting).await.unwrap(),
            Some(json!({ "a": [1, 2] }))
        );

        let empty = ConfigurationSetting::new("k", "");
        assert_eq!(JsonContentResolver.resolve(&empty).await.unwrap(), None);

        let broken = ConfigurationSetting::new("k", "{");
        assert!(JsonContentResolver.resolve(&broken).await.is_err());
    }
}
