use serde_json::Value;

use super::present;
use crate::BoxError;

/// Where [`as_list`] splits a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Separator {
    /// Any one of these characters.
    AnyOf(Vec<char>),
    /// This exact text.
    Text(String),
    /// Runs of whitespace.
    Whitespace,
}

impl Default for Separator {
    fn default() -> Self {
        Self::AnyOf(vec![';', ','])
    }
}

impl From<&str> for Separator {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<char> for Separator {
    fn from(c: char) -> Self {
        Self::AnyOf(vec![c])
    }
}

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub separator: Separator,
    /// Keep at most this many elements.
    pub limit: Option<usize>,
}

/// Splits strings into a list of strings. Other values pass through.
pub fn as_list(
    options: ListOptions,
) -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static {
    move |value| {
        let raw = match present(value) {
            Some(Value::String(raw)) => raw,
            other => return Ok(other),
        };

        let parts: Vec<&str> = match &options.separator {
            Separator::AnyOf(chars) => raw.split(chars.as_slice()).collect(),
            Separator::Text(text) if text.is_empty() => raw
                .char_indices()
                .map(|(i, c)| &raw[i..i + c.len_utf8()])
                .collect(),
            Separator::Text(text) => raw.split(text.as_str()).collect(),
            Separator::Whitespace => raw.split_whitespace().collect(),
        };

        let limit = options.limit.unwrap_or(usize::MAX);
        Ok(Some(Value::Array(
            parts
                .into_iter()
                .take(limit)
                .map(|part| Value::String(part.to_string()))
                .collect(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list(options: ListOptions, value: Value) -> Option<Value> {
        as_list(options)(Some(value)).unwrap()
    }

    #[test]
    fn test_splits_on_semicolon_or_comma() {
        assert_eq!(
            list(ListOptions::default(), json!("hello;world,how,are;you")),
            Some(json!(["hello", "world", "how", "are", "you"]))
        );
    }

    #[test]
    fn test_limit() {
        let options = ListOptions {
            limit: Some(3),
            ..Default::default()
        };
        assert_eq!(
            list(options, json!("hello;world,how,are;you")),
            Some(json!(["hello", "world", "how"]))
        );
    }

    #[test]
    fn test_passes_through_non_strings() {
        for value in [json!(true), json!(42), json!({}), json!([])] {
            assert_eq!(list(ListOptions::default(), value.clone()), Some(value));
        }
        assert_eq!(as_list(ListOptions::default())(None).unwrap(), None);
        assert_eq!(list(ListOptions::default(), Value::Null), None);
    }

    #[test]
    fn test_custom_separators() {
        let space = ListOptions {
            separator: " ".into(),
            ..Default::default()
        };
        assert_eq!(
            list(space.clone(), json!("hello world,how,are you")),
            Some(json!(["hello", "world,how,are", "you"]))
        );
        assert_eq!(
            list(space, json!("hello  world,how,   are you")),
            Some(json!(["hello", "", "world,how,", "", "", "are", "you"]))
        );

        let whitespace = ListOptions {
            separator: Separator::Whitespace,
            ..Default::default()
        };
        assert_eq!(
            list(whitespace, json!("hello     world,how,are      you")),
            Some(json!(["hello", "world,how,are", "you"]))
        );
    }
}
