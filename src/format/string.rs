use serde_json::Value;

use super::present;
use crate::BoxError;

/// Converts present values to strings. Strings are kept, other values are
/// written as JSON (`42`, `true`, `{"a":1}`).
pub fn as_string() -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static {
    as_string_with(|value| {
        Ok(match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    })
}

/// Converts present values to strings with `serializer`.
pub fn as_string_with<F>(
    serializer: F,
) -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static
where
    F: Fn(&Value) -> Result<String, BoxError> + Clone + Send + Sync + 'static,
{
    move |value| match present(value) {
        Some(value) => Ok(Some(Value::String(serializer(&value)?))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_as_string() {
        let format = as_string();
        assert_eq!(format(Some(json!("x"))).unwrap(), Some(json!("x")));
        assert_eq!(format(Some(json!(42))).unwrap(), Some(json!("42")));
        assert_eq!(format(Some(json!(true))).unwrap(), Some(json!("true")));
        assert_eq!(format(Some(json!({ "a": 1 }))).unwrap(), Some(json!(r#"{"a":1}"#)));
        assert_eq!(format(Some(Value::Null)).unwrap(), None);
        assert_eq!(format(None).unwrap(), None);
    }

    #[test]
    fn test_custom_serializer() {
        let format = as_string_with(|value: &Value| Ok(format!("<{value}>")));
        assert_eq!(format(Some(json!(1))).unwrap(), Some(json!("<1>")));
    }
}
