//! Reference formatters for [`Placeholder::format`](crate::Placeholder::format).
//!
//! Each function returns a closure converting the resolved value. Absent
//! values (`None` or JSON `null`) pass through as `None`, except for
//! [`as_boolean`] which turns them into `false`.

mod list;
mod number;
mod string;

use std::any::type_name;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use list::{as_list, ListOptions, Separator};
pub use number::{as_int, as_number, NumberOptions};
pub use string::{as_string, as_string_with};

use crate::BoxError;

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("cannot convert {0} to a number")]
    InvalidNumber(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("value failed validation: {0}")]
    Schema(#[source] BoxError),

    #[error("value does not match type {type_name}: {source}")]
    Type {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

fn present(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

/// `"false"`, `"0"`, `""`, `0`, `false` and absent values become `false`;
/// everything else becomes `true`.
pub fn as_boolean() -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static {
    |value| {
        let truthy = match present(value) {
            None => false,
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => !matches!(s.as_str(), "" | "false" | "0"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
            Some(Value::Array(_) | Value::Object(_)) => true,
            Some(Value::Null) => false,
        };
        Ok(Some(Value::Bool(truthy)))
    }
}

/// Parses strings as JSON. Other values pass through.
pub fn as_json() -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static {
    |value| match present(value) {
        Some(Value::String(raw)) => Ok(Some(
            serde_json::from_str(&raw).map_err(FormatError::InvalidJson)?,
        )),
        other => Ok(other),
    }
}

/// Runs `validator` on the value and passes the value through when it succeeds.
///
/// The validator also sees absent values, so it decides whether they are allowed.
pub fn as_schema<F, E>(
    validator: F,
) -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Send + Sync + 'static
where
    F: Fn(Option<&Value>) -> Result<(), E> + Send + Sync + 'static,
    E: Into<BoxError> + 'static,
{
    move |value| {
        let value = present(value);
        validator(value.as_ref()).map_err(|e| FormatError::Schema(e.into()))?;
        Ok(value)
    }
}

/// Checks that the value deserializes into `T` and yields `T` serialized back,
/// which normalizes it to `T`'s representation.
pub fn as_type<T>() -> impl Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Clone + Send + Sync + 'static
where
    T: DeserializeOwned + Serialize + 'static,
{
    |value| {
        let Some(value) = present(value) else {
            return Ok(None);
        };
        let typed: T = serde_json::from_value(value).map_err(|e| FormatError::Type {
            type_name: type_name::<T>(),
            source: e,
        })?;
        Ok(Some(serde_json::to_value(typed)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    fn boolean(value: Value) -> Value {
        as_boolean()(Some(value)).unwrap().unwrap()
    }

    #[test]
    fn test_as_boolean_known_strings() {
        assert_eq!(boolean(json!("true")), json!(true));
        assert_eq!(boolean(json!("false")), json!(false));
        assert_eq!(boolean(json!("1")), json!(true));
        assert_eq!(boolean(json!("0")), json!(false));
    }

    #[test]
    fn test_as_boolean_falsy_and_truthy() {
        assert_eq!(boolean(json!(false)), json!(false));
        assert_eq!(boolean(json!(0)), json!(false));
        assert_eq!(boolean(json!(-0.0)), json!(false));
        assert_eq!(boolean(json!("")), json!(false));
        assert_eq!(boolean(Value::Null), json!(false));
        assert_eq!(as_boolean()(None).unwrap(), Some(json!(false)));

        assert_eq!(boolean(json!("foo")), json!(true));
        assert_eq!(boolean(json!({})), json!(true));
        assert_eq!(boolean(json!([false])), json!(true));
        assert_eq!(boolean(json!(123.123)), json!(true));
    }

    #[test]
    fn test_as_json() {
        let format = as_json();
        assert_eq!(
            format(Some(json!(r#"{ "a": [1, true] }"#))).unwrap(),
            Some(json!({ "a": [1, true] }))
        );
        assert_eq!(format(Some(json!(42))).unwrap(), Some(json!(42)));
        assert_eq!(format(None).unwrap(), None);
        assert_eq!(format(Some(Value::Null)).unwrap(), None);

        let err = format(Some(json!("bar"))).unwrap_err();
        assert!(matches!(err.downcast_ref::<FormatError>(), Some(FormatError::InvalidJson(_))));
    }

    #[test]
    fn test_as_schema() {
        let format = as_schema(|value: Option<&Value>| match value {
            Some(Value::Number(_)) => Ok(()),
            _ => Err("expected a number"),
        });
        assert_eq!(format(Some(json!(1))).unwrap(), Some(json!(1)));

        let err = format(Some(json!("x"))).unwrap_err();
        assert_eq!(err.to_string(), "value failed validation: expected a number");
        assert!(format(None).is_err());
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Endpoint {
        host: String,
        #[serde(default = "default_port")]
        port: u16,
    }

    fn default_port() -> u16 {
        80
    }

    #[test]
    fn test_as_type_normalizes() {
        let format = as_type::<Endpoint>();
        assert_eq!(
            format(Some(json!({ "host": "example.com" }))).unwrap(),
            Some(json!({ "host": "example.com", "port": 80 }))
        );
        assert_eq!(format(None).unwrap(), None);

        let err = format(Some(json!({ "port": 1 }))).unwrap_err();
        assert!(matches!(err.downcast_ref::<FormatError>(), Some(FormatError::Type { .. })));
    }
}
