//! Placeholder substitution over a build shape.

use serde_json::{Map, Value};

use super::shape::{KeySet, Placeholder, Shape};
use crate::ConfigError;

/// Result of substituting every placeholder in a shape.
#[derive(Debug)]
pub struct Substitution {
    /// The shape with placeholders replaced. Fields of unresolved required
    /// placeholders are left out of objects; inside arrays they become `null`.
    pub config: Value,
    /// First key of every unresolved required placeholder, in encounter order.
    pub missing_required: KeySet,
    /// Each key that satisfied a placeholder, mapped to its formatted value.
    pub used: Map<String, Value>,
}

/// Replaces placeholders in `shape` with values from `key_values`.
///
/// Missing required keys are collected rather than failing the walk, so a single
/// pass reports all of them. Formatter errors abort immediately.
pub fn substitute(shape: Shape, key_values: &Map<String, Value>) -> Result<Substitution, ConfigError> {
    let mut substitutor = Substitutor {
        key_values,
        missing_required: KeySet::new(),
        used: Map::new(),
    };
    let config = substitutor
        .visit(shape)?
        .unwrap_or(Value::Null);

    Ok(Substitution {
        config,
        missing_required: substitutor.missing_required,
        used: substitutor.used,
    })
}

struct Substitutor<'a> {
    key_values: &'a Map<String, Value>,
    missing_required: KeySet,
    used: Map<String, Value>,
}

impl Substitutor<'_> {
    /// Returns `None` when the node is an unresolved required placeholder.
    fn visit(&mut self, node: Shape) -> Result<Option<Value>, ConfigError> {
        match node {
            Shape::Placeholder(placeholder) => self.replace(placeholder),
            Shape::Literal(value) => Ok(Some(value)),
            Shape::Object(fields) => {
                let mut object = Map::new();
                for (name, child) in fields {
                    if let Some(value) = self.visit(child)? {
                        object.insert(name, value);
                    }
                }
                Ok(Some(Value::Object(object)))
            }
            Shape::Array(items) => {
                let mut array = Vec::with_capacity(items.len());
                for child in items {
                    array.push(self.visit(child)?.unwrap_or(Value::Null));
                }
                Ok(Some(Value::Array(array)))
            }
        }
    }

    fn replace(&mut self, placeholder: Placeholder) -> Result<Option<Value>, ConfigError> {
        let found = placeholder
            .keys()
            .iter()
            .find_map(|key| self.key_values.get(key).map(|value| (key, value.clone())));

        let (used_key, raw) = match found {
            Some((key, value)) => (Some(key.to_string()), Some(value)),
            None if placeholder.is_required() => {
                self.missing_required.insert(placeholder.keys().first());
                return Ok(None);
            }
            None => (None, placeholder.fallback().cloned()),
        };

        let formatted = match placeholder.formatter() {
            Some(formatter) => formatter(raw).map_err(|e| ConfigError::Formatter {
                key: used_key
                    .clone()
                    .unwrap_or_else(|| placeholder.keys().first().to_string()),
                source: e,
            })?,
            None => raw,
        };
        let value = formatted.unwrap_or(Value::Null);

        if let Some(key) = used_key {
            self.used.insert(key, value.clone());
        }

        Ok(Some(value))
    }
}
