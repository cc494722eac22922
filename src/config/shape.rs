//! Build shapes and the placeholders that stand in for configuration keys.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::BoxError;

/// Converts a raw resolved (or default) value into the value stored in the config.
///
/// `None` means "no value": an absent optional key without a default reaches the
/// formatter as `None`, and a formatter returning `None` leaves `null` in the output.
pub type Formatter = Arc<dyn Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Send + Sync>;

/// Ordered list of fallback keys for one configuration field. First match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keys(Vec<String>);

impl Keys {
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// The key reported when the field cannot be resolved.
    pub fn first(&self) -> &str {
        &self.0[0]
    }
}

impl From<&str> for Keys {
    fn from(key: &str) -> Self {
        Keys(vec![key.to_string()])
    }
}

impl From<String> for Keys {
    fn from(key: String) -> Self {
        Keys(vec![key])
    }
}

impl<const N: usize> From<[&str; N]> for Keys {
    fn from(keys: [&str; N]) -> Self {
        Keys::from(&keys[..])
    }
}

impl From<&[&str]> for Keys {
    fn from(keys: &[&str]) -> Self {
        Keys::from(keys.iter().map(|k| k.to_string()).collect::<Vec<_>>())
    }
}

impl From<Vec<String>> for Keys {
    /// # Panics
    ///
    /// Panics if `keys` is empty; a placeholder needs at least one key.
    fn from(keys: Vec<String>) -> Self {
        assert!(!keys.is_empty(), "a placeholder needs at least one key");
        Keys(keys)
    }
}

/// Inert marker for a configuration key inside a [`Shape`].
///
/// Created only through [`ShapeBuilder::required`] and [`ShapeBuilder::optional`].
#[derive(Clone)]
pub struct Placeholder {
    keys: Keys,
    required: bool,
    default_value: Option<Value>,
    formatter: Option<Formatter>,
}

impl Placeholder {
    fn new(keys: Keys, required: bool) -> Self {
        Self {
            keys,
            required,
            default_value: None,
            formatter: None,
        }
    }

    /// Applies `formatter` to the resolved (or default) value.
    #[must_use]
    pub fn format<F>(mut self, formatter: F) -> Self
    where
        F: Fn(Option<Value>) -> Result<Option<Value>, BoxError> + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    /// Value used when no source knows any of the keys.
    ///
    /// Has no effect on required placeholders.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    pub(crate) fn fallback(&self) -> Option<&Value> {
        if self.required {
            None
        } else {
            self.default_value.as_ref()
        }
    }

    pub(crate) fn formatter(&self) -> Option<&Formatter> {
        self.formatter.as_ref()
    }
}

impl fmt::Debug for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Placeholder")
            .field("keys", &self.keys)
            .field("required", &self.required)
            .field("default_value", &self.default_value)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

/// The tree a build function returns: nested objects and arrays whose leaves are
/// literal values or placeholders.
#[derive(Debug, Clone)]
pub enum Shape {
    Placeholder(Placeholder),
    Literal(Value),
    Object(Vec<(String, Shape)>),
    Array(Vec<Shape>),
}

impl Shape {
    /// Builds an object node. Field order is preserved in the output.
    pub fn object<I, K, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: Into<Shape>,
    {
        Shape::Object(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Shape>,
    {
        Shape::Array(items.into_iter().map(Into::into).collect())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Shape::Literal(value.into())
    }
}

impl From<Placeholder> for Shape {
    fn from(placeholder: Placeholder) -> Self {
        Shape::Placeholder(placeholder)
    }
}

impl From<Value> for Shape {
    fn from(value: Value) -> Self {
        Shape::Literal(value)
    }
}

/// Insertion-ordered set of configuration keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl KeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `key`, returning `false` if it was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        if self.seen.contains(key) {
            return false;
        }
        self.seen.insert(key.to_string());
        self.order.push(key.to_string());
        true
    }

    pub fn extend<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.insert(key);
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.seen.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys of `self` followed by keys of `other` not already present.
    pub fn union(&self, other: &KeySet) -> KeySet {
        let mut merged = self.clone();
        merged.extend(other.iter());
        merged
    }

    pub fn into_vec(self) -> Vec<String> {
        self.order
    }
}

impl<'a> FromIterator<&'a str> for KeySet {
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        let mut set = KeySet::new();
        set.extend(iter);
        set
    }
}

/// Handed to the build function; creates placeholders and records which keys
/// the shape declares.
///
/// A key may be declared both required and optional across one shape; the two
/// sets are independent.
#[derive(Debug, Default)]
pub struct ShapeBuilder {
    required_keys: KeySet,
    optional_keys: KeySet,
}

impl ShapeBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// References a key (or fallback keys) that must resolve for the build to succeed.
    pub fn required(&mut self, keys: impl Into<Keys>) -> Placeholder {
        let keys = keys.into();
        self.required_keys.extend(keys.iter());
        Placeholder::new(keys, true)
    }

    /// References a key (or fallback keys) that may be absent from every source.
    pub fn optional(&mut self, keys: impl Into<Keys>) -> Placeholder {
        let keys = keys.into();
        self.optional_keys.extend(keys.iter());
        Placeholder::new(keys, false)
    }

    pub fn required_keys(&self) -> &KeySet {
        &self.required_keys
    }

    pub fn optional_keys(&self) -> &KeySet {
        &self.optional_keys
    }

    pub(crate) fn into_key_sets(self) -> (KeySet, KeySet) {
        (self.required_keys, self.optional_keys)
    }
}
