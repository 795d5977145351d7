//! Untyped configuration tree.

use crate::error::{ConfigError, Result};
use crate::tree::KeyPath;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A leaf value in a configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Explicit null / unset value
    Null,
    /// Boolean value
    Bool(bool),
    /// Signed integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => Ok(()),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Integer(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::String(s) => f.write_str(s),
        }
    }
}

/// A node in a configuration tree: a scalar, a sequence, or a nested mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Leaf value
    Scalar(Scalar),
    /// Ordered list of values, compared and replaced as a whole
    Sequence(Vec<ConfigValue>),
    /// Nested mapping
    Mapping(ConfigTree),
}

impl ConfigValue {
    /// Shorthand for a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(s.into()))
    }

    /// Borrow the nested mapping, if this value is one.
    pub fn as_mapping(&self) -> Option<&ConfigTree> {
        match self {
            ConfigValue::Mapping(tree) => Some(tree),
            _ => None,
        }
    }

    /// Mutably borrow the nested mapping, if this value is one.
    pub fn as_mapping_mut(&mut self) -> Option<&mut ConfigTree> {
        match self {
            ConfigValue::Mapping(tree) => Some(tree),
            _ => None,
        }
    }

    /// Borrow the string content of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Render the value the way a key/value provider stores it.
    pub fn to_raw_string(&self) -> String {
        match self {
            ConfigValue::Scalar(scalar) => scalar.to_string(),
            ConfigValue::Sequence(items) => items
                .iter()
                .map(ConfigValue::to_raw_string)
                .collect::<Vec<_>>()
                .join(","),
            ConfigValue::Mapping(tree) => JsonValue::from(tree.clone()).to_string(),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::string(s)
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::string(s)
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Scalar(Scalar::Bool(b))
    }
}

impl From<i64> for ConfigValue {
    fn from(i: i64) -> Self {
        ConfigValue::Scalar(Scalar::Integer(i))
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Scalar(Scalar::Float(v))
    }
}

impl From<ConfigTree> for ConfigValue {
    fn from(tree: ConfigTree) -> Self {
        ConfigValue::Mapping(tree)
    }
}

impl From<JsonValue> for ConfigValue {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => ConfigValue::Scalar(Scalar::Null),
            JsonValue::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Scalar(Scalar::Integer(i)),
                None => ConfigValue::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            JsonValue::String(s) => ConfigValue::Scalar(Scalar::String(s)),
            JsonValue::Array(items) => {
                ConfigValue::Sequence(items.into_iter().map(ConfigValue::from).collect())
            }
            JsonValue::Object(map) => ConfigValue::Mapping(ConfigTree(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            )),
        }
    }
}

impl From<ConfigValue> for JsonValue {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Scalar(Scalar::Null) => JsonValue::Null,
            ConfigValue::Scalar(Scalar::Bool(b)) => JsonValue::Bool(b),
            ConfigValue::Scalar(Scalar::Integer(i)) => JsonValue::from(i),
            ConfigValue::Scalar(Scalar::Float(v)) => serde_json::Number::from_f64(v)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
            ConfigValue::Scalar(Scalar::String(s)) => JsonValue::String(s),
            ConfigValue::Sequence(items) => {
                JsonValue::Array(items.into_iter().map(JsonValue::from).collect())
            }
            ConfigValue::Mapping(tree) => JsonValue::from(tree),
        }
    }
}

/// An untyped configuration tree: string keys mapped to [`ConfigValue`]s.
///
/// Produced by the file loader and by provider snapshots, consumed by the merge,
/// filter and diff algorithms. Trees are never mutated after they have been
/// handed to a consumer; every snapshot builds a new one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree(BTreeMap<String, ConfigValue>);

impl ConfigTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Convert any serializable value into a tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Conversion`] if the value does not serialize to a mapping.
    pub fn from_serializable<S: Serialize + ?Sized>(value: &S) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| ConfigError::Conversion(format!("Failed to serialize: {}", e)))?;
        match ConfigValue::from(json) {
            ConfigValue::Mapping(tree) => Ok(tree),
            other => Err(ConfigError::Conversion(format!(
                "Expected a mapping at the root, found {:?}",
                other
            ))),
        }
    }

    /// Convert the tree into a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownField`] when the target denies a key present in
    /// the tree, or [`ConfigError::Conversion`] for any other mismatch.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(JsonValue::from(self.clone())).map_err(ConfigError::from_conversion)
    }

    /// Get a direct child.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.0.get(key)
    }

    /// Mutably get a direct child.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.0.get_mut(key)
    }

    /// Get a nested mapping child.
    pub fn get_mapping(&self, key: &str) -> Option<&ConfigTree> {
        self.0.get(key).and_then(ConfigValue::as_mapping)
    }

    /// Look up a value by path.
    pub fn get_path(&self, path: &KeyPath) -> Option<&ConfigValue> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            current = current.get_mapping(segment)?;
        }
        current.get(last)
    }

    /// Insert a value at `path`, creating intermediate mappings as needed.
    ///
    /// Any non-mapping value standing where an intermediate mapping is needed is replaced.
    pub fn insert_path(&mut self, path: &KeyPath, value: ConfigValue) {
        let Some((last, parents)) = path.segments().split_last() else {
            return;
        };
        let mut current = self;
        for segment in parents {
            let entry = current
                .0
                .entry(segment.clone())
                .or_insert_with(|| ConfigValue::Mapping(ConfigTree::new()));
            if entry.as_mapping().is_none() {
                *entry = ConfigValue::Mapping(ConfigTree::new());
            }
            current = match entry {
                ConfigValue::Mapping(tree) => tree,
                _ => unreachable!("entry was just made a mapping"),
            };
        }
        current.0.insert(last.clone(), value);
    }

    /// Insert a direct child, returning the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Option<ConfigValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a direct child.
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.0.remove(key)
    }

    /// Builder-style insert, handy for literals.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Whether the tree has no children.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over direct children.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.0.iter()
    }

    /// Retain only the children matching the predicate.
    pub(crate) fn retain(&mut self, f: impl FnMut(&String, &mut ConfigValue) -> bool) {
        self.0.retain(f);
    }

    /// Every leaf path in the tree with its value. Empty mappings have no leaves.
    pub fn leaves(&self) -> Vec<(KeyPath, &ConfigValue)> {
        let mut out = Vec::new();
        collect_leaves(self, &KeyPath::root(), &mut out);
        out
    }
}

fn collect_leaves<'a>(tree: &'a ConfigTree, prefix: &KeyPath, out: &mut Vec<(KeyPath, &'a ConfigValue)>) {
    for (key, value) in tree.iter() {
        let path = prefix.child(key);
        match value {
            ConfigValue::Mapping(sub) => collect_leaves(sub, &path, out),
            leaf => out.push((path, leaf)),
        }
    }
}

impl From<ConfigTree> for JsonValue {
    fn from(tree: ConfigTree) -> Self {
        JsonValue::Object(
            tree.0
                .into_iter()
                .map(|(k, v)| (k, JsonValue::from(v)))
                .collect(),
        )
    }
}

impl FromIterator<(String, ConfigValue)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (String, ConfigValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ConfigTree {
    type Item = (String, ConfigValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}
