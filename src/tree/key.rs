//! Key paths and provider key sets.

use std::collections::HashSet;
use std::fmt;

/// Separator used by key/value providers between path segments.
pub const PROVIDER_SEPARATOR: char = '/';

/// Join key segments with the provider separator.
///
/// Leading and trailing separators on each part are trimmed so that a stem given
/// as `edgex/v3/` joins cleanly with a service key. Empty parts are skipped.
///
/// ```rust
/// use layered_config::tree::build_base_key;
///
/// assert_eq!(build_base_key(&["edgex/v3/", "core-data"]), "edgex/v3/core-data");
/// ```
pub fn build_base_key(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim_matches(PROVIDER_SEPARATOR))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// A path to a node in a configuration tree, relative to some root.
///
/// Displays dotted (`Writable.LogLevel`); [`KeyPath::to_provider_key`] renders the
/// provider form (`Writable/LogLevel`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    /// The empty path.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path. Empty segments are dropped.
    pub fn parse(dotted: &str) -> Self {
        Self(
            dotted
                .split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// Build a path from segments.
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// A new path with `segment` appended.
    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    /// The path segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Render with the provider separator.
    pub fn to_provider_key(&self) -> String {
        self.0.join("/")
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// The fully-qualified keys actually present at a configuration source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySet(HashSet<String>);

impl KeySet {
    /// Create an empty key set.
    pub fn new() -> Self {
        Self(HashSet::new())
    }

    /// Whether the exact key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    /// Add a key.
    pub fn insert(&mut self, key: impl Into<String>) {
        self.0.insert(key.into());
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over the keys in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for KeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
