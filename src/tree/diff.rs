//! Structural diff between two snapshots of a configuration tree.

use crate::tree::{ConfigTree, ConfigValue, KeyPath};

/// Find the path of the leaf that differs between `previous` and `updated`.
///
/// Walks `updated` depth-first: a key missing from `previous` is an addition, two
/// mappings recurse, and any other unequal pair is a change at that key. If nothing
/// is found the walk is repeated with the arguments swapped to catch removals.
///
/// Only single-leaf differences have a defined answer. When several leaves differ the
/// first one reached by the walk is returned; the walk is deterministic for a given
/// pair of trees but callers must not rely on any particular key order.
///
/// ```rust
/// use layered_config::tree::{diff, ConfigTree};
///
/// let previous = ConfigTree::new().with("Writable", ConfigTree::new().with("LogLevel", "INFO"));
/// let updated = ConfigTree::new().with("Writable", ConfigTree::new().with("LogLevel", "DEBUG"));
///
/// assert_eq!(diff(&previous, &updated).unwrap().to_string(), "Writable.LogLevel");
/// assert!(diff(&previous, &previous).is_none());
/// ```
pub fn diff(previous: &ConfigTree, updated: &ConfigTree) -> Option<KeyPath> {
    walk_for_change(previous, updated, &KeyPath::root())
        .or_else(|| walk_for_change(updated, previous, &KeyPath::root()))
}

fn walk_for_change(previous: &ConfigTree, updated: &ConfigTree, prefix: &KeyPath) -> Option<KeyPath> {
    for (key, updated_value) in updated.iter() {
        let path = prefix.child(key);
        let Some(previous_value) = previous.get(key) else {
            return Some(path);
        };

        match (previous_value, updated_value) {
            (ConfigValue::Mapping(previous_sub), ConfigValue::Mapping(updated_sub)) => {
                if let Some(found) = walk_for_change(previous_sub, updated_sub, &path) {
                    return Some(found);
                }
            }
            // A leaf became a mapping: report the first setting inside it.
            (_, ConfigValue::Mapping(updated_sub)) => {
                return Some(first_leaf(updated_sub, &path).unwrap_or(path));
            }
            (previous_leaf, updated_leaf) => {
                if previous_leaf != updated_leaf {
                    return Some(path);
                }
            }
        }
    }
    None
}

fn first_leaf(tree: &ConfigTree, prefix: &KeyPath) -> Option<KeyPath> {
    let (key, value) = tree.iter().next()?;
    let path = prefix.child(key);
    match value {
        ConfigValue::Mapping(sub) => Some(first_leaf(sub, &path).unwrap_or(path)),
        _ => Some(path),
    }
}
