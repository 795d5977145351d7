//! Removal of settings a source does not actually hold.

use crate::error::Result;
use crate::tree::{ConfigTree, ConfigValue, KeySet, build_base_key};
use serde::Serialize;

/// Convert `candidate` to a tree and drop every leaf whose fully-qualified key
/// (`base_path/relative/path`) is absent from `known_keys`.
///
/// A configuration copy seeded with compiled-in defaults and then populated from a
/// provider still carries the defaults for keys the provider never stored. Merging it
/// unfiltered would let those defaults overwrite values resolved at another layer.
///
/// ```rust
/// use layered_config::tree::{remove_unused_settings, ConfigTree, KeySet};
///
/// let candidate = ConfigTree::new()
///     .with("A", 1i64)
///     .with("B", ConfigTree::new().with("C", 2i64).with("D", 3i64));
/// let known: KeySet = ["svc/A", "svc/B/C"].into_iter().collect();
///
/// let filtered = remove_unused_settings(&candidate, "svc", &known).unwrap();
/// let expected = ConfigTree::new()
///     .with("A", 1i64)
///     .with("B", ConfigTree::new().with("C", 2i64));
/// assert_eq!(filtered, expected);
/// ```
///
/// # Errors
///
/// Returns an error if `candidate` does not serialize to a mapping.
pub fn remove_unused_settings<C>(candidate: &C, base_path: &str, known_keys: &KeySet) -> Result<ConfigTree>
where
    C: Serialize + ?Sized,
{
    let tree = ConfigTree::from_serializable(candidate)?;
    Ok(filter_tree(tree, base_path, known_keys))
}

/// Tree form of [`remove_unused_settings`].
///
/// Mappings left empty by the filtering are removed too.
pub fn filter_tree(mut tree: ConfigTree, base_path: &str, known_keys: &KeySet) -> ConfigTree {
    retain_known(&mut tree, base_path, known_keys);
    tree
}

fn retain_known(tree: &mut ConfigTree, base_path: &str, known_keys: &KeySet) {
    tree.retain(|key, value| {
        let full_key = build_base_key(&[base_path, key]);
        match value {
            ConfigValue::Mapping(sub) => {
                retain_known(sub, &full_key, known_keys);
                !sub.is_empty()
            }
            _ => known_keys.contains(&full_key),
        }
    });
}
