//! Deep merge of an untyped overlay into trees and typed configurations.

use crate::error::{ConfigError, Result};
use crate::tree::{ConfigTree, ConfigValue};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Deep-merge `overlay` into `base`.
///
/// Overlay leaves win. Mappings present on both sides are merged recursively;
/// sequences and scalars are replaced as a whole. Keys only in `base` are kept.
pub fn merge_trees(base: &mut ConfigTree, overlay: &ConfigTree) {
    for (key, overlay_value) in overlay.iter() {
        match (base.get_mut(key), overlay_value) {
            (Some(ConfigValue::Mapping(base_sub)), ConfigValue::Mapping(overlay_sub)) => {
                merge_trees(base_sub, overlay_sub);
            }
            _ => {
                base.insert(key.clone(), overlay_value.clone());
            }
        }
    }
}

/// Deep-merge `overlay` into a typed configuration.
///
/// The target is converted to a tree, merged with [`merge_trees`], and converted back.
/// On any error the target is left untouched.
///
/// When the overlay comes from a remote provider it must already have passed through
/// [`remove_unused_settings`](crate::tree::remove_unused_settings), otherwise provider
/// defaults that were never pushed would clobber values resolved at a lower layer.
///
/// # Errors
///
/// - [`ConfigError::UnknownField`] if the overlay names a field the target denies
/// - [`ConfigError::Conversion`] if a value has the wrong shape for its field
/// - [`ConfigError::Merge`] if the target cannot be represented as a tree
pub fn merge_values<T>(target: &mut T, overlay: &ConfigTree) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    if overlay.is_empty() {
        return Ok(());
    }

    let mut base = ConfigTree::from_serializable(target).map_err(|e| {
        ConfigError::Merge(format!("target is not representable as a tree: {}", e))
    })?;
    merge_trees(&mut base, overlay);
    *target = base.to_typed()?;
    Ok(())
}
