//! Untyped configuration trees and the algorithms over them.
//!
//! Every layer of configuration, whether read from a file or pushed by a provider,
//! is represented as a [`ConfigTree`]. The three algorithms here operate purely on
//! that representation:
//!
//! - [`merge_values`] / [`merge_trees`]: overlay a tree onto a typed value or another tree
//! - [`remove_unused_settings`] / [`filter_tree`]: drop leaves a source does not hold
//! - [`diff`]: locate the single leaf that changed between two snapshots

mod diff;
mod filter;
mod key;
mod merge;
mod value;

pub use diff::diff;
pub use filter::{filter_tree, remove_unused_settings};
pub use key::{KeyPath, KeySet, PROVIDER_SEPARATOR, build_base_key};
pub use merge::{merge_trees, merge_values};
pub use value::{ConfigTree, ConfigValue, Scalar};
