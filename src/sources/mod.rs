//! Configuration snapshot sources.

mod env;
mod file;

pub use env::{EnvOverrides, Overrides, override_configuration};
pub use file::FileSource;
