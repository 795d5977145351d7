//! Configuration provider capability.
//!
//! The engine talks to a remote key/value store only through [`ProviderClient`].
//! Clients are created per base path by a [`ProviderFactory`]; [`MemoryProvider`]
//! is an in-process implementation of both.

pub mod client;
pub mod info;
pub mod memory;

pub use client::{
    AccessTokenSource, ProviderClient, ProviderClientConfig, ProviderFactory, WatchStreams,
    create_provider_client,
};
pub use info::ProviderInfo;
pub use memory::{MemoryClient, MemoryProvider};
