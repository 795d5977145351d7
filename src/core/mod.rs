//! Configuration resolution and live reconciliation.
//!
//! [`Processor`] resolves a service's [`Configuration`] across the common, service
//! type and private layers, then runs one watch loop per writable section. Changes
//! flow through a [`SharedConfig`] and trigger at most one side effect each via the
//! [`WritableDispatcher`].

mod builder;
mod configuration;
mod dispatch;
mod duration;
mod options;
mod processor;
mod shared;
mod startup;
mod watch;

pub use builder::ProcessorBuilder;
pub use configuration::{
    ALL_SERVICES_KEY, APP_SERVICES_KEY, COMMON_CONFIG_DONE, CORE_COMMON_CONFIG_SERVICE_KEY,
    Configuration, DEVICE_SERVICES_KEY, ServiceType, WRITABLE_KEY,
};
pub use dispatch::{DispatchOutcome, WritableDispatcher};
pub use duration::parse_duration;
pub use options::BootstrapOptions;
pub use processor::Processor;
pub use shared::{SharedConfig, Updated};
pub use startup::StartupTimer;
