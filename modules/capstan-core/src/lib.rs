//! Capability runtime core: configuration, events, contexts, capability
//! contracts, the registry and counters.

pub mod capability;
pub mod category;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod metrics;
pub mod registry;

pub use capability::{
    AnyCapability, Authorizer, Capability, CapabilityKind, EventTransmitter, Service, Trigger,
};
pub use category::Category;
pub use config::ConfigMap;
pub use context::{Context, ContextError};
pub use error::{CapabilityError, RegistryError, ServiceError};
pub use event::{Event, Metadata};
pub use metrics::{CounterVec, MetricsRegistry};
pub use registry::CapabilityRegistry;

/// Runtime version reported by built-in capabilities.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
