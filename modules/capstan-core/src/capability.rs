//! Capability contracts.
//!
//! Every plugin satisfies [`Capability`]. The specializations below are what
//! the runtime actually wires together: triggers receive traffic, hand it to
//! services, consult authorizers and report to event transmitters.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::category::Category;
use crate::config::ConfigMap;
use crate::context::Context;
use crate::error::{CapabilityError, ServiceError};
use crate::event::{Event, Metadata};

/// Base contract shared by all capabilities.
///
/// A registered value is a zero-configured prototype. It never serves
/// traffic; `new_instance` manufactures the instances that do.
pub trait Capability: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn category(&self) -> Category;
    /// Stable, globally unique identifier. The registry key.
    fn contract_id(&self) -> &str;

    fn config_map(&self) -> &ConfigMap;
    fn set_config_map(&mut self, values: ConfigMap);

    /// Validate configuration and acquire resources. Called once, after
    /// `set_config_map` and before the instance is used.
    fn setup(&mut self) -> Result<(), CapabilityError>;

    fn new_instance(&self) -> AnyCapability;
}

/// Request/response unit of business logic.
///
/// One instance serves any number of concurrent requests after `setup`.
#[async_trait]
pub trait Service: Capability {
    async fn serve(&self, ctx: Context, event: Arc<Event>) -> Result<Event, ServiceError>;
}

/// Pure, synchronous access decision.
pub trait Authorizer: Capability {
    fn is_authorized(&self, expression: &str, metadata: &Metadata) -> bool;
}

/// Best-effort observer of the events a trigger handles.
///
/// Callers run transmissions detached and only log failures.
#[async_trait]
pub trait EventTransmitter: Capability {
    async fn transmit_input_event(&self, contract_id: &str, event: Arc<Event>)
        -> anyhow::Result<()>;
    async fn transmit_output_event(
        &self,
        contract_id: &str,
        event: Arc<Event>,
    ) -> anyhow::Result<()>;
}

/// Entry point that turns external stimuli into service calls.
#[async_trait]
pub trait Trigger: Capability {
    /// Run until `stop` is called or the trigger fails.
    async fn start(&self) -> Result<(), CapabilityError>;
    async fn stop(&self) -> Result<(), CapabilityError>;

    fn event_transmitter(&self) -> Option<Arc<dyn EventTransmitter>>;
    fn add_event_transmitter(&mut self, transmitter: Arc<dyn EventTransmitter>);

    /// Bind `service` using the trigger-specific route `values`.
    fn add_service(
        &mut self,
        authorizer: Option<Arc<dyn Authorizer>>,
        expression: &str,
        values: ConfigMap,
        service: Arc<dyn Service>,
    ) -> Result<(), CapabilityError>;
}

/// Which specialization a capability implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityKind {
    Service,
    Trigger,
    Authorizer,
    EventTransmitter,
    General,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CapabilityKind::Service => "service",
            CapabilityKind::Trigger => "trigger",
            CapabilityKind::Authorizer => "authorizer",
            CapabilityKind::EventTransmitter => "event transmitter",
            CapabilityKind::General => "general capability",
        };
        f.write_str(name)
    }
}

/// A capability of any kind, as stored in the registry.
pub enum AnyCapability {
    Service(Box<dyn Service>),
    Trigger(Box<dyn Trigger>),
    Authorizer(Box<dyn Authorizer>),
    EventTransmitter(Box<dyn EventTransmitter>),
    General(Box<dyn Capability>),
}

macro_rules! delegate {
    ($self:expr, $cap:ident => $body:expr) => {
        match $self {
            AnyCapability::Service($cap) => $body,
            AnyCapability::Trigger($cap) => $body,
            AnyCapability::Authorizer($cap) => $body,
            AnyCapability::EventTransmitter($cap) => $body,
            AnyCapability::General($cap) => $body,
        }
    };
}

impl AnyCapability {
    pub fn kind(&self) -> CapabilityKind {
        match self {
            AnyCapability::Service(_) => CapabilityKind::Service,
            AnyCapability::Trigger(_) => CapabilityKind::Trigger,
            AnyCapability::Authorizer(_) => CapabilityKind::Authorizer,
            AnyCapability::EventTransmitter(_) => CapabilityKind::EventTransmitter,
            AnyCapability::General(_) => CapabilityKind::General,
        }
    }

    pub fn name(&self) -> &str {
        delegate!(self, c => c.name())
    }

    pub fn version(&self) -> &str {
        delegate!(self, c => c.version())
    }

    pub fn category(&self) -> Category {
        delegate!(self, c => c.category())
    }

    pub fn contract_id(&self) -> &str {
        delegate!(self, c => c.contract_id())
    }

    pub fn config_map(&self) -> &ConfigMap {
        delegate!(self, c => c.config_map())
    }

    pub fn set_config_map(&mut self, values: ConfigMap) {
        delegate!(self, c => c.set_config_map(values))
    }

    pub fn setup(&mut self) -> Result<(), CapabilityError> {
        delegate!(self, c => c.setup())
    }

    pub fn new_instance(&self) -> AnyCapability {
        delegate!(self, c => c.new_instance())
    }

    pub fn into_service(self) -> Result<Box<dyn Service>, Self> {
        match self {
            AnyCapability::Service(s) => Ok(s),
            other => Err(other),
        }
    }

    pub fn into_trigger(self) -> Result<Box<dyn Trigger>, Self> {
        match self {
            AnyCapability::Trigger(t) => Ok(t),
            other => Err(other),
        }
    }

    pub fn into_authorizer(self) -> Result<Box<dyn Authorizer>, Self> {
        match self {
            AnyCapability::Authorizer(a) => Ok(a),
            other => Err(other),
        }
    }

    pub fn into_event_transmitter(self) -> Result<Box<dyn EventTransmitter>, Self> {
        match self {
            AnyCapability::EventTransmitter(t) => Ok(t),
            other => Err(other),
        }
    }
}

impl fmt::Debug for AnyCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyCapability")
            .field("kind", &self.kind())
            .field("contract_id", &self.contract_id())
            .field("version", &self.version())
            .finish()
    }
}
