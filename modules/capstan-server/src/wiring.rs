//! Turns a manifest into running triggers.
//!
//! The registry is filled once by [`register_builtin`]. After that phase it
//! is only read: every manifest entry gets a fresh instance, configured and
//! set up before anything is bound to it.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use capstan_core::{
    AnyCapability, Authorizer, CapabilityKind, CapabilityRegistry, EventTransmitter,
    MetricsRegistry, RegistryError, Service, Trigger,
};
use capstan_httpserver::HttpTrigger;
use tracing::{info, warn};

use crate::capabilities::{Echo, ExPanic, HeaderAuthorizer, LogTransmitter};
use crate::manifest::Manifest;

/// Register every capability shipped with the server.
pub fn register_builtin(registry: &CapabilityRegistry, metrics: &Arc<MetricsRegistry>) {
    registry.add_capability(HttpTrigger::prototype(Arc::clone(metrics)));
    registry.add_capability(Echo::prototype());
    registry.add_capability(ExPanic::prototype());
    registry.add_capability(HeaderAuthorizer::prototype());
    registry.add_capability(LogTransmitter::prototype());
    info!(capabilities = registry.len(), "built-in capabilities registered");
}

/// Configured capabilities, grouped by kind and keyed by contract id.
#[derive(Default)]
struct Instances {
    triggers: BTreeMap<String, Box<dyn Trigger>>,
    services: BTreeMap<String, Arc<dyn Service>>,
    authorizers: BTreeMap<String, Arc<dyn Authorizer>>,
    transmitters: BTreeMap<String, Arc<dyn EventTransmitter>>,
    kinds: BTreeMap<String, CapabilityKind>,
}

impl Instances {
    fn insert(&mut self, capability: AnyCapability) -> Result<()> {
        let contract_id = capability.contract_id().to_string();
        if self
            .kinds
            .insert(contract_id.clone(), capability.kind())
            .is_some()
        {
            bail!("capability {contract_id} is listed more than once");
        }

        match capability {
            AnyCapability::Trigger(t) => {
                self.triggers.insert(contract_id, t);
            }
            AnyCapability::Service(s) => {
                self.services.insert(contract_id, Arc::from(s));
            }
            AnyCapability::Authorizer(a) => {
                self.authorizers.insert(contract_id, Arc::from(a));
            }
            AnyCapability::EventTransmitter(t) => {
                self.transmitters.insert(contract_id, Arc::from(t));
            }
            AnyCapability::General(_) => {
                warn!(contract_id = %contract_id, "general capability has nothing to bind to");
            }
        }
        Ok(())
    }

    fn check(&self, contract_id: &str, expected: CapabilityKind) -> Result<()> {
        match self.kinds.get(contract_id) {
            None => Err(anyhow!(
                "{contract_id} is referenced but not listed in [[capabilities]]"
            )),
            Some(found) if *found != expected => Err(RegistryError::KindMismatch {
                contract_id: contract_id.to_string(),
                expected,
                found: *found,
            }
            .into()),
            Some(_) => Ok(()),
        }
    }

    fn trigger(&mut self, contract_id: &str) -> Result<&mut Box<dyn Trigger>> {
        self.check(contract_id, CapabilityKind::Trigger)?;
        self.triggers
            .get_mut(contract_id)
            .ok_or_else(|| anyhow!("trigger {contract_id} not instantiated"))
    }

    fn service(&self, contract_id: &str) -> Result<Arc<dyn Service>> {
        self.check(contract_id, CapabilityKind::Service)?;
        self.services
            .get(contract_id)
            .cloned()
            .ok_or_else(|| anyhow!("service {contract_id} not instantiated"))
    }

    fn authorizer(&self, contract_id: &str) -> Result<Arc<dyn Authorizer>> {
        self.check(contract_id, CapabilityKind::Authorizer)?;
        self.authorizers
            .get(contract_id)
            .cloned()
            .ok_or_else(|| anyhow!("authorizer {contract_id} not instantiated"))
    }

    fn transmitter(&self, contract_id: &str) -> Result<Arc<dyn EventTransmitter>> {
        self.check(contract_id, CapabilityKind::EventTransmitter)?;
        self.transmitters
            .get(contract_id)
            .cloned()
            .ok_or_else(|| anyhow!("event transmitter {contract_id} not instantiated"))
    }
}

/// Wired triggers, ready to start.
pub struct Platform {
    triggers: Vec<Arc<dyn Trigger>>,
}

/// Instantiate, configure and wire everything the manifest names.
pub fn build_platform(registry: &CapabilityRegistry, manifest: &Manifest) -> Result<Platform> {
    let mut instances = Instances::default();

    for entry in &manifest.capabilities {
        let mut capability = registry
            .instantiate(&entry.contract_id)
            .with_context(|| format!("Failed to instantiate {}", entry.contract_id))?;
        capability.set_config_map(entry.values.clone());
        capability
            .setup()
            .with_context(|| format!("Failed to set up {}", entry.contract_id))?;
        instances.insert(capability)?;
    }

    for entry in &manifest.transmitters {
        let transmitter = instances
            .transmitter(&entry.transmitter)
            .with_context(|| format!("Invalid transmitter binding for {}", entry.trigger))?;
        instances
            .trigger(&entry.trigger)
            .with_context(|| format!("Invalid transmitter binding for {}", entry.trigger))?
            .add_event_transmitter(transmitter);
        info!(trigger = %entry.trigger, transmitter = %entry.transmitter, "event transmitter attached");
    }

    for entry in &manifest.triggers {
        let context = || format!("Failed to bind {} to {}", entry.service, entry.trigger);

        let service = instances.service(&entry.service).with_context(context)?;
        let authorizer = entry
            .authorizer
            .as_deref()
            .map(|id| instances.authorizer(id))
            .transpose()
            .with_context(context)?;

        instances
            .trigger(&entry.trigger)
            .with_context(context)?
            .add_service(authorizer, &entry.authorizer_expression, entry.values.clone(), service)
            .with_context(context)?;
        info!(trigger = %entry.trigger, service = %entry.service, "service bound");
    }

    let triggers = instances
        .triggers
        .into_values()
        .map(Arc::<dyn Trigger>::from)
        .collect();

    Ok(Platform { triggers })
}

impl Platform {
    pub fn triggers(&self) -> &[Arc<dyn Trigger>] {
        &self.triggers
    }

    /// Run every trigger until `shutdown` resolves, then stop them and wait
    /// for them to drain.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if self.triggers.is_empty() {
            warn!("manifest defines no triggers, nothing to run");
            return Ok(());
        }

        let run = futures::future::try_join_all(self.triggers.iter().map(|t| t.start()));
        tokio::pin!(run);

        tokio::select! {
            result = &mut run => {
                result.context("trigger failed")?;
                info!("all triggers finished");
                return Ok(());
            }
            _ = shutdown => info!("shutdown requested"),
        }

        self.stop().await;
        run.await.context("trigger failed during shutdown")?;
        info!("all triggers stopped");
        Ok(())
    }

    pub async fn stop(&self) {
        for trigger in &self.triggers {
            if let Err(e) = trigger.stop().await {
                warn!(error = %e, contract_id = trigger.contract_id(), "failed to stop trigger");
            }
        }
    }
}
