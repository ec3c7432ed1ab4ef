use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::capability::{
    AnyCapability, Authorizer, CapabilityKind, EventTransmitter, Service, Trigger,
};
use crate::error::RegistryError;

/// Catalog of capability prototypes keyed by contract id.
///
/// Owned by the bootstrap layer and filled during its initialization phase.
/// Prototypes are never mutated; every lookup that hands out a usable
/// capability returns a fresh instance.
#[derive(Default)]
pub struct CapabilityRegistry {
    prototypes: DashMap<String, Arc<AnyCapability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prototype. Re-registering a contract id replaces the
    /// previous prototype, which is returned.
    pub fn add_capability(&self, prototype: AnyCapability) -> Option<Arc<AnyCapability>> {
        let contract_id = prototype.contract_id().to_string();
        let kind = prototype.kind();
        let previous = self
            .prototypes
            .insert(contract_id.clone(), Arc::new(prototype));

        match &previous {
            Some(old) => warn!(
                contract_id = %contract_id,
                previous_version = old.version(),
                "capability re-registered, replacing previous prototype"
            ),
            None => debug!(contract_id = %contract_id, kind = %kind, "capability registered"),
        }

        previous
    }

    /// The shared prototype for `contract_id`.
    pub fn get(&self, contract_id: &str) -> Option<Arc<AnyCapability>> {
        self.prototypes
            .get(contract_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// A fresh, unconfigured instance of `contract_id`.
    pub fn instantiate(&self, contract_id: &str) -> Result<AnyCapability, RegistryError> {
        // Clone the Arc out first so the shard lock is not held while the
        // prototype builds its instance.
        let prototype = self.get(contract_id).ok_or_else(|| RegistryError::NotFound {
            contract_id: contract_id.to_string(),
        })?;
        Ok(prototype.new_instance())
    }

    pub fn new_service(&self, contract_id: &str) -> Result<Box<dyn Service>, RegistryError> {
        self.instantiate(contract_id)?
            .into_service()
            .map_err(|other| mismatch(contract_id, CapabilityKind::Service, &other))
    }

    pub fn new_trigger(&self, contract_id: &str) -> Result<Box<dyn Trigger>, RegistryError> {
        self.instantiate(contract_id)?
            .into_trigger()
            .map_err(|other| mismatch(contract_id, CapabilityKind::Trigger, &other))
    }

    pub fn new_authorizer(&self, contract_id: &str) -> Result<Box<dyn Authorizer>, RegistryError> {
        self.instantiate(contract_id)?
            .into_authorizer()
            .map_err(|other| mismatch(contract_id, CapabilityKind::Authorizer, &other))
    }

    pub fn new_event_transmitter(
        &self,
        contract_id: &str,
    ) -> Result<Box<dyn EventTransmitter>, RegistryError> {
        self.instantiate(contract_id)?
            .into_event_transmitter()
            .map_err(|other| mismatch(contract_id, CapabilityKind::EventTransmitter, &other))
    }

    pub fn contains(&self, contract_id: &str) -> bool {
        self.prototypes.contains_key(contract_id)
    }

    /// Registered contract ids, sorted.
    pub fn contract_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.prototypes.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

fn mismatch(contract_id: &str, expected: CapabilityKind, found: &AnyCapability) -> RegistryError {
    RegistryError::KindMismatch {
        contract_id: contract_id.to_string(),
        expected,
        found: found.kind(),
    }
}
