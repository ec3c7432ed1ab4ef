use std::sync::Arc;

use async_trait::async_trait;
use capstan_core::{
    AnyCapability, Capability, CapabilityError, Category, ConfigMap, Context, Event, Service,
    ServiceError,
};

pub const CONTRACT_ID: &str = "capstan:ex_panic";

/// Panics on every request. Useful for checking fault containment and the
/// panic counter of a deployed trigger.
#[derive(Debug, Default)]
pub struct ExPanic {
    values: ConfigMap,
}

impl ExPanic {
    pub fn prototype() -> AnyCapability {
        AnyCapability::Service(Box::<ExPanic>::default())
    }
}

impl Capability for ExPanic {
    fn name(&self) -> &str {
        "capstan_example_panic"
    }

    fn version(&self) -> &str {
        "0.0.1"
    }

    fn category(&self) -> Category {
        Category::Service
    }

    fn contract_id(&self) -> &str {
        CONTRACT_ID
    }

    fn config_map(&self) -> &ConfigMap {
        &self.values
    }

    fn set_config_map(&mut self, values: ConfigMap) {
        self.values = values;
    }

    fn setup(&mut self) -> Result<(), CapabilityError> {
        Ok(())
    }

    fn new_instance(&self) -> AnyCapability {
        Self::prototype()
    }
}

#[async_trait]
impl Service for ExPanic {
    async fn serve(&self, _ctx: Context, input: Arc<Event>) -> Result<Event, ServiceError> {
        panic!(
            "{CONTRACT_ID} refused {} {}",
            input.metadata.method, input.metadata.path
        );
    }
}
