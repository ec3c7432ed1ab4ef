use std::sync::Arc;

use async_trait::async_trait;
use capstan_core::{
    AnyCapability, Capability, CapabilityError, Category, ConfigMap, Event, EventTransmitter,
};
use tracing::info;

pub const CONTRACT_ID: &str = "capstan:log_transmitter";

/// Logs every transmitted event.
#[derive(Debug, Default)]
pub struct LogTransmitter {
    values: ConfigMap,
}

impl LogTransmitter {
    pub fn prototype() -> AnyCapability {
        AnyCapability::EventTransmitter(Box::<LogTransmitter>::default())
    }
}

impl Capability for LogTransmitter {
    fn name(&self) -> &str {
        "capstan_log_transmitter"
    }

    fn version(&self) -> &str {
        capstan_core::VERSION
    }

    fn category(&self) -> Category {
        Category::General
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
impl EventTransmitter for LogTransmitter {
    async fn transmit_input_event(&self, contract_id: &str, event: Arc<Event>) -> anyhow::Result<()> {
        info!(
            contract_id,
            direction = "input",
            method = %event.metadata.method,
            path = %event.metadata.path,
            type_url = %event.type_url,
            bytes = event.value.len(),
            "event transmitted"
        );
        Ok(())
    }

    async fn transmit_output_event(
        &self,
        contract_id: &str,
        event: Arc<Event>,
    ) -> anyhow::Result<()> {
        info!(
            contract_id,
            direction = "output",
            status = event.metadata.status_code,
            chain = ?event.metadata.contract_id_list,
            type_url = %event.type_url,
            bytes = event.value.len(),
            "event transmitted"
        );
        Ok(())
    }
}
