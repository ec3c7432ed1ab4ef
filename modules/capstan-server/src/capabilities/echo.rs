use std::sync::Arc;

use async_trait::async_trait;
use capstan_core::{
    AnyCapability, Capability, CapabilityError, Category, ConfigMap, Context, Event, Metadata,
    Service, ServiceError,
};

pub const CONTRACT_ID: &str = "capstan:ex_echo";

/// Answers every request with a canned body shaped by the input type.
#[derive(Debug, Default)]
pub struct Echo {
    values: ConfigMap,
}

impl Echo {
    pub fn prototype() -> AnyCapability {
        AnyCapability::Service(Box::<Echo>::default())
    }
}

impl Capability for Echo {
    fn name(&self) -> &str {
        "capstan_example_echo"
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
impl Service for Echo {
    async fn serve(&self, _ctx: Context, input: Arc<Event>) -> Result<Event, ServiceError> {
        let (type_url, body): (&str, &'static str) = match input.type_url.as_str() {
            "application/json" => ("application/json", r#"{"message":"echo"}"#),
            "application/text" => ("application/text", "echo"),
            _ => ("application/text", "default echo"),
        };

        let mut metadata = Metadata::default().with_status(200, "OK");
        metadata.insert_header("content-type", type_url);
        metadata.contract_id_list = input.metadata.contract_id_list.clone();
        metadata.push_contract_id(CONTRACT_ID);

        Ok(Event::new(metadata, type_url, body))
    }
}
