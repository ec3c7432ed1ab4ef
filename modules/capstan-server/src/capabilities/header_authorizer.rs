use capstan_core::{
    AnyCapability, Authorizer, Capability, CapabilityError, Category, ConfigMap, Metadata,
};
use tracing::debug;

pub const CONTRACT_ID: &str = "capstan:header_authorizer";

/// Authorizes a request when a header carries an expected value.
///
/// The expression is `name=value`. An empty expression lets everything
/// through; a malformed one lets nothing through.
#[derive(Debug, Default)]
pub struct HeaderAuthorizer {
    values: ConfigMap,
}

impl HeaderAuthorizer {
    pub fn prototype() -> AnyCapability {
        AnyCapability::Authorizer(Box::<HeaderAuthorizer>::default())
    }
}

impl Capability for HeaderAuthorizer {
    fn name(&self) -> &str {
        "capstan_header_authorizer"
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

impl Authorizer for HeaderAuthorizer {
    fn is_authorized(&self, expression: &str, metadata: &Metadata) -> bool {
        let expression = expression.trim();
        if expression.is_empty() {
            return true;
        }

        let Some((name, expected)) = expression.split_once('=') else {
            debug!(expression, "malformed authorizer expression");
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            debug!(expression, "malformed authorizer expression");
            return false;
        }

        metadata.header(name) == Some(expected.trim())
    }
}
