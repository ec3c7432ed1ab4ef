//! Registry behavior with real capability implementations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use capstan_core::{
    AnyCapability, Capability, CapabilityError, CapabilityKind, CapabilityRegistry, Category,
    ConfigMap, Context, Event, Metadata, RegistryError, Service, ServiceError,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

struct Greeter {
    version: &'static str,
    values: ConfigMap,
    greeting: Option<String>,
    instances: Arc<AtomicUsize>,
}

impl Greeter {
    fn prototype(version: &'static str, instances: Arc<AtomicUsize>) -> AnyCapability {
        AnyCapability::Service(Box::new(Greeter {
            version,
            values: ConfigMap::new(),
            greeting: None,
            instances,
        }))
    }
}

impl Capability for Greeter {
    fn name(&self) -> &str {
        "greeter"
    }
    fn version(&self) -> &str {
        self.version
    }
    fn category(&self) -> Category {
        Category::Service
    }
    fn contract_id(&self) -> &str {
        "test:greeter"
    }
    fn config_map(&self) -> &ConfigMap {
        &self.values
    }
    fn set_config_map(&mut self, values: ConfigMap) {
        self.values = values;
    }
    fn setup(&mut self) -> Result<(), CapabilityError> {
        let greeting = self
            .values
            .get("greeting")
            .ok_or_else(|| CapabilityError::MissingConfig("greeting".into()))?;
        self.greeting = Some(greeting.to_string());
        Ok(())
    }
    fn new_instance(&self) -> AnyCapability {
        self.instances.fetch_add(1, Ordering::SeqCst);
        Greeter::prototype(self.version, Arc::clone(&self.instances))
    }
}

#[async_trait]
impl Service for Greeter {
    async fn serve(&self, _ctx: Context, event: Arc<Event>) -> Result<Event, ServiceError> {
        let greeting = self
            .greeting
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("greeter not set up"))?;
        let body = format!("{greeting}, {}", String::from_utf8_lossy(&event.value));
        Ok(Event::new(
            Metadata::default().with_status(200, "OK"),
            "application/text",
            body,
        ))
    }
}

fn registry_with_greeter() -> (CapabilityRegistry, Arc<AtomicUsize>) {
    let instances = Arc::new(AtomicUsize::new(0));
    let registry = CapabilityRegistry::new();
    registry.add_capability(Greeter::prototype("1.0.0", Arc::clone(&instances)));
    (registry, instances)
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[test]
fn get_returns_the_shared_prototype() {
    let (registry, instances) = registry_with_greeter();

    let a = registry.get("test:greeter").unwrap();
    let b = registry.get("test:greeter").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.kind(), CapabilityKind::Service);
    assert_eq!(instances.load(Ordering::SeqCst), 0);
}

#[test]
fn unknown_contract_id_is_not_found() {
    let registry = CapabilityRegistry::new();
    assert!(registry.get("test:missing").is_none());
    assert_eq!(
        registry.instantiate("test:missing").unwrap_err(),
        RegistryError::NotFound {
            contract_id: "test:missing".into()
        }
    );
}

#[test]
fn typed_lookup_rejects_other_kinds() {
    let (registry, _) = registry_with_greeter();
    let err = registry.new_trigger("test:greeter").err().unwrap();
    assert_eq!(
        err,
        RegistryError::KindMismatch {
            contract_id: "test:greeter".into(),
            expected: CapabilityKind::Trigger,
            found: CapabilityKind::Service,
        }
    );
    assert!(registry.new_authorizer("test:greeter").is_err());
    assert!(registry.new_event_transmitter("test:greeter").is_err());
}

#[test]
fn re_registration_replaces_prototype() {
    let (registry, instances) = registry_with_greeter();
    let previous = registry.add_capability(Greeter::prototype("2.0.0", instances));

    assert_eq!(previous.map(|p| p.version().to_string()).as_deref(), Some("1.0.0"));
    assert_eq!(registry.get("test:greeter").unwrap().version(), "2.0.0");
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.contract_ids(), vec!["test:greeter"]);
}

// ---------------------------------------------------------------------------
// Instantiation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn instances_are_fresh_and_independently_configured() {
    let (registry, instances) = registry_with_greeter();

    let mut service = registry.new_service("test:greeter").unwrap();
    assert_eq!(instances.load(Ordering::SeqCst), 1);
    assert!(service.config_map().is_empty());

    service.set_config_map([("greeting", "hello")].into_iter().collect());
    service.setup().unwrap();

    let input = Arc::new(Event::new(Metadata::default(), "application/text", "world"));
    let output = service.serve(Context::background(), input).await.unwrap();
    assert_eq!(&output.value[..], b"hello, world");

    // The prototype stays untouched.
    assert!(registry.get("test:greeter").unwrap().config_map().is_empty());
}

#[test]
fn setup_reports_missing_config() {
    let (registry, _) = registry_with_greeter();
    let mut service = registry.new_service("test:greeter").unwrap();
    let err = service.setup().unwrap_err();
    assert_eq!(err.to_string(), "missing required config key: greeting");
}

#[test]
fn concurrent_readers_see_registered_prototypes() {
    let (registry, _) = registry_with_greeter();
    let registry = Arc::new(registry);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || registry.new_service("test:greeter").is_ok())
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
}
