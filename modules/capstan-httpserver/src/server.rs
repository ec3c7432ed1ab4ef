use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use capstan_core::{
    AnyCapability, Authorizer, Capability, CapabilityError, Category, ConfigMap, EventTransmitter,
    MetricsRegistry, Service, Trigger, VERSION,
};
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::dispatch::{Route, RouteHandler, Shared, UNMATCHED_PATH_LABEL};
use crate::error::HttpServerError;
use crate::messages::{language, Messages};
use crate::settings::Settings;

pub const CONTRACT_ID: &str = "capstan:httpserver";
pub const NAME: &str = "capstan_httpserver";

/// Time in-flight requests get to finish after `stop`.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// HTTP trigger: binds services to literal paths and serves them.
pub struct HttpTrigger {
    values: ConfigMap,
    settings: Arc<Settings>,
    metrics: Arc<MetricsRegistry>,
    transmitter: Option<Arc<dyn EventTransmitter>>,
    routes: Vec<Arc<Route>>,
    handlers: Vec<(String, MethodRouter)>,
    handle: Handle,
}

impl HttpTrigger {
    /// A trigger whose counters live in `metrics`. Instances made from it
    /// share the same registry.
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            values: ConfigMap::new(),
            settings: Arc::new(Settings::default()),
            metrics,
            transmitter: None,
            routes: Vec::new(),
            handlers: Vec::new(),
            handle: Handle::new(),
        }
    }

    /// Registry-ready prototype.
    pub fn prototype(metrics: Arc<MetricsRegistry>) -> AnyCapability {
        AnyCapability::Trigger(Box::new(Self::new(metrics)))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Mount a raw axum route next to the service routes.
    pub fn add_handler(&mut self, path: &str, handler: MethodRouter) -> Result<(), HttpServerError> {
        let path = validate_path(path)?;
        if self.is_taken(&path) {
            return Err(HttpServerError::DuplicatePath(path));
        }
        self.handlers.push((path, handler));
        Ok(())
    }

    /// Handler of the service route at `path`, wired with the current
    /// transmitter and counters.
    pub fn handler(&self, path: &str) -> Option<RouteHandler> {
        let shared = self.shared();
        self.routes
            .iter()
            .find(|r| r.path == path)
            .map(|r| RouteHandler::new(shared, Arc::clone(r)))
    }

    /// The complete router: service routes, extra handlers, health, metrics,
    /// static files and the default 404.
    pub fn router(&self) -> Router {
        let shared = self.shared();
        let settings = &self.settings;
        let mut taken = HashSet::new();
        let mut router = Router::new();

        for route in &self.routes {
            taken.insert(route.path.clone());
            router = router.route(
                &route.path,
                route_method_router(RouteHandler::new(Arc::clone(&shared), Arc::clone(route))),
            );
        }

        for (path, handler) in &self.handlers {
            taken.insert(path.clone());
            router = router.route(path, handler.clone());
        }

        if let Some(health_path) = &settings.health_path {
            if mount(&mut taken, health_path, "health") {
                router = router.route(health_path, any(health));
            }
        }

        if settings.metrics_enabled && mount(&mut taken, &settings.metric_path, "metrics") {
            let metrics = Arc::clone(&self.metrics);
            router = router.route(
                &settings.metric_path,
                any(move || async move { metrics.render() }),
            );
            info!(metric_path = %settings.metric_path, "metrics enabled");
        }

        if let Some(dir) = &settings.static_dir {
            let prefix = settings.static_path.trim_end_matches('/');
            if !dir.is_dir() {
                error!(static_dir = %dir.display(), "static_dir is not a directory");
            } else if prefix.is_empty() || !prefix.starts_with('/') {
                error!(static_path = %settings.static_path, "static_path must be a non-root absolute path");
            } else if mount(&mut taken, prefix, "static") {
                debug!(static_path = %settings.static_path, "serving static files");
                router = router.nest_service(prefix, ServeDir::new(dir));
            }
        }

        if settings.default_404_handler_enabled {
            let shared = Arc::clone(&shared);
            router = router.fallback(move |request: Request| async move {
                debug!(path = %request.uri().path(), "no route matched");
                shared.reject(
                    StatusCode::NOT_FOUND,
                    UNMATCHED_PATH_LABEL,
                    &language(request.headers()),
                )
            });
        }

        router.layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request| {
                info_span!(
                    "http_request",
                    request_id = %Uuid::new_v4(),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }),
        )
    }

    /// Address the server is bound to, once listening.
    pub async fn listening(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    fn shared(&self) -> Arc<Shared> {
        Arc::new(Shared::new(
            CONTRACT_ID,
            Arc::clone(&self.settings),
            Messages::new(self.values.clone(), self.settings.default_content_type.clone()),
            self.transmitter.clone(),
            &self.metrics,
        ))
    }

    fn is_taken(&self, path: &str) -> bool {
        self.routes.iter().any(|r| r.path == path) || self.handlers.iter().any(|(p, _)| p == path)
    }

    async fn resolve(&self) -> Result<SocketAddr, HttpServerError> {
        let address = self.settings.address();
        let resolved = tokio::net::lookup_host(&address)
            .await
            .map_err(|source| HttpServerError::Resolve {
                address: address.clone(),
                source,
            })?
            .next();
        resolved.ok_or_else(|| HttpServerError::Resolve {
            address,
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses"),
        })
    }

    async fn serve(&self) -> Result<(), HttpServerError> {
        let addr = self.resolve().await?;
        let app = self.router().into_make_service();

        match self.settings.tls_files() {
            Some((cert, key)) => {
                let tls = RustlsConfig::from_pem_file(cert, key)
                    .await
                    .map_err(HttpServerError::Tls)?;
                info!(address = %addr, tls = true, "http server started");
                axum_server::bind_rustls(addr, tls)
                    .handle(self.handle.clone())
                    .serve(app)
                    .await?;
            }
            None => {
                info!(address = %addr, tls = false, "http server started");
                axum_server::bind(addr)
                    .handle(self.handle.clone())
                    .serve(app)
                    .await?;
            }
        }

        info!(address = %addr, "http server stopped");
        Ok(())
    }
}

impl Capability for HttpTrigger {
    fn name(&self) -> &str {
        NAME
    }

    fn version(&self) -> &str {
        VERSION
    }

    fn category(&self) -> Category {
        Category::Trigger
    }

    fn contract_id(&self) -> &str {
        CONTRACT_ID
    }

    fn config_map(&self) -> &ConfigMap {
        &self.values
    }

    fn set_config_map(&mut self, values: ConfigMap) {
        self.settings = Arc::new(Settings::from_config(&values));
        self.values = values;
    }

    fn setup(&mut self) -> Result<(), CapabilityError> {
        if let Some(health_path) = &self.settings.health_path {
            validate_path(health_path)?;
        }
        validate_path(&self.settings.metric_path)?;

        info!(
            host = %self.settings.host,
            port = %self.settings.port,
            timeout = ?self.settings.request_timeout,
            "http server setup complete"
        );
        Ok(())
    }

    fn new_instance(&self) -> AnyCapability {
        Self::prototype(Arc::clone(&self.metrics))
    }
}

#[async_trait]
impl Trigger for HttpTrigger {
    async fn start(&self) -> Result<(), CapabilityError> {
        self.serve().await.map_err(CapabilityError::from)
    }

    async fn stop(&self) -> Result<(), CapabilityError> {
        info!(grace = ?SHUTDOWN_GRACE, "http server stopping");
        self.handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        Ok(())
    }

    fn event_transmitter(&self) -> Option<Arc<dyn EventTransmitter>> {
        self.transmitter.clone()
    }

    fn add_event_transmitter(&mut self, transmitter: Arc<dyn EventTransmitter>) {
        self.transmitter = Some(transmitter);
    }

    fn add_service(
        &mut self,
        authorizer: Option<Arc<dyn Authorizer>>,
        expression: &str,
        values: ConfigMap,
        service: Arc<dyn Service>,
    ) -> Result<(), CapabilityError> {
        debug!(
            authorizer = authorizer.as_ref().map(|a| a.contract_id()),
            expression,
            service = service.contract_id(),
            "service add"
        );

        let methods = parse_methods(&values.string("method", ""))?;
        let path = values.string("path", "");
        if path.trim().is_empty() {
            return Err(HttpServerError::PathNotDefined.into());
        }
        let path = validate_path(&path)?;
        if self.is_taken(&path) {
            return Err(HttpServerError::DuplicatePath(path).into());
        }

        self.routes.push(Arc::new(Route {
            path,
            methods,
            authorizer,
            expression: expression.to_string(),
            service,
        }));
        Ok(())
    }
}

/// Uppercase, comma-split, trim and sort a method list.
pub(crate) fn parse_methods(raw: &str) -> Result<Vec<String>, HttpServerError> {
    let mut methods: Vec<String> = raw
        .split(',')
        .map(|m| m.trim().to_ascii_uppercase())
        .filter(|m| !m.is_empty())
        .collect();
    if methods.is_empty() {
        return Err(HttpServerError::MethodNotDefined);
    }
    methods.sort();
    methods.dedup();
    Ok(methods)
}

/// Paths are literal: absolute, without capture or wildcard segments.
pub(crate) fn validate_path(raw: &str) -> Result<String, HttpServerError> {
    let path = raw.trim().to_string();
    let invalid = |reason| HttpServerError::InvalidPath {
        path: path.clone(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path.contains(['{', '}']) {
        return Err(invalid("must not contain braces"));
    }
    if path
        .split('/')
        .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
    {
        return Err(invalid("must not contain capture segments"));
    }
    Ok(path)
}

fn route_method_router(handler: RouteHandler) -> MethodRouter {
    any(move |request: Request| {
        let handler = handler.clone();
        async move {
            // Cancelled when the connection drops this future.
            let upstream = CancellationToken::new();
            let _client = upstream.clone().drop_guard();
            handler.handle(request, upstream).await
        }
    })
}

fn mount(taken: &mut HashSet<String>, path: &str, what: &str) -> bool {
    if taken.insert(path.to_string()) {
        true
    } else {
        warn!(path, route = what, "path already taken, route not mounted");
        false
    }
}

async fn health() -> Response {
    info!("HEALTH OK");
    StatusCode::OK.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn methods_are_normalized() {
        assert_eq!(
            parse_methods(" post, get ,GET").unwrap(),
            vec!["GET".to_string(), "POST".to_string()]
        );
    }

    #[test]
    fn empty_method_list_is_rejected() {
        assert!(matches!(
            parse_methods(" , "),
            Err(HttpServerError::MethodNotDefined)
        ));
    }

    #[test]
    fn paths_must_be_literal_and_absolute() {
        assert_eq!(validate_path(" /echo ").unwrap(), "/echo");
        assert!(validate_path("echo").is_err());
        assert!(validate_path("/users/{id}").is_err());
        assert!(validate_path("/users/:id").is_err());
        assert!(validate_path("/files/*rest").is_err());
    }
}
