//! Per-request dispatch: method check, event construction, authorization,
//! the bounded service call and response materialization.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{Query, Request};
use axum::http::header::HOST;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use capstan_core::{
    Authorizer, Context, CounterVec, Event, EventTransmitter, MetricsRegistry, Metadata, Service,
    ServiceError,
};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument, Span};

use crate::messages::{language, Messages};
use crate::settings::Settings;

pub const RESPONSE_STATUS_METRIC: &str = "capstan_httpserver_response_status";
pub const PANIC_COUNTER_METRIC: &str = "capstan_httpserver_panic_counter";

/// `path` label for requests that matched no route. Unmatched paths share
/// one series so clients cannot grow the counter map.
pub const UNMATCHED_PATH_LABEL: &str = "unmatched";

/// Status written when a client went away before the response was ready.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

const DEFAULT_TYPE_URL: &str = "application/text";

/// A service bound to a path.
pub(crate) struct Route {
    pub path: String,
    /// Uppercased, trimmed and sorted.
    pub methods: Vec<String>,
    pub authorizer: Option<Arc<dyn Authorizer>>,
    pub expression: String,
    pub service: Arc<dyn Service>,
}

/// State shared by every route of one trigger.
pub(crate) struct Shared {
    pub contract_id: String,
    pub settings: Arc<Settings>,
    pub messages: Messages,
    pub transmitter: Option<Arc<dyn EventTransmitter>>,
    pub response_status: Arc<CounterVec>,
    pub panic_counter: Arc<CounterVec>,
}

impl Shared {
    pub fn new(
        contract_id: &str,
        settings: Arc<Settings>,
        messages: Messages,
        transmitter: Option<Arc<dyn EventTransmitter>>,
        metrics: &MetricsRegistry,
    ) -> Self {
        Self {
            contract_id: contract_id.to_string(),
            settings,
            messages,
            transmitter,
            response_status: metrics.counter_vec(
                RESPONSE_STATUS_METRIC,
                "Status of HTTP responses",
                &["path", "status"],
            ),
            panic_counter: metrics.counter_vec(
                PANIC_COUNTER_METRIC,
                "Panics recovered while serving HTTP requests",
                &["contractid"],
            ),
        }
    }

    /// Count and render a templated error response.
    pub fn reject(&self, status: StatusCode, path: &str, lang: &str) -> Response {
        self.response_status.inc(&[path, status.as_str()]);
        self.messages.response(status, lang)
    }

    fn transmit_input(&self, service_id: &str, event: Arc<Event>) {
        let Some(transmitter) = self.transmitter.clone() else {
            return;
        };
        let service_id = service_id.to_string();
        tokio::spawn(
            async move {
                if let Err(e) = transmitter.transmit_input_event(&service_id, event).await {
                    warn!(error = %e, contract_id = %service_id, "input event transmission failed");
                }
            }
            .in_current_span(),
        );
    }

    fn transmit_output(&self, service_id: &str, event: Arc<Event>) {
        let Some(transmitter) = self.transmitter.clone() else {
            return;
        };
        let service_id = service_id.to_string();
        tokio::spawn(
            async move {
                if let Err(e) = transmitter.transmit_output_event(&service_id, event).await {
                    warn!(error = %e, contract_id = %service_id, "output event transmission failed");
                }
            }
            .in_current_span(),
        );
    }
}

/// Request details kept outside the dispatch task for panic reports.
struct RequestInfo {
    host: String,
    path: String,
    method: String,
    uri: String,
    lang: String,
}

impl RequestInfo {
    fn of(request: &Request) -> Self {
        let host = request
            .uri()
            .host()
            .map(str::to_string)
            .or_else(|| {
                request
                    .headers()
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        Self {
            host,
            path: request.uri().path().to_string(),
            method: request.method().to_string(),
            uri: request.uri().to_string(),
            lang: language(request.headers()),
        }
    }
}

enum Race {
    ClientGone,
    TimedOut,
    Finished(Result<Result<Event, ServiceError>, JoinError>),
}

/// Handler for one route.
///
/// Obtained from [`HttpTrigger::handler`](crate::HttpTrigger::handler) so a
/// request can be driven with an explicit upstream cancellation token.
#[derive(Clone)]
pub struct RouteHandler {
    shared: Arc<Shared>,
    route: Arc<Route>,
}

impl RouteHandler {
    pub(crate) fn new(shared: Arc<Shared>, route: Arc<Route>) -> Self {
        Self { shared, route }
    }

    pub fn path(&self) -> &str {
        &self.route.path
    }

    pub fn methods(&self) -> &[String] {
        &self.route.methods
    }

    /// Serve `request`. Cancelling `upstream` means the client is gone.
    ///
    /// The dispatch runs as its own task: a panic anywhere inside it is
    /// contained here, counted once and answered with 500.
    pub async fn handle(&self, request: Request, upstream: CancellationToken) -> Response {
        let info = RequestInfo::of(&request);
        let this = self.clone();

        let task = tokio::spawn(
            async move { this.dispatch(request, upstream).await }.instrument(Span::current()),
        );

        match task.await {
            Ok(response) => response,
            Err(e) => self.fault(&info, e),
        }
    }

    async fn dispatch(&self, request: Request, upstream: CancellationToken) -> Response {
        let started = Instant::now();
        debug!(timeout = ?self.shared.settings.request_timeout, "request local timeout");
        debug!("request started");
        debug!(
            path = %request.uri().path(),
            method = %request.method(),
            path_with_query = %request.uri(),
            "request data"
        );

        let response = self.run(request, upstream).await;

        debug!(
            status = response.status().as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "request completed"
        );
        response
    }

    async fn run(&self, request: Request, upstream: CancellationToken) -> Response {
        let shared = &self.shared;
        let route = &self.route;
        let info = RequestInfo::of(&request);
        let (parts, body) = request.into_parts();

        if !route.methods.iter().any(|m| m == parts.method.as_str()) {
            return shared.reject(StatusCode::METHOD_NOT_ALLOWED, &info.path, &info.lang);
        }

        let mut metadata = Metadata::new(parts.method.as_str(), parts.uri.path());
        metadata.push_contract_id(&shared.contract_id);
        for (name, value) in &parts.headers {
            metadata.insert_header(name.as_str(), String::from_utf8_lossy(value.as_bytes()));
        }
        if let Ok(Query(pairs)) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri) {
            for (key, value) in pairs {
                metadata.insert_query(key, value);
            }
        }

        if let Some(authorizer) = &route.authorizer {
            if !authorizer.is_authorized(&route.expression, &metadata) {
                debug!(authorizer = authorizer.contract_id(), "request not authorized");
                return shared.reject(StatusCode::FORBIDDEN, &info.path, &info.lang);
            }
        }

        let value = match to_bytes(body, usize::MAX).await {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(error = %e, contract_id = %shared.contract_id, "failed to read request body");
                return shared.reject(StatusCode::INTERNAL_SERVER_ERROR, &info.path, &info.lang);
            }
        };

        let type_url = metadata
            .header("content-type")
            .unwrap_or(DEFAULT_TYPE_URL)
            .to_string();
        let input = Arc::new(Event::new(metadata, type_url, value));
        let service_id = route.service.contract_id().to_string();

        shared.transmit_input(&service_id, Arc::clone(&input));

        if upstream.is_cancelled() {
            return shared.reject(client_closed(), &info.path, &info.lang);
        }

        let ctx = Context::with_timeout(&upstream, shared.settings.request_timeout);
        let deadline = ctx.deadline().unwrap_or_else(tokio::time::Instant::now);
        // Released on every exit path; a detached late service sees it cancelled.
        let _release = ctx.cancellation_token().clone().drop_guard();

        let service = Arc::clone(&route.service);
        let mut task =
            tokio::spawn(async move { service.serve(ctx, input).await }.in_current_span());

        let race = tokio::select! {
            biased;
            _ = upstream.cancelled() => Race::ClientGone,
            _ = tokio::time::sleep_until(deadline) => Race::TimedOut,
            joined = &mut task => Race::Finished(joined),
        };

        match race {
            Race::ClientGone => {
                debug!("client went away before the service finished");
                shared.reject(client_closed(), &info.path, &info.lang)
            }
            Race::TimedOut => {
                debug!("service exceeded the request timeout");
                shared.reject(StatusCode::REQUEST_TIMEOUT, &info.path, &info.lang)
            }
            Race::Finished(Err(e)) => self.fault(&info, e),
            Race::Finished(Ok(Err(e))) => {
                let status = match &e {
                    ServiceError::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
                    ServiceError::Canceled => client_closed(),
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                error!(
                    error = %e,
                    contract_id = %service_id,
                    retryable = e.is_retryable(),
                    status = status.as_u16(),
                    "service returned an error"
                );
                shared.reject(status, &info.path, &info.lang)
            }
            Race::Finished(Ok(Ok(output))) => self.respond(output, &service_id, &info),
        }
    }

    fn respond(&self, output: Event, service_id: &str, info: &RequestInfo) -> Response {
        let shared = &self.shared;

        let status = match output.metadata.status_code {
            0 => Some(StatusCode::OK),
            code => u16::try_from(code)
                .ok()
                .and_then(|c| StatusCode::from_u16(c).ok()),
        };
        let Some(status) = status else {
            error!(
                status_code = output.metadata.status_code,
                contract_id = %service_id,
                "service declared an invalid status code"
            );
            return shared.reject(StatusCode::INTERNAL_SERVER_ERROR, &info.path, &info.lang);
        };

        let mut response = Response::new(Body::from(output.value.clone()));
        *response.status_mut() = status;
        for (name, value) in &output.metadata.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => warn!(header = %name, contract_id = %service_id, "skipping invalid response header"),
            }
        }

        shared.response_status.inc(&[&info.path, status.as_str()]);
        shared.transmit_output(service_id, Arc::new(output));

        response
    }

    /// A task that did not return: a panic is counted against the route's
    /// service, an aborted task only logged. Both answer 500.
    fn fault(&self, info: &RequestInfo, err: JoinError) -> Response {
        let service_id = self.route.service.contract_id();

        match err.try_into_panic() {
            Ok(payload) => {
                info!("recovering from panic");
                error!(
                    host = %info.host,
                    path = %info.path,
                    method = %info.method,
                    uri = %info.uri,
                    panic_msg = %panic_message(payload),
                    contract_id = %service_id,
                    "panic data"
                );
                self.shared.panic_counter.inc(&[service_id]);
            }
            Err(e) => error!(error = %e, contract_id = %service_id, "request task aborted"),
        }

        self.shared
            .reject(StatusCode::INTERNAL_SERVER_ERROR, &info.path, &info.lang)
    }
}

fn client_closed() -> StatusCode {
    StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
