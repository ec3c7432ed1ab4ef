use capstan_core::CapabilityError;
use thiserror::Error;

/// Failures raised by the HTTP trigger outside of request handling.
#[derive(Debug, Error)]
pub enum HttpServerError {
    /// Route values carry no `method`.
    #[error("method not defined")]
    MethodNotDefined,

    /// Route values carry no `path`.
    #[error("path not defined")]
    PathNotDefined,

    /// Paths are literal and absolute.
    #[error("invalid route path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("route already registered: {0}")]
    DuplicatePath(String),

    #[error("could not resolve listen address {address}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load TLS certificate or key")]
    Tls(#[source] std::io::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<HttpServerError> for CapabilityError {
    fn from(err: HttpServerError) -> Self {
        match err {
            HttpServerError::MethodNotDefined => CapabilityError::MissingConfig("method".into()),
            HttpServerError::PathNotDefined => CapabilityError::MissingConfig("path".into()),
            HttpServerError::InvalidPath { path, reason } => CapabilityError::InvalidConfig {
                key: "path".into(),
                reason: format!("{path:?}: {reason}"),
            },
            HttpServerError::Io(e) => CapabilityError::Io(e),
            other => CapabilityError::Other(anyhow::Error::new(other)),
        }
    }
}
