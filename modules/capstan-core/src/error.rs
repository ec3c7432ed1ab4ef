use capstan_errors::StructuredError;
use thiserror::Error;

use crate::capability::CapabilityKind;
use crate::context::ContextError;

/// Failures while configuring, setting up or running a capability.
#[derive(Debug, Error)]
pub enum CapabilityError {
    /// A required configuration key is absent.
    #[error("missing required config key: {0}")]
    MissingConfig(String),

    /// A configuration value is present but unusable.
    #[error("invalid config value for {key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    /// The capability was used before `setup`.
    #[error("capability not set up: {0}")]
    NotSetUp(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Lookup failures in the capability registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("capability not found: {contract_id}")]
    NotFound { contract_id: String },

    #[error("capability {contract_id} is a {found}, expected a {expected}")]
    KindMismatch {
        contract_id: String,
        expected: CapabilityKind,
        found: CapabilityKind,
    },
}

/// Outcome of a failed [`Service::serve`](crate::Service::serve) call.
///
/// The dispatcher maps `DeadlineExceeded` and `Canceled` onto dedicated
/// transport statuses; every other variant is a plain server error.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error("context canceled")]
    Canceled,

    #[error("{0}")]
    Structured(#[from] StructuredError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ContextError> for ServiceError {
    fn from(err: ContextError) -> Self {
        match err {
            ContextError::Canceled => ServiceError::Canceled,
            ContextError::DeadlineExceeded => ServiceError::DeadlineExceeded,
        }
    }
}

impl ServiceError {
    /// Retry hint taken from a wrapped structured error, if any.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::Structured(err) => err.retryable(),
            ServiceError::Other(err) => err.chain().any(capstan_errors::is_retryable),
            ServiceError::DeadlineExceeded | ServiceError::Canceled => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_errors_map_onto_service_variants() {
        assert!(matches!(
            ServiceError::from(ContextError::Canceled),
            ServiceError::Canceled
        ));
        assert!(matches!(
            ServiceError::from(ContextError::DeadlineExceeded),
            ServiceError::DeadlineExceeded
        ));
    }

    #[test]
    fn structured_display_is_preserved() {
        let err = ServiceError::from(StructuredError::new(2, "quota", "exhausted", None));
        assert_eq!(err.to_string(), "quota: exhausted");
    }

    #[test]
    fn retry_hint_reads_through_anyhow() {
        let retryable = StructuredError::with_all_info(3, "upstream", "busy", None, true);
        let err = ServiceError::from(anyhow::Error::new(retryable).context("calling upstream"));
        assert!(err.is_retryable());
        assert!(!ServiceError::Canceled.is_retryable());
    }

    #[test]
    fn kind_mismatch_names_both_kinds() {
        let err = RegistryError::KindMismatch {
            contract_id: "capstan:ex_echo".into(),
            expected: CapabilityKind::Trigger,
            found: CapabilityKind::Service,
        };
        assert_eq!(
            err.to_string(),
            "capability capstan:ex_echo is a service, expected a trigger"
        );
    }
}
