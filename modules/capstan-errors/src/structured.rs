use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::stack;

/// Free-form structured payload attached to an error.
pub type ErrorData = BTreeMap<String, String>;

/// Boxed error accepted as a cause.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Prefix namespace used for internal failures.
pub const INTERNAL_PREFIX: &str = "internal_service";

/// Numeric code carried by internal and promoted failures.
pub const INTERNAL_ERROR_CODE: u32 = 13;

const PROMOTED_MESSAGE: &str = "unclassified failure";

/// A classified, stack-captured, optionally retryable failure.
///
/// `prefix` is the stable classifier callers branch on; `message` is free
/// text. The stack is captured when the value is built and never changes.
#[derive(Debug, Clone)]
pub struct StructuredError {
    code: u32,
    prefix: String,
    message: String,
    data: Option<ErrorData>,
    retryable: bool,
    stack: Arc<[usize]>,
    cause: Option<Arc<dyn Error + Send + Sync + 'static>>,
}

impl StructuredError {
    /// Build a non-retryable error.
    pub fn new(
        code: u32,
        prefix: impl Into<String>,
        message: impl Into<String>,
        data: Option<ErrorData>,
    ) -> Self {
        Self::build(code, prefix.into(), message.into(), data, false, None)
    }

    /// Build an error with explicit retryability.
    pub fn with_all_info(
        code: u32,
        prefix: impl Into<String>,
        message: impl Into<String>,
        data: Option<ErrorData>,
        retryable: bool,
    ) -> Self {
        Self::build(code, prefix.into(), message.into(), data, retryable, None)
    }

    /// Wrap `cause` as an internal failure.
    ///
    /// The prefix becomes `internal_service.<code>`.
    pub fn internal_with_cause(
        cause: impl Into<BoxError>,
        message: impl Into<String>,
        data: Option<ErrorData>,
        code: &str,
    ) -> Self {
        Self::build(
            INTERNAL_ERROR_CODE,
            format!("{INTERNAL_PREFIX}.{code}"),
            message.into(),
            data,
            false,
            Some(Arc::from(cause.into())),
        )
    }

    /// Promote any error into the taxonomy.
    ///
    /// A value that already is a `StructuredError` is returned untouched,
    /// keeping its original stack. Anything else is wrapped as the cause of
    /// a fresh internal error.
    pub fn from_error(err: impl Into<BoxError>) -> Self {
        match err.into().downcast::<StructuredError>() {
            Ok(structured) => *structured,
            Err(other) => Self::build(
                INTERNAL_ERROR_CODE,
                INTERNAL_PREFIX.to_string(),
                PROMOTED_MESSAGE.to_string(),
                None,
                false,
                Some(Arc::from(other)),
            ),
        }
    }

    #[inline(never)]
    fn build(
        code: u32,
        prefix: String,
        message: String,
        data: Option<ErrorData>,
        retryable: bool,
        cause: Option<Arc<dyn Error + Send + Sync + 'static>>,
    ) -> Self {
        // Codes are non-zero; 0 means "unset" and becomes the internal code.
        let code = match code {
            0 => INTERNAL_ERROR_CODE,
            code => code,
        };
        Self {
            code,
            prefix,
            message,
            data,
            retryable,
            stack: stack::capture().into(),
            cause,
        }
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn data(&self) -> Option<&ErrorData> {
        self.data.as_ref()
    }

    pub fn retryable(&self) -> bool {
        self.retryable
    }

    /// The wrapped cause, exactly as it was supplied.
    pub fn cause(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Instruction addresses captured at construction, innermost first.
    pub fn stack_trace(&self) -> &[usize] {
        &self.stack
    }

    /// Symbolized stack, one `function\n\tfile:line` pair per frame.
    pub fn stack_string(&self) -> String {
        stack::render(&self.stack)
    }

    /// Full diagnostic dump: display line, classification, data, stack and
    /// the cause chain.
    pub fn verbose_string(&self) -> String {
        let mut out = format!(
            "{}: {}\ncode: {}\nretryable: {}\n",
            self.prefix, self.message, self.code, self.retryable
        );

        if let Some(data) = self.data.as_ref().filter(|d| !d.is_empty()) {
            let pairs: Vec<String> = data.iter().map(|(k, v)| format!("{k}={v}")).collect();
            out.push_str(&format!("data: {}\n", pairs.join(", ")));
        }

        out.push_str(&self.stack_string());

        if let Some(cause) = self.cause() {
            let cause: &(dyn Error + 'static) = cause;
            match cause.downcast_ref::<StructuredError>() {
                Some(inner) => out.push_str(&format!("caused by: {}", inner.verbose_string())),
                None => out.push_str(&format!("caused by: {cause}\n")),
            }
        }

        out
    }

    pub fn prefix_matches(&self, prefix: &str) -> bool {
        self.prefix == prefix
    }

    /// Serializable form for crossing process or transport boundaries.
    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            code: self.code,
            prefix: self.prefix.clone(),
            message: self.message.clone(),
            data: self.data.clone().unwrap_or_default(),
            retryable: self.retryable,
            cause: self.cause.as_ref().map(|c| c.to_string()),
        }
    }
}

impl fmt::Display for StructuredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}: {}: {}", self.prefix, self.message, cause),
            None => write!(f, "{}: {}", self.prefix, self.message),
        }
    }
}

impl Error for StructuredError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|c| c as &(dyn Error + 'static))
    }
}

/// Wire form of a [`StructuredError`].
///
/// The stack does not travel; a receiver rebuilding the error captures its
/// own. A remote cause arrives as text only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: u32,
    pub prefix: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: ErrorData,
    #[serde(default)]
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
}

/// Opaque cause reconstructed from an envelope's cause text.
#[derive(Debug)]
struct RemoteCause(String);

impl fmt::Display for RemoteCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for RemoteCause {}

impl From<ErrorEnvelope> for StructuredError {
    fn from(envelope: ErrorEnvelope) -> Self {
        let data = (!envelope.data.is_empty()).then_some(envelope.data);
        let cause = envelope
            .cause
            .map(|c| Arc::new(RemoteCause(c)) as Arc<dyn Error + Send + Sync + 'static>);
        Self::build(
            envelope.code,
            envelope.prefix,
            envelope.message,
            data,
            envelope.retryable,
            cause,
        )
    }
}
