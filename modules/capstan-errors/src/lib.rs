//! Structured error taxonomy.
//!
//! Every failure carries a numeric code, a classifying prefix, a message,
//! optional data, a retryable flag, a captured stack and an optional cause.
//! Callers branch on prefix and retryability instead of parsing text.

mod classify;
mod stack;
mod structured;

pub use classify::{find_structured, is_prefix_matches, is_retryable, prefix_matches};
pub use structured::{
    BoxError, ErrorData, ErrorEnvelope, StructuredError, INTERNAL_ERROR_CODE, INTERNAL_PREFIX,
};
