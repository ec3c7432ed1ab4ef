//! HTTP trigger for capstan.
//!
//! Each route binds one service to a literal path. A request runs through
//! method check, event construction, authorization, a bounded service call
//! raced against client cancellation, and response materialization. Panics
//! are contained per request and counted per service.

mod dispatch;
mod error;
mod messages;
mod server;
mod settings;

pub use dispatch::{
    RouteHandler, CLIENT_CLOSED_REQUEST, PANIC_COUNTER_METRIC, RESPONSE_STATUS_METRIC,
    UNMATCHED_PATH_LABEL,
};
pub use error::HttpServerError;
pub use messages::{default_message, language, Messages, DEFAULT_LANGUAGE, TEMPLATED_STATUSES};
pub use server::{HttpTrigger, CONTRACT_ID, NAME};
pub use settings::Settings;
