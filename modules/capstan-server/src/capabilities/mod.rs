//! Capabilities shipped with the server binary.

pub mod echo;
pub mod header_authorizer;
pub mod log_transmitter;
pub mod panic;

pub use echo::Echo;
pub use header_authorizer::HeaderAuthorizer;
pub use log_transmitter::LogTransmitter;
pub use panic::ExPanic;
