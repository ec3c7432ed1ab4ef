//! Capstan server: manifest loading, wiring and built-in capabilities.

pub mod capabilities;
pub mod manifest;
pub mod wiring;

pub use manifest::{load_manifest, parse_manifest, Manifest};
pub use wiring::{build_platform, register_builtin, Platform};
