use std::path::Path;

use anyhow::{Context, Result};
use capstan_core::ConfigMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

/// Deployment manifest: which capabilities to build and how to wire them.
///
/// ```toml
/// [[capabilities]]
/// contract_id = "capstan:httpserver"
/// values = { port = 8080, default_request_timeout = "2s" }
///
/// [[triggers]]
/// trigger = "capstan:httpserver"
/// service = "capstan:ex_echo"
/// values = { method = "GET,POST", path = "/echo" }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub capabilities: Vec<CapabilityEntry>,
    #[serde(default)]
    pub triggers: Vec<TriggerEntry>,
    #[serde(default)]
    pub transmitters: Vec<TransmitterEntry>,
}

/// A capability instance to build from its registered prototype.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapabilityEntry {
    pub contract_id: String,
    #[serde(default, deserialize_with = "scalar_values")]
    pub values: ConfigMap,
}

/// Binds a service to a trigger, optionally behind an authorizer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TriggerEntry {
    pub trigger: String,
    pub service: String,
    #[serde(default)]
    pub authorizer: Option<String>,
    #[serde(default)]
    pub authorizer_expression: String,
    /// Trigger-specific route values (`method`, `path` for HTTP).
    #[serde(default, deserialize_with = "scalar_values")]
    pub values: ConfigMap,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransmitterEntry {
    pub trigger: String,
    pub transmitter: String,
}

/// Load and parse a TOML manifest.
pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
    parse_manifest(&content)
        .with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

pub fn parse_manifest(content: &str) -> Result<Manifest> {
    Ok(toml::from_str(content)?)
}

/// Flatten a TOML table of scalars into strings.
fn scalar_values<'de, D>(deserializer: D) -> Result<ConfigMap, D::Error>
where
    D: Deserializer<'de>,
{
    let table = toml::Table::deserialize(deserializer)?;
    table
        .into_iter()
        .map(|(key, value)| {
            let text = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                other => {
                    return Err(D::Error::custom(format!(
                        "value for {key:?} must be a scalar, found {}",
                        other.type_str()
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_is_valid() {
        let manifest = parse_manifest("").unwrap();
        assert!(manifest.capabilities.is_empty());
        assert!(manifest.triggers.is_empty());
        assert!(manifest.transmitters.is_empty());
    }

    #[test]
    fn scalars_become_strings() {
        let manifest = parse_manifest(
            r#"
            [[capabilities]]
            contract_id = "capstan:httpserver"
            values = { port = 9090, metrics_enabled = true, ratio = 0.5, host = "127.0.0.1" }
            "#,
        )
        .unwrap();

        let values = &manifest.capabilities[0].values;
        assert_eq!(values.get("port"), Some("9090"));
        assert_eq!(values.get("metrics_enabled"), Some("true"));
        assert_eq!(values.get("ratio"), Some("0.5"));
        assert_eq!(values.get("host"), Some("127.0.0.1"));
    }

    #[test]
    fn nested_values_are_rejected() {
        let err = parse_manifest(
            r#"
            [[capabilities]]
            contract_id = "capstan:httpserver"
            values = { hosts = ["a", "b"] }
            "#,
        )
        .unwrap_err();
        assert!(format!("{err:#}").contains("must be a scalar"));
    }

    #[test]
    fn trigger_entries_default_optional_fields() {
        let manifest = parse_manifest(
            r#"
            [[triggers]]
            trigger = "capstan:httpserver"
            service = "capstan:ex_echo"
            values = { method = "GET", path = "/echo" }
            "#,
        )
        .unwrap();

        let entry = &manifest.triggers[0];
        assert!(entry.authorizer.is_none());
        assert_eq!(entry.authorizer_expression, "");
        assert_eq!(entry.values.get("path"), Some("/echo"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse_manifest("[[transmitters]]\ntrigger = \"a\"\ntransmiter = \"b\"\n").is_err());
    }
}
