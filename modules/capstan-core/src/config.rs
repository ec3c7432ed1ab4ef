use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// String-keyed configuration handed to a capability.
///
/// Every typed getter falls back to the supplied default when the key is
/// missing or its value does not parse. Configuration is never a reason to
/// fail a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigMap(HashMap<String, String>);

impl ConfigMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).to_string()
    }

    pub fn string_list(&self, key: &str, sep: &str, default: &[&str]) -> Vec<String> {
        match self.get(key) {
            Some(value) => value.split(sep).map(str::to_string).collect(),
            None => default.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse `k1=v1;k2=v2` into a nested map. Malformed pairs are skipped.
    pub fn string_map(&self, key: &str, default: ConfigMap) -> ConfigMap {
        let Some(value) = self.get(key) else {
            return default;
        };

        value
            .split(';')
            .filter_map(|pair| {
                let parts: Vec<&str> = pair.split('=').collect();
                match parts.as_slice() {
                    [k, v] => Some((k.trim().to_string(), v.trim().to_string())),
                    _ => None,
                }
            })
            .collect()
    }

    pub fn bytes(&self, key: &str, default: &[u8]) -> Vec<u8> {
        self.get(key)
            .map(|v| v.as_bytes().to_vec())
            .unwrap_or_else(|| default.to_vec())
    }

    /// Parse any `FromStr` value (integers, floats, addresses, ...).
    pub fn parse<T: FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    /// Parse a separated list. One bad element discards the whole value.
    pub fn list<T: FromStr>(&self, key: &str, sep: &str, default: Vec<T>) -> Vec<T> {
        let Some(value) = self.get(key) else {
            return default;
        };

        value
            .split(sep)
            .map(str::parse)
            .collect::<Result<Vec<T>, _>>()
            .unwrap_or(default)
    }

    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some("1" | "t" | "T" | "TRUE" | "true" | "True") => true,
            Some("0" | "f" | "F" | "FALSE" | "false" | "False") => false,
            _ => default,
        }
    }

    /// Durations use humantime syntax: `1s`, `250ms`, `1m 30s`. Fractional
    /// values such as `1.5s` are not accepted; write `1s 500ms`.
    pub fn duration(&self, key: &str, default: Duration) -> Duration {
        let Some(value) = self.get(key) else {
            return default;
        };

        match humantime::parse_duration(value.trim()) {
            Ok(duration) => duration,
            Err(e) => {
                warn!(
                    key,
                    value,
                    error = %e,
                    default = ?default,
                    "invalid duration, using default"
                );
                default
            }
        }
    }

    /// Timestamps are RFC 3339.
    pub fn time(&self, key: &str, default: DateTime<Utc>) -> DateTime<Utc> {
        self.get(key)
            .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(default)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ConfigMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl From<HashMap<String, String>> for ConfigMap {
    fn from(values: HashMap<String, String>) -> Self {
        Self(values)
    }
}
