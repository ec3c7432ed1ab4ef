use std::collections::HashMap;

use bytes::Bytes;

/// Request-side and result-side descriptors travelling with an [`Event`].
///
/// Header keys are stored lowercased. For both headers and query parameters
/// the first value seen for a key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Contract ids of every hop the request traversed, in order.
    pub contract_id_list: Vec<String>,
    /// Result status. Zero means "not set".
    pub status_code: u32,
    pub status: String,
}

impl Metadata {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Insert a header unless one with the same (case-insensitive) name exists.
    pub fn insert_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_insert_with(|| value.into());
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn insert_query(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.query.entry(key.into()).or_insert_with(|| value.into());
    }

    pub fn push_contract_id(&mut self, contract_id: impl Into<String>) {
        self.contract_id_list.push(contract_id.into());
    }

    pub fn with_status(mut self, code: u32, status: impl Into<String>) -> Self {
        self.status_code = code;
        self.status = status.into();
        self
    }
}

/// Unit of work flowing through a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Event {
    pub metadata: Metadata,
    /// Content-type-like discriminator for `value`.
    pub type_url: String,
    pub value: Bytes,
}

impl Event {
    pub fn new(metadata: Metadata, type_url: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            metadata,
            type_url: type_url.into(),
            value: value.into(),
        }
    }
}
