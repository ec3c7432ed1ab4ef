//! Localized error bodies.

use axum::body::Body;
use axum::http::header::{ACCEPT_LANGUAGE, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::Response;
use capstan_core::ConfigMap;
use tracing::warn;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Statuses that ship with a built-in body.
pub const TEMPLATED_STATUSES: [u16; 8] = [401, 403, 404, 405, 408, 409, 499, 500];

/// Built-in body for `status`.
pub fn default_message(status: u16) -> String {
    format!(r#"{{"code":"SE_{status}","lang":"en","message":"{status} ERROR","data":{{}}}}"#)
}

/// Primary language tag of the request: the first `Accept-Language` range,
/// without its quality weight.
pub fn language(headers: &HeaderMap) -> String {
    headers
        .get(ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split([',', ';']).next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_LANGUAGE)
        .to_string()
}

/// Error body catalog with per-status, per-language overrides.
///
/// Lookup order: `s<status>m_<lang>`, `s<status>m`, built-in default.
#[derive(Debug, Clone)]
pub struct Messages {
    values: ConfigMap,
    content_type: String,
}

impl Messages {
    pub fn new(values: ConfigMap, content_type: impl Into<String>) -> Self {
        Self {
            values,
            content_type: content_type.into(),
        }
    }

    pub fn body(&self, status: u16, lang: &str) -> String {
        let key = format!("s{status}m");
        if let Some(localized) = self
            .values
            .get(&format!("{key}_{lang}"))
            .filter(|v| !v.is_empty())
        {
            return localized.to_string();
        }
        match self.values.get(&key) {
            Some(configured) => configured.to_string(),
            None => default_message(status),
        }
    }

    pub fn response(&self, status: StatusCode, lang: &str) -> Response {
        let mut response = Response::new(Body::from(self.body(status.as_u16(), lang)));
        *response.status_mut() = status;
        match HeaderValue::from_str(&self.content_type) {
            Ok(value) => {
                response.headers_mut().insert(CONTENT_TYPE, value);
            }
            Err(e) => warn!(error = %e, content_type = %self.content_type, "invalid default content type"),
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(accept_language: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_str(accept_language).unwrap());
        headers
    }

    #[test]
    fn default_message_is_compact_json() {
        assert_eq!(
            default_message(404),
            r#"{"code":"SE_404","lang":"en","message":"404 ERROR","data":{}}"#
        );
    }

    #[test]
    fn every_templated_status_has_a_parseable_default() {
        for status in TEMPLATED_STATUSES {
            let body: serde_json::Value = serde_json::from_str(&default_message(status)).unwrap();
            assert_eq!(body["code"], format!("SE_{status}"));
        }
    }

    #[test]
    fn language_takes_first_range() {
        assert_eq!(language(&headers("bn-BD,bn;q=0.9,en;q=0.8")), "bn-BD");
        assert_eq!(language(&headers("fr;q=0.7")), "fr");
        assert_eq!(language(&headers("  ")), "en");
        assert_eq!(language(&HeaderMap::new()), "en");
    }

    #[test]
    fn lookup_prefers_localized_then_generic() {
        let values: ConfigMap = [("s404m_bn", "bn body"), ("s404m", "generic body")]
            .into_iter()
            .collect();
        let messages = Messages::new(values, "application/json");

        assert_eq!(messages.body(404, "bn"), "bn body");
        assert_eq!(messages.body(404, "de"), "generic body");
        assert_eq!(messages.body(500, "bn"), default_message(500));
    }

    #[test]
    fn response_carries_status_and_content_type() {
        let messages = Messages::new(ConfigMap::new(), "application/problem+json");
        let response = messages.response(StatusCode::FORBIDDEN, "en");
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }
}
