use std::path::PathBuf;
use std::time::Duration;

use capstan_core::ConfigMap;

/// Trigger-level configuration, read once from the capability's values.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: String,
    pub cert_file: Option<PathBuf>,
    pub key_file: Option<PathBuf>,
    pub static_dir: Option<PathBuf>,
    pub static_path: String,
    pub health_path: Option<String>,
    pub request_timeout: Duration,
    pub default_404_handler_enabled: bool,
    pub default_content_type: String,
    pub metrics_enabled: bool,
    pub metric_path: String,
}

impl Settings {
    pub fn from_config(values: &ConfigMap) -> Self {
        Self {
            host: values.string("host", "0.0.0.0"),
            port: values.string("port", "8080"),
            cert_file: non_empty(values, "cert_file").map(PathBuf::from),
            key_file: non_empty(values, "key_file").map(PathBuf::from),
            static_dir: non_empty(values, "static_dir").map(PathBuf::from),
            static_path: values.string("static_path", "/static/"),
            health_path: non_empty(values, "health_path"),
            request_timeout: values.duration("default_request_timeout", Duration::from_secs(1)),
            default_404_handler_enabled: values.bool("default_404_handler_enabled", true),
            default_content_type: values.string("default_content_type", "application/json"),
            metrics_enabled: values.bool("metrics_enabled", false),
            metric_path: values.string("metric_path", "/metrics"),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// TLS is used only when both files are configured.
    pub fn tls_files(&self) -> Option<(&PathBuf, &PathBuf)> {
        self.cert_file.as_ref().zip(self.key_file.as_ref())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_config(&ConfigMap::new())
    }
}

fn non_empty(values: &ConfigMap, key: &str) -> Option<String> {
    values
        .get(key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
