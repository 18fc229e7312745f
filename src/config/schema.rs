//! Configuration schema and defaults for cellscope.
//!
//! Defines the TOML-serializable configuration structure with the
//! `[service]`, `[web]`, and `[logging]` sections. Every field has a
//! built-in default, so users only set the values they want to override.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level cellscope configuration.
///
/// Maps directly to `~/.cellscope/config.toml` and `.cellscope.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CellscopeConfig {
    pub service: ServiceConfig,
    pub web: WebConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// [service]
// ---------------------------------------------------------------------------

/// Where the detection service lives and how to talk to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the detection service, without a trailing slash.
    pub base_url: String,
    /// Path of the precomputed metrics endpoint.
    pub metrics_path: String,
    /// Path of the analysis endpoint.
    pub analyze_path: String,
    /// Multipart field name the service reads the upload from.
    pub upload_field: String,
    /// Per-request deadline in milliseconds.
    pub timeout_ms: u64,
    /// Read metrics from this JSON file instead of the service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_file: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            metrics_path: "/model-metrics".to_string(),
            analyze_path: "/analyze".to_string(),
            upload_field: "image".to_string(),
            timeout_ms: 30_000,
            metrics_file: None,
        }
    }
}

impl ServiceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Full URL of the metrics endpoint.
    pub fn metrics_url(&self) -> String {
        join_url(&self.base_url, &self.metrics_path)
    }

    /// Full URL of the analysis endpoint.
    pub fn analyze_url(&self) -> String {
        join_url(&self.base_url, &self.analyze_path)
    }

    /// Resolve a server-provided URL. Absolute URLs pass through unchanged,
    /// relative ones are joined onto `base_url`.
    pub fn resolve(&self, url: &str) -> String {
        if url.contains("://") || url.starts_with("data:") {
            url.to_string()
        } else {
            join_url(&self.base_url, url)
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

// ---------------------------------------------------------------------------
// [web]
// ---------------------------------------------------------------------------

/// Local dashboard server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebConfig {
    /// Listen address for `cellscope web`.
    pub addr: String,
    /// Open the dashboard in the default browser on start.
    pub open_browser: bool,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9747".to_string(),
            open_browser: true,
        }
    }
}

// ---------------------------------------------------------------------------
// [logging]
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CellscopeConfig {
    /// The annotated default config written by `cellscope config init`.
    pub fn default_toml() -> String {
        r#"# cellscope configuration
# Values here override built-in defaults. CELLSCOPE_* env vars override this file.

[service]
base_url = "http://127.0.0.1:5000"
metrics_path = "/model-metrics"
analyze_path = "/analyze"
upload_field = "image"                # Multipart field the service reads
timeout_ms = 30000
# metrics_file = "metrics.json"       # Read metrics locally instead of over HTTP

[web]
addr = "127.0.0.1:9747"
open_browser = true

[logging]
level = "info"                        # RUST_LOG takes precedence
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
