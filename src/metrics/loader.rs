//! Metrics sources and the page-load projection of a metrics snapshot.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cancel::{CancelToken, Interrupted, run_cancellable};
use crate::charts::ChartSet;
use crate::config::schema::ServiceConfig;
use crate::page::Page;

use super::{MetricsError, ModelMetrics, decode};

/// Something that can produce the raw metrics JSON.
pub trait MetricsSource {
    /// Human-readable origin, used in logs and the CLI header.
    fn describe(&self) -> String;
    /// Issue one read and return the response body.
    fn fetch(&self, cancel: &CancelToken) -> Result<String, MetricsError>;
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// `GET` against the detection service's metrics endpoint.
#[derive(Debug, Clone)]
pub struct HttpMetricsSource {
    url: String,
    agent: ureq::Agent,
    timeout: Duration,
}

impl HttpMetricsSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            url: url.into(),
            agent,
            timeout,
        }
    }

    pub fn from_config(service: &ServiceConfig) -> Self {
        Self::new(service.metrics_url(), service.timeout())
    }
}

impl MetricsSource for HttpMetricsSource {
    fn describe(&self) -> String {
        self.url.clone()
    }

    fn fetch(&self, cancel: &CancelToken) -> Result<String, MetricsError> {
        let agent = self.agent.clone();
        let url = self.url.clone();
        tracing::debug!(url = %url, "fetching metrics");

        let outcome = run_cancellable(cancel, self.timeout, move || {
            agent
                .get(&url)
                .set("Accept", "application/json")
                .call()
                .map_err(map_ureq_error)
                .and_then(|resp| {
                    resp.into_string()
                        .map_err(|e| MetricsError::Transport(format!("failed to read body: {e}")))
                })
        });

        match outcome {
            Ok(result) => result,
            Err(Interrupted::TimedOut(after)) => Err(MetricsError::TimedOut(after)),
            Err(Interrupted::Cancelled) => Err(MetricsError::Cancelled),
            Err(Interrupted::Failed) => {
                Err(MetricsError::Transport("request worker failed".to_string()))
            }
        }
    }
}

fn map_ureq_error(err: ureq::Error) -> MetricsError {
    match err {
        ureq::Error::Status(code, resp) => {
            let message = resp
                .into_json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string));
            match message {
                Some(m) => MetricsError::Service(m),
                None => MetricsError::Transport(format!("HTTP {code}")),
            }
        }
        ureq::Error::Transport(t) => MetricsError::Transport(t.to_string()),
    }
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Metrics exported to a local JSON file.
#[derive(Debug, Clone)]
pub struct FileMetricsSource {
    path: PathBuf,
}

impl FileMetricsSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MetricsSource for FileMetricsSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self, cancel: &CancelToken) -> Result<String, MetricsError> {
        if cancel.is_cancelled() {
            return Err(MetricsError::Cancelled);
        }
        fs::read_to_string(&self.path).map_err(|source| MetricsError::Io {
            path: self.describe(),
            source,
        })
    }
}

/// Pick the configured source: a local file when `metrics_file` is set,
/// otherwise the service endpoint.
pub fn source_from_config(service: &ServiceConfig) -> Box<dyn MetricsSource> {
    match &service.metrics_file {
        Some(path) => Box::new(FileMetricsSource::new(path)),
        None => Box::new(HttpMetricsSource::from_config(service)),
    }
}

// ---------------------------------------------------------------------------
// Page load
// ---------------------------------------------------------------------------

/// Fetch, decode, and project metrics onto `page`.
///
/// On success the summary fields and charts are filled in and the
/// performance section is revealed. On failure the error is logged, the
/// section is left hidden, and the error is returned.
pub fn load_into(
    source: &dyn MetricsSource,
    page: &mut Page,
    cancel: &CancelToken,
) -> Result<ModelMetrics, MetricsError> {
    let result = source.fetch(cancel).and_then(|body| decode(&body));

    match result {
        Ok(metrics) => {
            let charts = ChartSet::from_metrics(&metrics);
            page.performance.show(&metrics, charts);
            tracing::info!(
                source = %source.describe(),
                classes = metrics.classes.len(),
                epochs = metrics.learning_curve.len(),
                "metrics loaded"
            );
            Ok(metrics)
        }
        Err(e) => {
            tracing::error!(source = %source.describe(), error = %e, "failed to load metrics");
            page.performance.hide();
            Err(e)
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
