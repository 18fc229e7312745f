//! Reachability checks for the detection service.

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::config::schema::ServiceConfig;
use crate::config::{self, CellscopeConfig};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Serialize)]
pub struct ServiceHealth {
    pub url: String,
    /// The service answered, whatever the status code.
    pub reachable: bool,
    pub status: Option<u16>,
    pub detail: Option<String>,
    pub latency_ms: u64,
}

/// Everything `cellscope health` and `GET /api/health` report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub version: &'static str,
    pub metrics_source: String,
    pub analyze_url: String,
    pub global_config_exists: bool,
    pub project_config_exists: bool,
    pub service: ServiceHealth,
}

/// Issue one short `GET` against the metrics endpoint.
pub fn probe(service: &ServiceConfig) -> ServiceHealth {
    let url = service.metrics_url();
    let timeout = service.timeout().min(PROBE_TIMEOUT);
    let started = Instant::now();
    let result = ureq::get(&url).timeout(timeout).call();
    let latency_ms = started.elapsed().as_millis() as u64;

    let (reachable, status, detail) = match result {
        Ok(resp) => (true, Some(resp.status()), None),
        Err(ureq::Error::Status(code, _)) => (true, Some(code), None),
        Err(ureq::Error::Transport(t)) => (false, None, Some(t.to_string())),
    };
    tracing::debug!(%url, reachable, latency_ms, "service probe");

    ServiceHealth {
        url,
        reachable,
        status,
        detail,
        latency_ms,
    }
}

pub fn report(config: &CellscopeConfig) -> HealthReport {
    let service = &config.service;
    HealthReport {
        version: env!("CARGO_PKG_VERSION"),
        metrics_source: crate::metrics::loader::source_from_config(service).describe(),
        analyze_url: service.analyze_url(),
        global_config_exists: config::global_config_file().is_some_and(|p| p.exists()),
        project_config_exists: config::project_config_file().is_some_and(|p| p.exists()),
        service: probe(service),
    }
}
