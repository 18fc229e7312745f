//! Embedded web dashboard for cellscope.
//!
//! Provides a lightweight HTTP server (sync, via `tiny_http`) that serves:
//! - The single-page dashboard (model performance charts, upload & analyze)
//! - JSON API endpoints that drive the page view model
//! - Object-URL previews of selected videos
//!
//! Launched via `cellscope web` (default: `http://127.0.0.1:9747`).

mod api;
mod frontend;

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::analyze::HttpAnalyzeClient;
use crate::cancel::CancelToken;
use crate::config::CellscopeConfig;
use crate::controller::UploadController;
use crate::metrics::{MetricsSource, load_into, loader::source_from_config};
use crate::page::Page;

/// Uploads larger than this are refused before they reach the controller.
const MAX_UPLOAD_BYTES: u64 = 512 * 1024 * 1024;

type HttpResponse = Response<Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Dashboard state
// ---------------------------------------------------------------------------

/// One browser session's worth of state, owned by the request loop.
pub struct Dashboard {
    config: CellscopeConfig,
    page: Page,
    controller: UploadController,
    metrics: Box<dyn MetricsSource>,
}

impl Dashboard {
    pub fn new(
        config: CellscopeConfig,
        controller: UploadController,
        metrics: Box<dyn MetricsSource>,
    ) -> Self {
        Self {
            config,
            page: Page::default(),
            controller,
            metrics,
        }
    }

    pub fn from_config(config: CellscopeConfig) -> Self {
        let client = HttpAnalyzeClient::new(config.service.clone());
        let controller = UploadController::new(Box::new(client));
        let metrics = source_from_config(&config.service);
        Self::new(config, controller, metrics)
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Run the metrics loader against the page. The frontend calls this once
    /// per page load. Failures leave the performance section hidden.
    pub fn reload_metrics(&mut self) {
        let _ = load_into(self.metrics.as_ref(), &mut self.page, &CancelToken::new());
    }

    /// Route one request.
    pub fn dispatch(&mut self, req: &ApiRequest) -> Result<HttpResponse> {
        // Strip query string for path matching
        let path = req.url.split('?').next().unwrap_or(&req.url);

        match (&req.method, path) {
            // Frontend
            (&Method::Get, "/") | (&Method::Get, "/index.html") => Ok(serve_frontend()),

            // API: Page
            (&Method::Get, "/api/page") => api::get_page(&mut self.page),
            (&Method::Post, "/api/metrics/reload") => {
                self.reload_metrics();
                api::get_page(&mut self.page)
            }

            // API: Upload & analyze
            (&Method::Post, "/api/select") => {
                api::post_select(&mut self.controller, &mut self.page, req)
            }
            (&Method::Post, "/api/drag") => {
                api::post_drag(&mut self.controller, &mut self.page, &req.body)
            }
            (&Method::Post, "/api/analyze") => {
                api::post_analyze(&mut self.controller, &mut self.page)
            }

            // API: Health
            (&Method::Get, "/api/health") => api::get_health(&self.config),

            (&Method::Get, p) if p.starts_with(api::PREVIEW_PREFIX) => {
                Ok(api::get_preview(&self.controller, &p[api::PREVIEW_PREFIX.len()..]))
            }

            // 404
            _ => Ok(not_found()),
        }
    }
}

/// The parts of an incoming request the handlers look at.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub content_type: Option<String>,
    pub file_name: Option<String>,
    pub body: Vec<u8>,
    /// The body exceeded [`MAX_UPLOAD_BYTES`] and was discarded.
    pub oversized: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            content_type: None,
            file_name: None,
            body: Vec::new(),
            oversized: false,
        }
    }

    fn read(request: &mut Request) -> Result<Self> {
        let header_value = |name: &str| {
            request
                .headers()
                .iter()
                .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str().to_string())
        };
        let content_type = header_value("Content-Type");
        let file_name = header_value("X-File-Name");

        let mut body = Vec::new();
        if matches!(request.method(), Method::Put | Method::Post | Method::Patch) {
            // One byte past the limit tells an oversized body from one that fits exactly.
            request
                .as_reader()
                .take(MAX_UPLOAD_BYTES + 1)
                .read_to_end(&mut body)
                .context("failed to read request body")?;
        }
        let oversized = body.len() as u64 > MAX_UPLOAD_BYTES;
        if oversized {
            body = Vec::new();
        }

        Ok(Self {
            method: request.method().clone(),
            url: request.url().to_string(),
            content_type,
            file_name,
            body,
            oversized,
        })
    }
}

// ---------------------------------------------------------------------------
// Server entry point
// ---------------------------------------------------------------------------

/// Start the web dashboard server on the given address.
///
/// Blocks the current thread. Handles requests sequentially (sufficient for
/// a local single-user dashboard). Gracefully handles errors per-request
/// without crashing the server.
pub fn serve(config: CellscopeConfig, addr: &str) -> Result<()> {
    let server = Server::http(addr)
        .map_err(|e| anyhow::anyhow!("failed to start HTTP server on {addr}: {e}"))?;

    let open = config.web.open_browser;
    let mut dashboard = Dashboard::from_config(config);

    println!("cellscope dashboard running at http://{addr}");
    println!("Press Ctrl+C to stop.\n");

    if open {
        // Best-effort
        let _ = open_browser(&format!("http://{addr}"));
    }

    for mut request in server.incoming_requests() {
        let result = ApiRequest::read(&mut request).and_then(|req| dashboard.dispatch(&req));
        let method = request.method().clone();
        let url = request.url().to_string();

        let status = match result {
            Ok(resp) => {
                let status = resp.status_code().0;
                let _ = request.respond(resp);
                status
            }
            Err(e) => {
                tracing::warn!(%method, %url, error = %e, "request failed");
                let _ = request.respond(error_response(&e));
                500
            }
        };

        // Brief access log
        tracing::info!(
            "{} {} {} {}",
            method,
            url,
            status,
            chrono::Local::now().format("%H:%M:%S")
        );
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Response helpers
// ---------------------------------------------------------------------------

/// Serve the embedded single-page frontend.
fn serve_frontend() -> HttpResponse {
    let html = frontend::INDEX_HTML;
    Response::from_data(html.as_bytes().to_vec())
        .with_header(content_type_html())
        .with_status_code(StatusCode(200))
}

/// 404 response.
fn not_found() -> HttpResponse {
    let body = r#"{"error": "not found"}"#;
    Response::from_data(body.as_bytes().to_vec())
        .with_header(content_type_json())
        .with_status_code(StatusCode(404))
}

fn error_response(e: &anyhow::Error) -> HttpResponse {
    let body = serde_json::json!({ "error": format!("{e:#}") }).to_string();
    Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(500))
}

/// JSON content type header.
pub(crate) fn content_type_json() -> Header {
    Header::from_bytes("Content-Type", "application/json; charset=utf-8").expect("static header")
}

/// HTML content type header.
fn content_type_html() -> Header {
    Header::from_bytes("Content-Type", "text/html; charset=utf-8").expect("static header")
}

/// Attempt to open a URL in the system default browser.
fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "windows")]
    {
        std::process::Command::new("cmd")
            .args(["/C", "start", url])
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    #[cfg(target_os = "linux")]
    {
        std::process::Command::new("xdg-open")
            .arg(url)
            .spawn()
            .context("failed to open browser")?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
