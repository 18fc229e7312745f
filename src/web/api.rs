//! JSON API handlers for the web dashboard.
//!
//! Page-mutating handlers answer with the full page view model, draining
//! pending notices into it so each is shown exactly once.

use std::io::Cursor;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tiny_http::{Header, Response, StatusCode};

use crate::config::CellscopeConfig;
use crate::controller::{DragEvent, UploadController};
use crate::health;
use crate::page::Page;
use crate::upload::{SelectedFile, preview::OBJECT_URL_PREFIX};

use super::{ApiRequest, MAX_UPLOAD_BYTES, content_type_json, not_found};

pub(super) const PREVIEW_PREFIX: &str = OBJECT_URL_PREFIX;

/// `POST /api/drag` body.
#[derive(Deserialize)]
struct DragRequest {
    event: DragEvent,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a JSON success response.
fn json_response<T: Serialize>(data: &T) -> Result<Response<Cursor<Vec<u8>>>> {
    let body = serde_json::to_string(data).context("failed to serialize JSON response")?;
    Ok(Response::from_data(body.into_bytes())
        .with_header(content_type_json())
        .with_status_code(StatusCode(200)))
}

/// Undo `encodeURIComponent` on an `X-File-Name` header. A name that does
/// not decode to UTF-8 is kept as sent.
fn decode_file_name(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|name| name.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// ---------------------------------------------------------------------------
// API Handlers
// ---------------------------------------------------------------------------

/// `GET /api/page`: the current view model.
pub fn get_page(page: &mut Page) -> Result<Response<Cursor<Vec<u8>>>> {
    let resp = json_response(&*page);
    page.take_notices();
    resp
}

/// `POST /api/select`: a picked file as the raw body.
///
/// The media type comes from `Content-Type`, the name from `X-File-Name`.
/// An empty body is an empty selection. A body over the upload limit is
/// answered with 413 and a notice, and the current selection is kept.
pub fn post_select(
    controller: &mut UploadController,
    page: &mut Page,
    req: &ApiRequest,
) -> Result<Response<Cursor<Vec<u8>>>> {
    if req.oversized {
        tracing::warn!(limit = MAX_UPLOAD_BYTES, "upload over the size limit refused");
        page.alert(format!(
            "The file is too large. The limit is {} MiB.",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        ));
        return Ok(get_page(page)?.with_status_code(StatusCode(413)));
    }

    let files = if req.body.is_empty() {
        Vec::new()
    } else {
        let name = req
            .file_name
            .as_deref()
            .map(decode_file_name)
            .unwrap_or_else(|| "upload".to_string());
        let media_type = req
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());
        vec![SelectedFile::new(name, media_type, req.body.clone())]
    };
    controller.select_files(files, page);
    get_page(page)
}

/// `POST /api/drag`: `{"event": "enter" | "over" | "leave" | "drop"}`.
pub fn post_drag(
    controller: &mut UploadController,
    page: &mut Page,
    body: &[u8],
) -> Result<Response<Cursor<Vec<u8>>>> {
    let req: DragRequest = serde_json::from_slice(body).context("invalid JSON in drag request")?;
    controller.on_drag(req.event, page);
    get_page(page)
}

/// `POST /api/analyze`: submit the selection. Failures arrive as notices.
pub fn post_analyze(
    controller: &mut UploadController,
    page: &mut Page,
) -> Result<Response<Cursor<Vec<u8>>>> {
    match controller.analyze(page) {
        Ok(outcome) => tracing::debug!(?outcome, "analyze request finished"),
        Err(e) => tracing::warn!(error = %e, "analyze request produced no result"),
    }
    get_page(page)
}

/// `GET /preview/<id>`: bytes behind a live object URL.
pub fn get_preview(controller: &UploadController, id: &str) -> Response<Cursor<Vec<u8>>> {
    let Some(blob) = controller.previews().get(id) else {
        return not_found();
    };
    let mut resp = Response::from_data(blob.bytes.to_vec()).with_status_code(StatusCode(200));
    if let Ok(header) = Header::from_bytes("Content-Type", blob.media_type.as_bytes()) {
        resp = resp.with_header(header);
    }
    resp
}

/// `GET /api/health`: service reachability and config summary.
pub fn get_health(config: &CellscopeConfig) -> Result<Response<Cursor<Vec<u8>>>> {
    json_response(&health::report(config))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
