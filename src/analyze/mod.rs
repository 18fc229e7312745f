//! Submission of a selected file to the detection service and decoding of
//! its answer.

pub mod client;
pub mod multipart;

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::upload::SelectedFile;

pub use client::HttpAnalyzeClient;
pub use multipart::MultipartForm;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnalyzeError {
    #[error("analysis request failed: {0}")]
    Transport(String),
    #[error("analysis timed out after {0:?}")]
    TimedOut(Duration),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("service rejected the file: {}", .0.as_deref().unwrap_or("no reason given"))]
    Rejected(Option<String>),
    #[error("malformed analysis response: {0}")]
    Malformed(String),
}

impl AnalyzeError {
    /// Message supplied by the service itself, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::Rejected(message) => message.as_deref(),
            _ => None,
        }
    }
}

/// Anything that can turn a file into an analysis outcome.
pub trait AnalyzeBackend {
    fn describe(&self) -> String;
    fn analyze(
        &self,
        file: &SelectedFile,
        cancel: &CancelToken,
    ) -> Result<AnalyzeOutcome, AnalyzeError>;
}

// ---------------------------------------------------------------------------
// Domain
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(deserialize_with = "id_text")]
    pub id: String,
    #[serde(rename = "class")]
    pub class_name: String,
    /// Percentage, 0-100.
    pub confidence: f64,
    /// `[x1, y1, x2, y2]`. Any other arity fails to decode.
    pub bbox: [f64; 4],
}

impl Detection {
    pub fn confidence_text(&self) -> String {
        format!("{:.2}%", self.confidence)
    }

    pub fn bbox_text(&self) -> String {
        let coords: Vec<String> = self.bbox.iter().map(f64::to_string).collect();
        format!("[{}]", coords.join(", "))
    }
}

/// Ids arrive as integers from the reference service but strings elsewhere.
fn id_text<'de, D: Deserializer<'de>>(de: D) -> Result<String, D::Error> {
    match serde_json::Value::deserialize(de)? {
        serde_json::Value::String(s) => Ok(s),
        other => Ok(other.to_string()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "media_type", rename_all = "lowercase")]
pub enum AnalyzeOutcome {
    Image {
        /// Annotated image, a `data:` URL or a resolved server URL.
        annotated: String,
        detections: Vec<Detection>,
        total: u64,
    },
    Video {
        url: String,
        frames_processed: u64,
    },
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

/// JSON body returned by `POST /analyze`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalyzeResponse {
    pub success: bool,
    pub error: Option<String>,
    pub media_type: Option<String>,
    pub image_base64: Option<String>,
    pub image_url: Option<String>,
    pub detections: Vec<Detection>,
    pub total_detections: Option<u64>,
    pub video_url: Option<String>,
    pub frames_processed: Option<u64>,
}

impl AnalyzeResponse {
    /// Validate the response. `resolve` turns server-relative URLs into
    /// absolute ones.
    pub fn into_outcome(
        self,
        resolve: impl Fn(&str) -> String,
    ) -> Result<AnalyzeOutcome, AnalyzeError> {
        if !self.success || self.error.is_some() {
            return Err(AnalyzeError::Rejected(self.error));
        }

        match self.media_type.as_deref().unwrap_or("image") {
            "image" => {
                let annotated = match (self.image_base64, self.image_url) {
                    (Some(data), _) => data,
                    (None, Some(url)) => resolve(&url),
                    (None, None) => {
                        return Err(AnalyzeError::Malformed(
                            "no annotated image in response".into(),
                        ));
                    }
                };
                let total = self
                    .total_detections
                    .unwrap_or(self.detections.len() as u64);
                Ok(AnalyzeOutcome::Image {
                    annotated,
                    detections: self.detections,
                    total,
                })
            }
            "video" => {
                let url = self
                    .video_url
                    .ok_or_else(|| AnalyzeError::Malformed("no video_url in response".into()))?;
                Ok(AnalyzeOutcome::Video {
                    url: resolve(&url),
                    frames_processed: self.frames_processed.unwrap_or(0),
                })
            }
            other => Err(AnalyzeError::Malformed(format!("unknown media_type '{other}'"))),
        }
    }
}

/// Decode a response body given its HTTP status.
pub fn decode_response(
    status: u16,
    body: &str,
    resolve: impl Fn(&str) -> String,
) -> Result<AnalyzeOutcome, AnalyzeError> {
    if !(200..300).contains(&status) {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string));
        return match message {
            Some(m) => Err(AnalyzeError::Rejected(Some(m))),
            None => Err(AnalyzeError::Transport(format!("HTTP {status}"))),
        };
    }
    let response: AnalyzeResponse =
        serde_json::from_str(body).map_err(|e| AnalyzeError::Malformed(e.to_string()))?;
    response.into_outcome(resolve)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
