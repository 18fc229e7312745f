//! File intake and the per-selection upload session.

pub mod preview;

use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

pub use preview::{PreviewStore, data_url, decode_data_url};

static MEDIA_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(image|video)/[a-z0-9.+-]+").expect("valid media-type regex")
});

/// The two kinds of media the detection service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify a MIME type; anything but `image/*` or `video/*` is `None`.
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let caps = MEDIA_TYPE.captures(media_type.trim())?;
        match caps[1].to_ascii_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Text of the loading overlay while this kind is being analyzed.
    pub fn loading_text(self) -> &'static str {
        match self {
            Self::Image => "Analyzing image...",
            Self::Video => "Processing video, this may take a while...",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Best-effort MIME type from a file extension.
pub fn guess_media_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "bmp" => "image/bmp",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "tif" | "tiff" => "image/tiff",
        "mp4" | "m4v" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "webm" => "video/webm",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Selected file
// ---------------------------------------------------------------------------

/// A file picked by the user. The bytes are shared so a request worker can
/// hold them without copying.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub media_type: String,
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::new(name, guess_media_type(path), bytes))
    }

    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_media_type(&self.media_type)
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Empty,
    FileSelected,
    Analyzing,
    Succeeded,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntakeError {
    #[error("'{name}' is not an image or video (type '{media_type}')")]
    UnsupportedType { name: String, media_type: String },
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzeBlocked {
    #[error("no file selected")]
    NoFile,
    #[error("an analysis is already in progress")]
    InFlight,
}

/// The current selection and where it is in the analyze flow.
#[derive(Debug, Clone)]
pub struct UploadSession {
    file: Option<SelectedFile>,
    state: SessionState,
}

impl Default for UploadSession {
    fn default() -> Self {
        Self {
            file: None,
            state: SessionState::Empty,
        }
    }
}

impl UploadSession {
    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    /// Replace the selection. An unsupported file empties the session.
    pub fn select(&mut self, file: SelectedFile) -> Result<MediaKind, IntakeError> {
        match file.kind() {
            Some(kind) => {
                self.file = Some(file);
                self.state = SessionState::FileSelected;
                Ok(kind)
            }
            None => {
                self.file = None;
                self.state = SessionState::Empty;
                Err(IntakeError::UnsupportedType {
                    name: file.name,
                    media_type: file.media_type,
                })
            }
        }
    }

    /// Enter `Analyzing` and hand out the file to submit.
    pub fn begin_analysis(&mut self) -> Result<SelectedFile, AnalyzeBlocked> {
        match (self.state, &self.file) {
            (SessionState::Analyzing, _) => Err(AnalyzeBlocked::InFlight),
            (_, None) => Err(AnalyzeBlocked::NoFile),
            (_, Some(file)) => {
                let file = file.clone();
                self.state = SessionState::Analyzing;
                Ok(file)
            }
        }
    }

    /// Leave `Analyzing`. Failures return to `FileSelected` so the user can
    /// retry with the same file.
    pub fn finish_analysis(&mut self, succeeded: bool) {
        if self.state == SessionState::Analyzing {
            self.state = if succeeded {
                SessionState::Succeeded
            } else {
                SessionState::FileSelected
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
