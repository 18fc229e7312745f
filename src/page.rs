//! The dashboard view model.
//!
//! `Page` is the single place both components write to: the metrics loader
//! fills the performance panel, the upload controller owns everything else.
//! It serializes as-is for the web frontend and is rendered to the terminal
//! by the CLI.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::charts::ChartSet;
use crate::metrics::{MetricField, ModelMetrics, format_percent};
use crate::upload::MediaKind;

#[derive(Debug, Clone, Default, Serialize)]
pub struct Page {
    pub performance: PerformancePanel,
    pub upload: UploadPanel,
    pub results: ResultsPanel,
    pub loading: LoadingOverlay,
    pub notices: Vec<Notice>,
}

impl Page {
    /// A page whose performance panel only has the given summary targets.
    pub fn with_summary_targets(fields: &[MetricField]) -> Self {
        Self {
            performance: PerformancePanel::with_targets(fields),
            ..Self::default()
        }
    }

    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(%message, "alert");
        self.notices.push(Notice {
            level: NoticeLevel::Error,
            message,
        });
    }

    pub fn inform(&mut self, message: impl Into<String>) {
        self.notices.push(Notice {
            level: NoticeLevel::Info,
            message: message.into(),
        });
    }

    /// Drain pending notices (each is shown once).
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

// ---------------------------------------------------------------------------
// Performance panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct PerformancePanel {
    pub visible: bool,
    /// Summary display targets present in this layout and their text.
    fields: BTreeMap<MetricField, Option<String>>,
    pub model_key: Option<String>,
    pub charts: Option<ChartSet>,
}

impl Default for PerformancePanel {
    fn default() -> Self {
        Self::with_targets(&MetricField::ALL)
    }
}

impl PerformancePanel {
    pub fn with_targets(fields: &[MetricField]) -> Self {
        Self {
            visible: false,
            fields: fields.iter().map(|&f| (f, None)).collect(),
            model_key: None,
            charts: None,
        }
    }

    /// Rendered text of a summary target, `None` when the target is absent
    /// or has no value.
    pub fn field(&self, field: MetricField) -> Option<&str> {
        self.fields.get(&field)?.as_deref()
    }

    pub fn has_target(&self, field: MetricField) -> bool {
        self.fields.contains_key(&field)
    }

    /// Populate every present target and reveal the panel.
    pub fn show(&mut self, metrics: &ModelMetrics, charts: ChartSet) {
        for (field, text) in self.fields.iter_mut() {
            *text = metrics.summary.value(*field).map(format_percent);
        }
        self.model_key = metrics.model_key.clone();
        self.charts = Some(charts);
        self.visible = true;
    }

    pub fn hide(&mut self) {
        self.visible = false;
        self.charts = None;
    }
}

// ---------------------------------------------------------------------------
// Upload panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct UploadPanel {
    /// Drop zone highlight while a drag hovers over it.
    pub drop_active: bool,
    pub analyze_enabled: bool,
    pub file_name: Option<String>,
    pub preview: Option<Preview>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Preview {
    pub kind: MediaKind,
    /// `data:` URL for images, object URL for videos.
    pub src: String,
}

// ---------------------------------------------------------------------------
// Results panel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResultsPanel {
    pub visible: bool,
    pub media: Option<ResultMedia>,
    pub rows: Vec<DetectionRow>,
    /// Detection count for images, frames processed for videos.
    pub count: String,
    pub count_label: String,
}

impl ResultsPanel {
    pub fn hide(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResultMedia {
    Image { src: String },
    Video { src: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "row", rename_all = "lowercase")]
pub enum DetectionRow {
    Detection {
        id: String,
        class: String,
        confidence: String,
        bbox: String,
    },
    Info {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Loading overlay
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadingOverlay {
    pub visible: bool,
    pub text: String,
    #[serde(skip)]
    signal: LoadingSignal,
}

impl LoadingOverlay {
    /// Show the overlay until the returned guard is dropped.
    pub fn show(&mut self, text: impl Into<String>) -> LoadingGuard<'_> {
        self.visible = true;
        self.text = text.into();
        self.signal.0.store(true, Ordering::SeqCst);
        LoadingGuard { overlay: self }
    }

    /// Handle that tracks visibility from outside the page, for example
    /// while the guard holds the overlay borrowed.
    pub fn signal(&self) -> LoadingSignal {
        self.signal.clone()
    }
}

/// Shared view of an overlay's visibility. Clones observe the same overlay.
#[derive(Debug, Clone, Default)]
pub struct LoadingSignal(Arc<AtomicBool>);

impl LoadingSignal {
    pub fn is_visible(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Hides the loading overlay when dropped, on every exit path.
#[derive(Debug)]
pub struct LoadingGuard<'a> {
    overlay: &'a mut LoadingOverlay,
}

impl LoadingGuard<'_> {
    pub fn is_visible(&self) -> bool {
        self.overlay.visible
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.overlay.visible = false;
        self.overlay.text.clear();
        self.overlay.signal.0.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}
