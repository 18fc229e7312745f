//! Model-evaluation metrics: the validated domain model, decoding of the
//! service payload, and loading into the dashboard page.
//!
//! The canonical record is the flat report served by `GET /model-metrics`
//! (see [`wire::MetricsReport`]). A registry that publishes several models
//! answers with an envelope keyed by dated model identifiers instead, whose
//! entries use the nested [`wire::DatedReport`] shape; [`wire::decode`]
//! picks the latest one.

pub mod loader;
pub mod wire;

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

pub use loader::{FileMetricsSource, HttpMetricsSource, MetricsSource, load_into};
pub use wire::decode;

/// Errors raised while fetching or decoding metrics.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metrics request failed: {0}")]
    Transport(String),
    #[error("metrics request timed out after {0:?}")]
    TimedOut(Duration),
    #[error("metrics request cancelled")]
    Cancelled,
    #[error("metrics service reported an error: {0}")]
    Service(String),
    #[error("metrics response is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("malformed metrics: {0}")]
    Malformed(String),
    #[error("failed to read metrics file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Domain model
// ---------------------------------------------------------------------------

/// Scalar aggregates, all ratios in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSummary {
    /// mAP averaged over IoU 0.5:0.95.
    pub map: f64,
    pub map50: f64,
    pub mean_precision: f64,
    pub mean_recall: f64,
    pub mean_f1: Option<f64>,
    /// mAP at the strictest IoU threshold.
    pub final_map: Option<f64>,
}

impl MetricsSummary {
    pub fn value(&self, field: MetricField) -> Option<f64> {
        match field {
            MetricField::Map => Some(self.map),
            MetricField::Map50 => Some(self.map50),
            MetricField::Precision => Some(self.mean_precision),
            MetricField::Recall => Some(self.mean_recall),
            MetricField::F1 => self.mean_f1,
            MetricField::FinalMap => self.final_map,
        }
    }
}

/// Summary display targets on the performance panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricField {
    Map,
    Map50,
    Precision,
    Recall,
    F1,
    FinalMap,
}

impl MetricField {
    pub const ALL: [MetricField; 6] = [
        MetricField::Map,
        MetricField::Map50,
        MetricField::Precision,
        MetricField::Recall,
        MetricField::F1,
        MetricField::FinalMap,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Map => "mAP@0.5:0.95",
            Self::Map50 => "mAP@0.5",
            Self::Precision => "Mean precision",
            Self::Recall => "Mean recall",
            Self::F1 => "Mean F1",
            Self::FinalMap => "Final mAP",
        }
    }
}

/// Per-class precision/recall.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetric {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: Option<f64>,
}

impl ClassMetric {
    pub fn display_name(&self) -> String {
        display_class_name(&self.class)
    }
}

/// Strip the first `_NORMAL` marker from a class name.
pub fn display_class_name(class: &str) -> String {
    class.replacen("_NORMAL", "", 1)
}

/// One point of the mAP-by-IoU-threshold curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IouPoint {
    pub threshold: f64,
    pub map: f64,
}

/// Per-epoch training history. All series share the epoch axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningCurve {
    epochs: Vec<u32>,
    training_loss: Vec<f64>,
    validation_loss: Vec<f64>,
    map50: Vec<f64>,
    map50_95: Vec<f64>,
}

impl LearningCurve {
    /// Build a curve, rejecting series whose lengths differ or epochs that
    /// do not strictly increase.
    pub fn new(
        epochs: Vec<u32>,
        training_loss: Vec<f64>,
        validation_loss: Vec<f64>,
        map50: Vec<f64>,
        map50_95: Vec<f64>,
    ) -> Result<Self, MetricsError> {
        let n = epochs.len();
        for (name, len) in [
            ("training_loss", training_loss.len()),
            ("validation_loss", validation_loss.len()),
            ("map50_by_epoch", map50.len()),
            ("map50_95_by_epoch", map50_95.len()),
        ] {
            if len != n {
                return Err(MetricsError::Malformed(format!(
                    "learning curve series '{name}' has {len} points but there are {n} epochs"
                )));
            }
        }
        if let Some(pair) = epochs.windows(2).find(|w| w[0] >= w[1]) {
            return Err(MetricsError::Malformed(format!(
                "epochs must strictly increase, found {} then {}",
                pair[0], pair[1]
            )));
        }
        Ok(Self {
            epochs,
            training_loss,
            validation_loss,
            map50,
            map50_95,
        })
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn epochs(&self) -> &[u32] {
        &self.epochs
    }

    pub fn training_loss(&self) -> &[f64] {
        &self.training_loss
    }

    pub fn validation_loss(&self) -> &[f64] {
        &self.validation_loss
    }

    pub fn map50(&self) -> &[f64] {
        &self.map50
    }

    pub fn map50_95(&self) -> &[f64] {
        &self.map50_95
    }
}

/// True-class (row) by predicted-class (column) counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfusionMatrix {
    rows: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    /// Build a matrix for `classes` labels. An empty matrix is accepted;
    /// otherwise it must be square with one row per class.
    pub fn new(rows: Vec<Vec<u64>>, classes: usize) -> Result<Self, MetricsError> {
        if rows.is_empty() {
            return Ok(Self { rows });
        }
        if rows.len() != classes {
            return Err(MetricsError::Malformed(format!(
                "confusion matrix has {} rows for {classes} classes",
                rows.len()
            )));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != classes) {
            return Err(MetricsError::Malformed(format!(
                "confusion matrix row {i} has {} cells for {classes} classes",
                row.len()
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[Vec<u64>] {
        &self.rows
    }

    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Largest count anywhere in the matrix.
    pub fn max(&self) -> u64 {
        self.rows.iter().flatten().copied().max().unwrap_or(0)
    }
}

/// A fully validated metrics snapshot for one model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetrics {
    /// Envelope key the report was selected under, if any.
    pub model_key: Option<String>,
    pub summary: MetricsSummary,
    pub classes: Vec<ClassMetric>,
    pub iou_curve: Vec<IouPoint>,
    pub learning_curve: LearningCurve,
    pub confusion: ConfusionMatrix,
}

// ---------------------------------------------------------------------------
// Formatting
// ---------------------------------------------------------------------------

/// Format a ratio as a percentage with one decimal (`0.823` → `"82.3%"`).
pub fn format_percent(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_percent_uses_one_decimal() {
        assert_eq!(format_percent(0.823), "82.3%");
        assert_eq!(format_percent(0.672), "67.2%");
        assert_eq!(format_percent(1.0), "100.0%");
        assert_eq!(format_percent(0.0), "0.0%");
    }

    #[test]
    fn display_name_strips_first_normal_marker() {
        assert_eq!(display_class_name("EOSINOFILO_NORMAL"), "EOSINOFILO");
        assert_eq!(
            display_class_name("LINFOCITO_NORMAL_GRANDE"),
            "LINFOCITO_GRANDE"
        );
        assert_eq!(display_class_name("PLATELET"), "PLATELET");
    }

    #[test]
    fn learning_curve_accepts_matching_series() {
        let curve = LearningCurve::new(
            vec![1, 2, 3],
            vec![1.5, 1.2, 1.0],
            vec![1.6, 1.3, 1.1],
            vec![0.4, 0.5, 0.6],
            vec![0.3, 0.35, 0.4],
        )
        .unwrap();
        assert_eq!(curve.len(), 3);
        assert_eq!(curve.epochs(), &[1, 2, 3]);
    }

    #[test]
    fn learning_curve_rejects_mismatched_lengths() {
        let err = LearningCurve::new(
            vec![1, 2, 3],
            vec![1.5, 1.2],
            vec![1.6, 1.3, 1.1],
            vec![0.4, 0.5, 0.6],
            vec![0.3, 0.35, 0.4],
        )
        .unwrap_err();
        assert!(matches!(err, MetricsError::Malformed(ref m) if m.contains("training_loss")));
    }

    #[test]
    fn learning_curve_rejects_unordered_epochs() {
        let err = LearningCurve::new(
            vec![1, 3, 2],
            vec![0.0; 3],
            vec![0.0; 3],
            vec![0.0; 3],
            vec![0.0; 3],
        )
        .unwrap_err();
        assert!(matches!(err, MetricsError::Malformed(_)));
    }

    #[test]
    fn confusion_matrix_must_be_square() {
        assert!(ConfusionMatrix::new(vec![vec![1, 0], vec![0, 1]], 2).is_ok());
        assert!(ConfusionMatrix::new(vec![], 2).is_ok());
        assert!(ConfusionMatrix::new(vec![vec![1, 0]], 2).is_err());
        assert!(ConfusionMatrix::new(vec![vec![1, 0], vec![0]], 2).is_err());
    }

    #[test]
    fn summary_optional_fields_are_none() {
        let summary = MetricsSummary {
            map: 0.5,
            map50: 0.6,
            mean_precision: 0.7,
            mean_recall: 0.8,
            mean_f1: None,
            final_map: None,
        };
        assert_eq!(summary.value(MetricField::Map), Some(0.5));
        assert_eq!(summary.value(MetricField::F1), None);
        assert_eq!(summary.value(MetricField::FinalMap), None);
    }
}
