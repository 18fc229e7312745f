//! JSON payloads of the metrics endpoint and their conversion to
//! [`ModelMetrics`](super::ModelMetrics).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{
    ClassMetric, ConfusionMatrix, IouPoint, LearningCurve, MetricsError, MetricsSummary,
    ModelMetrics,
};

/// Dated model keys look like `2024-05-01_yolov8` or `20240501-best`.
static DATED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}[-_]?\d{2}[-_]?\d{2}").expect("valid dated-key regex"));

/// Scalar aggregates as they appear on the wire.
///
/// `map` is mAP@0.5:0.95; some exporters name it `map50_95` instead. When
/// both are present `map` wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map50_95: Option<f64>,
    pub map50: f64,
    pub mean_precision: f64,
    pub mean_recall: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean_f1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_map: Option<f64>,
}

impl SummaryFields {
    fn into_summary(self) -> Result<MetricsSummary, MetricsError> {
        let map = self.map.or(self.map50_95).ok_or_else(|| {
            MetricsError::Malformed("summary has neither 'map' nor 'map50_95'".to_string())
        })?;
        Ok(MetricsSummary {
            map,
            map50: self.map50,
            mean_precision: self.mean_precision,
            mean_recall: self.mean_recall,
            mean_f1: self.mean_f1,
            final_map: self.final_map,
        })
    }
}

/// The flat metrics report.
///
/// Per-class vectors are parallel to `classes`; per-epoch vectors are
/// parallel to `epochs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsReport {
    #[serde(flatten)]
    pub summary: SummaryFields,

    pub classes: Vec<String>,
    pub precision: Vec<f64>,
    pub recall: Vec<f64>,
    #[serde(default)]
    pub f1_scores: Vec<f64>,

    #[serde(default)]
    pub iou_thresholds: Vec<f64>,
    #[serde(default)]
    pub map_values: Vec<f64>,

    #[serde(default)]
    pub conf_matrix: Vec<Vec<u64>>,

    #[serde(default)]
    pub epochs: Vec<u32>,
    #[serde(default)]
    pub training_loss: Vec<f64>,
    #[serde(default)]
    pub validation_loss: Vec<f64>,
    #[serde(default)]
    pub map50_by_epoch: Vec<f64>,
    #[serde(default)]
    pub map50_95_by_epoch: Vec<f64>,
}

impl MetricsReport {
    /// Validate parallel vectors and build the domain model.
    pub fn into_metrics(self, model_key: Option<String>) -> Result<ModelMetrics, MetricsError> {
        let n = self.classes.len();
        check_parallel("precision", self.precision.len(), "classes", n)?;
        check_parallel("recall", self.recall.len(), "classes", n)?;
        if !self.f1_scores.is_empty() {
            check_parallel("f1_scores", self.f1_scores.len(), "classes", n)?;
        }
        check_parallel(
            "map_values",
            self.map_values.len(),
            "iou_thresholds",
            self.iou_thresholds.len(),
        )?;

        let classes = self
            .classes
            .into_iter()
            .enumerate()
            .map(|(i, class)| ClassMetric {
                class,
                precision: self.precision[i],
                recall: self.recall[i],
                f1: self.f1_scores.get(i).copied(),
            })
            .collect();

        let iou_curve = self
            .iou_thresholds
            .iter()
            .zip(&self.map_values)
            .map(|(&threshold, &map)| IouPoint { threshold, map })
            .collect();

        let learning_curve = LearningCurve::new(
            self.epochs,
            self.training_loss,
            self.validation_loss,
            self.map50_by_epoch,
            self.map50_95_by_epoch,
        )?;

        let confusion = ConfusionMatrix::new(self.conf_matrix, n)?;

        Ok(ModelMetrics {
            model_key,
            summary: self.summary.into_summary()?,
            classes,
            iou_curve,
            learning_curve,
            confusion,
        })
    }
}

fn check_parallel(name: &str, len: usize, axis: &str, expected: usize) -> Result<(), MetricsError> {
    if len == expected {
        Ok(())
    } else {
        Err(MetricsError::Malformed(format!(
            "'{name}' has {len} entries but '{axis}' has {expected}"
        )))
    }
}

// ---------------------------------------------------------------------------
// Dated envelope
// ---------------------------------------------------------------------------

/// One model's entry in a `{ "<dated key>": DatedReport, ... }` envelope.
///
/// This shape carries no IoU curve or confusion matrix; those charts stay
/// empty.
#[derive(Debug, Clone, Deserialize)]
pub struct DatedReport {
    pub summary: SummaryFields,
    #[serde(default)]
    pub class_metrics: Vec<DatedClass>,
    #[serde(default)]
    pub learning_curve: DatedCurve,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatedClass {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    #[serde(default)]
    pub f1: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatedCurve {
    pub epoch: Vec<u32>,
    pub training_loss: Vec<f64>,
    pub validation_loss: Vec<f64>,
    pub map50: Vec<f64>,
    #[serde(rename = "map50-95")]
    pub map50_95: Vec<f64>,
}

impl DatedReport {
    pub fn into_metrics(self, model_key: String) -> Result<ModelMetrics, MetricsError> {
        let classes = self
            .class_metrics
            .into_iter()
            .map(|c| ClassMetric {
                class: c.class,
                precision: c.precision,
                recall: c.recall,
                f1: c.f1,
            })
            .collect();
        let curve = self.learning_curve;
        let learning_curve = LearningCurve::new(
            curve.epoch,
            curve.training_loss,
            curve.validation_loss,
            curve.map50,
            curve.map50_95,
        )?;

        Ok(ModelMetrics {
            model_key: Some(model_key),
            summary: self.summary.into_summary()?,
            classes,
            iou_curve: Vec::new(),
            learning_curve,
            confusion: ConfusionMatrix::new(Vec::new(), 0)?,
        })
    }
}

/// Decode a metrics response body.
///
/// Accepts the flat report directly, or an envelope of
/// `{ "<dated model key>": <dated report>, ... }` from which the
/// lexicographically greatest key is taken as the latest model.
pub fn decode(body: &str) -> Result<ModelMetrics, MetricsError> {
    let value: Value = serde_json::from_str(body)?;
    let Value::Object(mut map) = value else {
        return Err(MetricsError::Malformed(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    if !map.contains_key("classes") {
        if let Some(Value::String(message)) = map.get("error") {
            return Err(MetricsError::Service(message.clone()));
        }

        let Some(latest) = map.keys().max().cloned() else {
            return Err(MetricsError::Malformed(
                "metrics envelope contains no models".to_string(),
            ));
        };
        if !DATED_KEY.is_match(&latest) {
            tracing::warn!(
                key = %latest,
                "latest model key is not date-prefixed; ordering may not be chronological"
            );
        }
        let inner = map
            .remove(&latest)
            .ok_or_else(|| MetricsError::Malformed(format!("model '{latest}' vanished")))?;
        let report: DatedReport = serde_json::from_value(inner)?;
        tracing::debug!(
            key = %latest,
            models = map.len() + 1,
            "selected latest model from envelope"
        );
        return report.into_metrics(latest);
    }

    let report: MetricsReport = serde_json::from_value(Value::Object(map))?;
    report.into_metrics(None)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_report() -> serde_json::Value {
        serde_json::json!({
            "classes": ["EOSINOFILO_NORMAL", "ERITROCITO_NORMAL"],
            "precision": [1.0, 0.797],
            "recall": [0.798, 0.0155],
            "iou_thresholds": [0.5, 0.75],
            "map_values": [0.672, 0.5],
            "conf_matrix": [[3, 1], [0, 3]],
            "epochs": [1, 2, 3],
            "training_loss": [1.5, 1.3, 1.1],
            "validation_loss": [1.6, 1.4, 1.2],
            "map50_by_epoch": [0.4, 0.5, 0.6],
            "map50_95_by_epoch": [0.3, 0.4, 0.5],
            "mean_precision": 0.705,
            "mean_recall": 0.658,
            "map50": 0.672,
            "map": 0.518
        })
    }

    #[test]
    fn decodes_flat_report() {
        let metrics = decode(&flat_report().to_string()).unwrap();
        assert_eq!(metrics.model_key, None);
        assert_eq!(metrics.classes.len(), 2);
        assert_eq!(metrics.classes[1].recall, 0.0155);
        assert_eq!(metrics.classes[0].f1, None);
        assert_eq!(metrics.iou_curve.len(), 2);
        assert_eq!(metrics.learning_curve.len(), 3);
        assert_eq!(metrics.confusion.max(), 3);
        assert_eq!(metrics.summary.mean_f1, None);
    }

    #[test]
    fn accepts_map50_95_alias() {
        let mut report = flat_report();
        let obj = report.as_object_mut().unwrap();
        obj.remove("map");
        obj.insert("map50_95".to_string(), serde_json::json!(0.823));
        let metrics = decode(&report.to_string()).unwrap();
        assert_eq!(metrics.summary.map, 0.823);
    }

    #[test]
    fn map_wins_when_both_spellings_present() {
        let mut report = flat_report();
        report["map50_95"] = serde_json::json!(0.823);
        let metrics = decode(&report.to_string()).unwrap();
        assert_eq!(metrics.summary.map, 0.518);
    }

    #[test]
    fn missing_map_is_malformed() {
        let mut report = flat_report();
        report.as_object_mut().unwrap().remove("map");
        let err = decode(&report.to_string()).unwrap_err();
        assert!(matches!(err, MetricsError::Malformed(ref m) if m.contains("map")), "got {err:?}");
    }

    fn dated_report(map: f64) -> serde_json::Value {
        serde_json::json!({
            "summary": {"map": map, "map50": 0.672, "mean_precision": 0.705, "mean_recall": 0.658},
            "class_metrics": [
                {"class": "EOSINOFILO_NORMAL", "precision": 1.0, "recall": 0.798},
                {"class": "ERITROCITO_NORMAL", "precision": 0.797, "recall": 0.0155}
            ],
            "learning_curve": {
                "epoch": [1, 2],
                "training_loss": [1.5, 1.3],
                "validation_loss": [1.6, 1.4],
                "map50": [0.4, 0.5],
                "map50-95": [0.3, 0.4]
            }
        })
    }

    #[test]
    fn envelope_selects_greatest_key() {
        let body = serde_json::json!({
            "2024-01-15_yolov8": dated_report(0.5),
            "2024-03-02_yolov8": dated_report(0.9),
            "2023-12-30_yolov8": dated_report(0.4),
        });
        let metrics = decode(&body.to_string()).unwrap();
        assert_eq!(metrics.model_key.as_deref(), Some("2024-03-02_yolov8"));
        assert_eq!(metrics.summary.map, 0.9);
        assert_eq!(metrics.classes.len(), 2);
        assert_eq!(metrics.learning_curve.map50_95(), &[0.3, 0.4]);
        assert!(metrics.iou_curve.is_empty());
        assert_eq!(metrics.confusion.size(), 0);
    }

    #[test]
    fn envelope_with_mismatched_curve_is_malformed() {
        let mut report = dated_report(0.5);
        report["learning_curve"]["map50-95"] = serde_json::json!([0.3]);
        let body = serde_json::json!({ "2024-01-15_yolov8": report });
        assert!(matches!(decode(&body.to_string()), Err(MetricsError::Malformed(_))));
    }

    #[test]
    fn empty_envelope_is_malformed() {
        assert!(matches!(decode("{}"), Err(MetricsError::Malformed(_))));
    }

    #[test]
    fn error_body_is_service_error() {
        let err = decode(r#"{"error": "model not loaded"}"#).unwrap_err();
        assert!(matches!(err, MetricsError::Service(ref m) if m == "model not loaded"));
    }

    #[test]
    fn non_object_is_malformed() {
        assert!(matches!(decode("[1, 2]"), Err(MetricsError::Malformed(_))));
        assert!(matches!(decode("not json"), Err(MetricsError::Parse(_))));
    }

    #[test]
    fn mismatched_class_vectors_are_rejected() {
        let mut report = flat_report();
        report["recall"] = serde_json::json!([0.5]);
        let err = decode(&report.to_string()).unwrap_err();
        assert!(matches!(err, MetricsError::Malformed(ref m) if m.contains("recall")));
    }

    #[test]
    fn mismatched_learning_curve_is_rejected() {
        let mut report = flat_report();
        report["validation_loss"] = serde_json::json!([1.0, 0.9]);
        assert!(matches!(
            decode(&report.to_string()),
            Err(MetricsError::Malformed(_))
        ));
    }

    #[test]
    fn dated_key_pattern() {
        assert!(DATED_KEY.is_match("2024-05-01_yolov8"));
        assert!(DATED_KEY.is_match("20240501"));
        assert!(!DATED_KEY.is_match("latest"));
    }
}
