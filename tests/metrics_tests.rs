//! Integration tests for the metrics loader.
//!
//! Decoding details live in `metrics::wire`'s unit tests. These exercise a
//! full load: a source on disk, the page projection, and the serialized
//! chart configs the frontend hands to Chart.js.

use std::fs;
use std::path::PathBuf;

use cellscope::cancel::CancelToken;
use cellscope::charts::MAX_ALPHA;
use cellscope::metrics::{FileMetricsSource, MetricField, MetricsError, decode, load_into};
use cellscope::page::Page;

const REPORT: &str = r#"{
    "classes": ["EOSINOFILO_NORMAL", "LINFOCITO_NORMAL_GRANDE", "TROMBOCITO_NORMAL"],
    "precision": [0.9, 0.75, 0.6],
    "recall": [0.8, 0.7, 0.5],
    "f1_scores": [0.847, 0.724, 0.545],
    "iou_thresholds": [0.5, 0.75, 0.95],
    "map_values": [0.672, 0.55, 0.2],
    "conf_matrix": [[40, 3, 1], [2, 30, 0], [0, 5, 10]],
    "epochs": [1, 2, 3],
    "training_loss": [1.9, 1.4, 1.1],
    "validation_loss": [2.0, 1.6, 1.3],
    "map50_by_epoch": [0.41, 0.58, 0.672],
    "map50_95_by_epoch": [0.2, 0.31, 0.4],
    "mean_precision": 0.75,
    "mean_recall": 0.6667,
    "mean_f1": 0.705,
    "map50": 0.672,
    "map50_95": 0.823
}"#;

/// Write `body` to a unique temp file and return its path.
fn fixture(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cellscope-metrics-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Page projection
// ---------------------------------------------------------------------------

#[test]
fn file_source_populates_summary_and_charts() {
    let source = FileMetricsSource::new(fixture("report.json", REPORT));
    let mut page = Page::default();

    let metrics = load_into(&source, &mut page, &CancelToken::new()).unwrap();

    assert_eq!(metrics.classes.len(), 3);
    assert!(page.performance.visible);
    assert_eq!(page.performance.field(MetricField::Map), Some("82.3%"));
    assert_eq!(page.performance.field(MetricField::Map50), Some("67.2%"));
    assert_eq!(page.performance.field(MetricField::Precision), Some("75.0%"));
    assert_eq!(page.performance.field(MetricField::F1), Some("70.5%"));
    // Optional value absent from the report
    assert_eq!(page.performance.field(MetricField::FinalMap), None);
    assert!(page.performance.charts.is_some());
}

#[test]
fn targets_missing_from_layout_are_skipped() {
    let source = FileMetricsSource::new(fixture("partial-layout.json", REPORT));
    let mut page = Page::with_summary_targets(&[MetricField::Map]);

    load_into(&source, &mut page, &CancelToken::new()).unwrap();

    assert_eq!(page.performance.field(MetricField::Map), Some("82.3%"));
    assert!(!page.performance.has_target(MetricField::Recall));
    assert_eq!(page.performance.field(MetricField::Recall), None);
}

#[test]
fn missing_file_leaves_panel_hidden() {
    let source = FileMetricsSource::new("/definitely/not/here/metrics.json");
    let mut page = Page::default();

    let err = load_into(&source, &mut page, &CancelToken::new()).unwrap_err();

    assert!(matches!(err, MetricsError::Io { .. }));
    assert!(!page.performance.visible);
    assert!(page.performance.charts.is_none());
}

#[test]
fn cancelled_load_does_not_touch_page() {
    let source = FileMetricsSource::new(fixture("cancelled.json", REPORT));
    let mut page = Page::default();
    let cancel = CancelToken::new();
    cancel.cancel();

    let err = load_into(&source, &mut page, &cancel).unwrap_err();

    assert!(matches!(err, MetricsError::Cancelled));
    assert!(!page.performance.visible);
}

#[test]
fn mismatched_learning_curve_is_malformed() {
    let body = REPORT.replace(
        r#""training_loss": [1.9, 1.4, 1.1]"#,
        r#""training_loss": [1.9, 1.4]"#,
    );
    let source = FileMetricsSource::new(fixture("mismatched.json", &body));
    let mut page = Page::default();

    let err = load_into(&source, &mut page, &CancelToken::new()).unwrap_err();

    assert!(matches!(err, MetricsError::Malformed(_)), "got {err:?}");
    assert!(!page.performance.visible);
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

const DATED: &str = r#"{
    "summary": {"map": MAP, "map50": 0.672, "mean_precision": 0.75, "mean_recall": 0.6667},
    "class_metrics": [
        {"class": "EOSINOFILO_NORMAL", "precision": 0.9, "recall": 0.8},
        {"class": "TROMBOCITO_NORMAL", "precision": 0.6, "recall": 0.5}
    ],
    "learning_curve": {
        "epoch": [1, 2, 3],
        "training_loss": [1.9, 1.4, 1.1],
        "validation_loss": [2.0, 1.6, 1.3],
        "map50": [0.41, 0.58, 0.672],
        "map50-95": [0.2, 0.31, 0.4]
    }
}"#;

#[test]
fn envelope_selects_latest_dated_model() {
    let older = DATED.replace("MAP", "0.5");
    let newer = DATED.replace("MAP", "0.823");
    let body = format!(r#"{{"2024-01-10_yolov8n": {older}, "2024-03-02_yolov8s": {newer}}}"#);
    let source = FileMetricsSource::new(fixture("envelope.json", &body));
    let mut page = Page::default();

    let metrics = load_into(&source, &mut page, &CancelToken::new()).unwrap();

    assert_eq!(metrics.model_key.as_deref(), Some("2024-03-02_yolov8s"));
    assert_eq!(page.performance.field(MetricField::Map), Some("82.3%"));
    assert_eq!(metrics.learning_curve.len(), 3);
    assert!(page.performance.charts.is_some());
}

#[test]
fn service_error_body_is_reported() {
    let err = decode(r#"{"error": "metrics file not found"}"#).unwrap_err();
    assert!(matches!(err, MetricsError::Service(ref m) if m == "metrics file not found"));
}

// ---------------------------------------------------------------------------
// Serialized chart configs
// ---------------------------------------------------------------------------

#[test]
fn chart_configs_serialize_to_chartjs_shape() {
    let source = FileMetricsSource::new(fixture("charts.json", REPORT));
    let mut page = Page::default();
    load_into(&source, &mut page, &CancelToken::new()).unwrap();

    let json = serde_json::to_value(&page.performance).unwrap();
    let charts = &json["charts"];

    let pr = &charts["precision_recall"];
    assert_eq!(pr["type"], "bar");
    assert_eq!(pr["data"]["labels"][1], "LINFOCITO_GRANDE");
    assert_eq!(pr["options"]["scales"]["y"]["beginAtZero"], true);
    assert_eq!(pr["options"]["plugins"]["tooltip"]["format"], "percent");

    let epochs = &charts["map_by_epoch"];
    assert_eq!(epochs["type"], "line");
    assert_eq!(epochs["data"]["labels"].as_array().unwrap().len(), 3);
    for dataset in epochs["data"]["datasets"].as_array().unwrap() {
        assert_eq!(dataset["data"].as_array().unwrap().len(), 3);
    }

    let confusion = &charts["confusion_matrix"];
    assert_eq!(confusion["data"]["labels"][0], "EOSIN");
    assert_eq!(confusion["options"]["plugins"]["tooltip"]["format"], "cell-text");
    assert_eq!(confusion["options"]["scales"]["x"]["stacked"], true);
    let first = &confusion["data"]["datasets"][0];
    assert_eq!(first["backgroundColor"][0], format!("rgba(74, 111, 165, {MAX_ALPHA})"));
    assert_eq!(
        first["tooltips"][1],
        "True class: EOSIN, Predicted: LINF_GRANDE, Count: 3"
    );
}
