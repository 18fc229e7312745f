use crate::metrics::ModelMetrics;

use super::{
    Axis, ChartConfig, ChartData, ChartKind, ChartOptions, Dataset, Plugins, Rgb, Scales, Title,
    percents,
};

/// Grouped bars of per-class precision and recall, in percent.
pub fn precision_recall_chart(metrics: &ModelMetrics) -> ChartConfig {
    let labels = metrics.classes.iter().map(|c| c.display_name()).collect();
    let precision = percents(metrics.classes.iter().map(|c| c.precision));
    let recall = percents(metrics.classes.iter().map(|c| c.recall));

    ChartConfig {
        kind: ChartKind::Bar,
        data: ChartData {
            labels,
            datasets: vec![
                Dataset::bar("Precision", precision, Rgb::STEEL),
                Dataset::bar("Recall", recall, Rgb::SKY),
            ],
        },
        options: ChartOptions {
            responsive: true,
            scales: Scales {
                x: Some(Axis::default().slanted()),
                y: Some(Axis::percent("Percentage (%)")),
            },
            plugins: Plugins {
                title: Some(Title::hidden()),
                ..Plugins::percent_tooltip()
            },
        },
    }
}

/// mAP at each IoU threshold.
pub fn map_by_iou_chart(metrics: &ModelMetrics) -> ChartConfig {
    let labels = metrics
        .iou_curve
        .iter()
        .map(|p| format!("IoU {}", p.threshold))
        .collect();
    let mut dataset = Dataset::line(
        "mAP",
        percents(metrics.iou_curve.iter().map(|p| p.map)),
        Rgb::GREEN,
    );
    dataset.point_background_color = Some(Rgb::GREEN.alpha(1.0));

    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels,
            datasets: vec![dataset],
        },
        options: ChartOptions {
            responsive: true,
            scales: Scales {
                x: None,
                y: Some(Axis::percent("mAP (%)")),
            },
            plugins: Plugins::percent_tooltip(),
        },
    }
}

fn epoch_labels(metrics: &ModelMetrics) -> Vec<String> {
    metrics
        .learning_curve
        .epochs()
        .iter()
        .map(u32::to_string)
        .collect()
}

/// Training and validation loss per epoch.
pub fn learning_curve_chart(metrics: &ModelMetrics) -> ChartConfig {
    let curve = &metrics.learning_curve;

    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels: epoch_labels(metrics),
            datasets: vec![
                Dataset::line("Training loss", curve.training_loss().to_vec(), Rgb::ROSE),
                Dataset::line("Validation loss", curve.validation_loss().to_vec(), Rgb::BLUE),
            ],
        },
        options: ChartOptions {
            responsive: true,
            scales: Scales {
                x: Some(Axis::titled("Epochs")),
                y: Some(Axis::titled("Loss")),
            },
            plugins: Plugins::default(),
        },
    }
}

/// mAP@0.5 and mAP@0.5:0.95 per epoch, y clamped to 0–100%.
pub fn map_by_epoch_chart(metrics: &ModelMetrics) -> ChartConfig {
    let curve = &metrics.learning_curve;
    let y = Axis {
        min: Some(0.0),
        ..Axis::percent("mAP (%)")
    };

    ChartConfig {
        kind: ChartKind::Line,
        data: ChartData {
            labels: epoch_labels(metrics),
            datasets: vec![
                Dataset::line("mAP@0.5", percents(curve.map50().iter().copied()), Rgb::GREEN),
                Dataset::line(
                    "mAP@0.5:0.95",
                    percents(curve.map50_95().iter().copied()),
                    Rgb::VIOLET,
                ),
            ],
        },
        options: ChartOptions {
            responsive: true,
            scales: Scales {
                x: Some(Axis::titled("Epochs")),
                y: Some(y),
            },
            plugins: Plugins::percent_tooltip(),
        },
    }
}
