//! Chart.js configuration objects projected from a metrics snapshot.
//!
//! Every builder is a pure function of [`ModelMetrics`]: the same snapshot
//! always yields the same configuration and nothing here holds state. The
//! structs serialize to the exact JSON shape `new Chart(ctx, config)`
//! expects. Tooltip callbacks cannot travel as JSON, so [`TooltipFormat`]
//! names the callback the frontend should install.

mod confusion;
mod series;

use serde::Serialize;

use crate::metrics::ModelMetrics;

pub use confusion::{MAX_ALPHA, abbreviate_class, cell_alpha, confusion_matrix_chart};
pub use series::{
    learning_curve_chart, map_by_epoch_chart, map_by_iou_chart, precision_recall_chart,
};

// ---------------------------------------------------------------------------
// Chart.js config types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartConfig {
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub data: ChartData,
    pub options: ChartOptions,
}

impl ChartConfig {
    pub fn dataset(&self, label: &str) -> Option<&Dataset> {
        self.data.datasets.iter().find(|d| d.label == label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
}

/// A single color or one color per data point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Paint {
    Solid(String),
    PerPoint(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub label: String,
    pub data: Vec<f64>,
    pub background_color: Paint,
    pub border_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tension: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_background_color: Option<String>,
    /// Precomputed tooltip line per data point, read by the `cell-text`
    /// tooltip callback.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltips: Option<Vec<String>>,
}

impl Dataset {
    /// Bar series with a translucent fill and solid 1px border.
    fn bar(label: &str, data: Vec<f64>, rgb: Rgb) -> Self {
        Self {
            label: label.to_string(),
            data,
            background_color: Paint::Solid(rgb.alpha(0.7)),
            border_color: rgb.alpha(1.0),
            border_width: Some(1),
            fill: None,
            tension: None,
            point_background_color: None,
            tooltips: None,
        }
    }

    /// Unfilled line series with light smoothing.
    fn line(label: &str, data: Vec<f64>, rgb: Rgb) -> Self {
        Self {
            label: label.to_string(),
            data,
            background_color: Paint::Solid(rgb.alpha(0.2)),
            border_color: rgb.alpha(1.0),
            border_width: None,
            fill: Some(false),
            tension: Some(0.1),
            point_background_color: None,
            tooltips: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartOptions {
    pub responsive: bool,
    pub scales: Scales,
    pub plugins: Plugins,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scales {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Axis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Axis>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Axis {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub begin_at_zero: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticks: Option<Ticks>,
}

impl Axis {
    fn titled(text: &str) -> Self {
        Self {
            title: Some(Title::shown(text)),
            ..Self::default()
        }
    }

    /// Percentage axis pinned to 0–100.
    fn percent(text: &str) -> Self {
        Self {
            begin_at_zero: Some(true),
            max: Some(100.0),
            ..Self::titled(text)
        }
    }

    fn slanted(mut self) -> Self {
        self.ticks = Some(Ticks {
            max_rotation: 45,
            min_rotation: 45,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Title {
    pub display: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

impl Title {
    fn shown(text: &str) -> Self {
        Self {
            display: true,
            text: text.to_string(),
            font: None,
        }
    }

    fn hidden() -> Self {
        Self {
            display: false,
            text: String::new(),
            font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticks {
    pub max_rotation: u32,
    pub min_rotation: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Plugins {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Title>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legend: Option<Legend>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<Tooltip>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Legend {
    pub position: String,
    pub labels: LegendLabels,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendLabels {
    pub box_width: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub format: TooltipFormat,
}

/// Which tooltip label callback the frontend installs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TooltipFormat {
    /// `"<dataset>: <value>%"`
    Percent,
    /// The dataset's precomputed `tooltips[dataIndex]`.
    CellText,
}

impl Plugins {
    fn percent_tooltip() -> Self {
        Self {
            tooltip: Some(Tooltip {
                format: TooltipFormat::Percent,
            }),
            ..Self::default()
        }
    }
}

// ---------------------------------------------------------------------------
// Colors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct Rgb(u8, u8, u8);

impl Rgb {
    const STEEL: Rgb = Rgb(74, 111, 165);
    const SKY: Rgb = Rgb(90, 185, 234);
    const GREEN: Rgb = Rgb(76, 175, 80);
    const ROSE: Rgb = Rgb(255, 99, 132);
    const BLUE: Rgb = Rgb(54, 162, 235);
    const VIOLET: Rgb = Rgb(153, 102, 255);

    fn alpha(self, a: f64) -> String {
        format!("rgba({}, {}, {}, {})", self.0, self.1, self.2, a)
    }
}

/// Convert ratios to percentages for plotting.
fn percents(ratios: impl IntoIterator<Item = f64>) -> Vec<f64> {
    ratios.into_iter().map(|r| r * 100.0).collect()
}

// ---------------------------------------------------------------------------
// Chart set
// ---------------------------------------------------------------------------

/// The five charts of the performance panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSet {
    pub precision_recall: ChartConfig,
    pub map_by_iou: ChartConfig,
    pub learning_curve: ChartConfig,
    pub map_by_epoch: ChartConfig,
    pub confusion_matrix: ChartConfig,
}

impl ChartSet {
    pub fn from_metrics(metrics: &ModelMetrics) -> Self {
        Self {
            precision_recall: precision_recall_chart(metrics),
            map_by_iou: map_by_iou_chart(metrics),
            learning_curve: learning_curve_chart(metrics),
            map_by_epoch: map_by_epoch_chart(metrics),
            confusion_matrix: confusion_matrix_chart(metrics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_formats_like_css() {
        assert_eq!(Rgb::STEEL.alpha(0.7), "rgba(74, 111, 165, 0.7)");
        assert_eq!(Rgb::GREEN.alpha(1.0), "rgba(76, 175, 80, 1)");
    }

    #[test]
    fn config_serializes_to_chartjs_shape() {
        let config = ChartConfig {
            kind: ChartKind::Line,
            data: ChartData {
                labels: vec!["1".to_string()],
                datasets: vec![Dataset::line("Loss", vec![1.0], Rgb::ROSE)],
            },
            options: ChartOptions {
                responsive: true,
                scales: Scales {
                    x: None,
                    y: Some(Axis::percent("mAP (%)")),
                },
                plugins: Plugins::percent_tooltip(),
            },
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["type"], "line");
        assert_eq!(json["data"]["datasets"][0]["borderColor"], "rgba(255, 99, 132, 1)");
        assert_eq!(json["data"]["datasets"][0]["fill"], false);
        assert_eq!(json["options"]["scales"]["y"]["beginAtZero"], true);
        assert_eq!(json["options"]["scales"]["y"]["max"], 100.0);
        assert_eq!(json["options"]["plugins"]["tooltip"]["format"], "percent");
        assert!(json["options"]["scales"].get("x").is_none());
        assert!(json["data"]["datasets"][0].get("tooltips").is_none());
    }
}
