use crate::metrics::ModelMetrics;

use super::{
    Axis, ChartConfig, ChartData, ChartKind, ChartOptions, Dataset, Font, Legend, LegendLabels,
    Paint, Plugins, Scales, Title, Tooltip, TooltipFormat,
};

/// Cell opacity used for the diagonal, the brightest a cell can get.
pub const MAX_ALPHA: f64 = 0.9;

const CELL_RGB: (u8, u8, u8) = (74, 111, 165);

/// Shorten the long blood-cell class names so the axis stays readable.
pub fn abbreviate_class(class: &str) -> String {
    // Each replacement applies to the first occurrence only.
    const RULES: [(&str, &str); 6] = [
        ("_NORMAL", ""),
        ("NEUTROFILO_", "NEUT_"),
        ("LINFOCITO_", "LINF_"),
        ("ERITROCITO", "ERITR"),
        ("EOSINOFILO", "EOSIN"),
        ("TROMBOCITO", "TROMB"),
    ];
    RULES
        .iter()
        .fold(class.to_string(), |name, (from, to)| name.replacen(from, to, 1))
}

/// Opacity of cell `(row, col)`: diagonal cells are pinned to
/// [`MAX_ALPHA`], the rest scale linearly with the matrix-wide maximum.
pub fn cell_alpha(count: u64, max: u64, diagonal: bool) -> f64 {
    if diagonal {
        MAX_ALPHA
    } else if max == 0 {
        0.0
    } else {
        MAX_ALPHA * count as f64 / max as f64
    }
}

/// Stacked bars, one dataset per true class, bars grouped by predicted class.
pub fn confusion_matrix_chart(metrics: &ModelMetrics) -> ChartConfig {
    let names: Vec<String> = metrics
        .classes
        .iter()
        .map(|c| abbreviate_class(&c.class))
        .collect();
    let max = metrics.confusion.max();
    let (r, g, b) = CELL_RGB;

    let datasets = metrics
        .confusion
        .rows()
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let true_class = &names[i];
            let colors = row
                .iter()
                .enumerate()
                .map(|(j, &count)| {
                    format!("rgba({r}, {g}, {b}, {})", cell_alpha(count, max, i == j))
                })
                .collect();
            let tooltips = row
                .iter()
                .enumerate()
                .map(|(j, &count)| {
                    format!("True class: {true_class}, Predicted: {}, Count: {count}", names[j])
                })
                .collect();
            Dataset {
                label: format!("{true_class} (true)"),
                data: row.iter().map(|&c| c as f64).collect(),
                background_color: Paint::PerPoint(colors),
                border_color: "rgba(255, 255, 255, 0.5)".to_string(),
                border_width: Some(1),
                fill: None,
                tension: None,
                point_background_color: None,
                tooltips: Some(tooltips),
            }
        })
        .collect();

    let x = Axis {
        stacked: Some(true),
        ..Axis::titled("Prediction").slanted()
    };
    let y = Axis {
        stacked: Some(true),
        ..Axis::titled("Count")
    };

    ChartConfig {
        kind: ChartKind::Bar,
        data: ChartData {
            labels: names,
            datasets,
        },
        options: ChartOptions {
            responsive: true,
            scales: Scales {
                x: Some(x),
                y: Some(y),
            },
            plugins: Plugins {
                title: Some(Title {
                    font: Some(Font { size: 14 }),
                    ..Title::shown("Confusion matrix")
                }),
                legend: Some(Legend {
                    position: "right".to_string(),
                    labels: LegendLabels { box_width: 12 },
                }),
                tooltip: Some(Tooltip {
                    format: TooltipFormat::CellText,
                }),
            },
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::decode;

    fn metrics(conf: &str) -> ModelMetrics {
        decode(&format!(
            r#"{{
            "classes": ["NEUTROFILO_NORMAL_BANDA", "TROMBOCITO_NORMAL", "ERITROCITO_NORMAL"],
            "precision": [0.6, 0.7, 0.8], "recall": [0.9, 0.5, 0.1],
            "conf_matrix": {conf},
            "mean_precision": 0.7, "mean_recall": 0.5, "map50": 0.6, "map": 0.5
        }}"#
        ))
        .unwrap()
    }

    #[test]
    fn abbreviations_match_axis_labels() {
        assert_eq!(abbreviate_class("NEUTROFILO_NORMAL_BANDA"), "NEUT_BANDA");
        assert_eq!(abbreviate_class("LINFOCITO_NORMAL_PEQUENO"), "LINF_PEQUENO");
        assert_eq!(abbreviate_class("EOSINOFILO_NORMAL"), "EOSIN");
        assert_eq!(abbreviate_class("TROMBOCITO_NORMAL"), "TROMB");
        assert_eq!(abbreviate_class("MONOCITO_NORMAL"), "MONOCITO");
    }

    #[test]
    fn alpha_scales_with_matrix_max_and_pins_diagonal() {
        assert_eq!(cell_alpha(1, 1, true), MAX_ALPHA);
        assert_eq!(cell_alpha(0, 10, true), MAX_ALPHA);
        assert_eq!(cell_alpha(5, 10, false), MAX_ALPHA * 5.0 / 10.0);
        assert_eq!(cell_alpha(10, 10, false), MAX_ALPHA);
        assert_eq!(cell_alpha(0, 0, false), 0.0);
    }

    #[test]
    fn one_dataset_per_true_class() {
        let chart = confusion_matrix_chart(&metrics("[[20, 2, 0], [4, 6, 0], [0, 0, 1]]"));
        assert_eq!(chart.data.labels, vec!["NEUT_BANDA", "TROMB", "ERITR"]);
        assert_eq!(chart.data.datasets.len(), 3);

        let row = &chart.data.datasets[1];
        assert_eq!(row.label, "TROMB (true)");
        assert_eq!(row.data, vec![4.0, 6.0, 0.0]);
        let Paint::PerPoint(colors) = &row.background_color else {
            panic!("expected per-cell colors");
        };
        assert_eq!(colors[0], format!("rgba(74, 111, 165, {})", MAX_ALPHA * 4.0 / 20.0));
        assert_eq!(colors[1], "rgba(74, 111, 165, 0.9)");
        assert_eq!(colors[2], "rgba(74, 111, 165, 0)");
    }

    #[test]
    fn tooltips_report_true_predicted_and_count() {
        let chart = confusion_matrix_chart(&metrics("[[20, 2, 0], [4, 6, 0], [0, 0, 1]]"));
        let tips = chart.data.datasets[0].tooltips.as_ref().unwrap();
        assert_eq!(
            tips[1],
            "True class: NEUT_BANDA, Predicted: TROMB, Count: 2"
        );
        assert_eq!(chart.options.plugins.tooltip.as_ref().unwrap().format, TooltipFormat::CellText);
    }

    #[test]
    fn empty_matrix_yields_no_datasets() {
        let chart = confusion_matrix_chart(&metrics("[]"));
        assert!(chart.data.datasets.is_empty());
        assert_eq!(chart.data.labels.len(), 3);
    }
}
