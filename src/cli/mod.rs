//! CLI command implementations for cellscope.
//!
//! Provides subcommand handlers for:
//! - `cellscope metrics`: model performance summary, per-class table, curves
//! - `cellscope analyze FILE`: submit an image or video for detection
//! - `cellscope health`: check the detection service and config
//! - `cellscope config show|init|set|reset`: configuration management

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;

use crate::analyze::{AnalyzeOutcome, HttpAnalyzeClient};
use crate::cancel::CancelToken;
use crate::charts::abbreviate_class;
use crate::config::{self, CellscopeConfig};
use crate::controller::UploadController;
use crate::health;
use crate::metrics::{
    FileMetricsSource, MetricField, MetricsSource, ModelMetrics, format_percent, load_into,
    loader::source_from_config,
};
use crate::page::{DetectionRow, NoticeLevel, Page};
use crate::upload::{SelectedFile, decode_data_url};

/// Output format for report commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            Some("csv") => Self::Csv,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// cellscope metrics
// ---------------------------------------------------------------------------

/// Load the model metrics and print them.
pub fn run_metrics(
    config: &CellscopeConfig,
    format: OutputFormat,
    file: Option<&Path>,
) -> Result<()> {
    let source: Box<dyn MetricsSource> = match file {
        Some(path) => Box::new(FileMetricsSource::new(path)),
        None => source_from_config(&config.service),
    };

    let mut page = Page::default();
    let metrics = load_into(source.as_ref(), &mut page, &CancelToken::new())
        .with_context(|| format!("failed to load metrics from {}", source.describe()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&metrics)?),
        OutputFormat::Csv => print_metrics_csv(&metrics),
        OutputFormat::Table => print_metrics_table(&metrics, &page, &source.describe()),
    }

    Ok(())
}

fn print_metrics_table(metrics: &ModelMetrics, page: &Page, origin: &str) {
    println!("{}", "cellscope Model Performance".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {} {}", "Source:".bold(), origin.dimmed());
    if let Some(key) = &metrics.model_key {
        println!("  {} {}", "Model: ".bold(), key);
    }
    println!();

    // Summary
    for field in MetricField::ALL {
        if let Some(text) = page.performance.field(field) {
            println!("  {:<16} {}", format!("{}:", field.label()).bold(), text.green());
        }
    }
    println!();

    // Per-class table
    if !metrics.classes.is_empty() {
        println!("{}", "Per-class Precision / Recall".bold().cyan());
        println!("  {:<24} {:>10} {:>10} {:>10}", "Class", "Precision", "Recall", "F1");
        println!("  {}", "-".repeat(58));
        for (i, class) in metrics.classes.iter().enumerate() {
            let line = format!(
                "  {:<24} {:>10} {:>10} {:>10}",
                truncate(&class.display_name(), 24),
                format_percent(class.precision),
                format_percent(class.recall),
                class.f1.map(format_percent).unwrap_or_else(|| "-".to_string()),
            );
            if i % 2 == 0 {
                println!("{line}");
            } else {
                println!("{}", line.dimmed());
            }
        }
        println!();
    }

    // Curves
    if !metrics.iou_curve.is_empty() {
        println!("{}", "mAP by IoU threshold".bold().cyan());
        let points: Vec<String> = metrics
            .iou_curve
            .iter()
            .map(|p| format!("{}={}", p.threshold, format_percent(p.map)))
            .collect();
        println!("  {}", points.join("  "));
        println!();
    }

    let curve = &metrics.learning_curve;
    if let (Some(&last), Some(&train), Some(&val)) = (
        curve.epochs().last(),
        curve.training_loss().last(),
        curve.validation_loss().last(),
    ) {
        println!("{}", "Training".bold().cyan());
        println!(
            "  {} epochs, final loss {:.4} (train) / {:.4} (val)",
            last, train, val
        );
        println!();
    }

    // Confusion matrix
    if metrics.confusion.size() > 0 {
        println!("{}", "Confusion matrix (rows: true, columns: predicted)".bold().cyan());
        let names: Vec<String> = metrics
            .classes
            .iter()
            .map(|c| truncate(&abbreviate_class(&c.class), 10))
            .collect();
        let header: String = names.iter().map(|n| format!(" {n:>10}")).collect();
        println!("  {:<10}{}", "", header.bold());
        for (i, row) in metrics.confusion.rows().iter().enumerate() {
            let cells: String = row
                .iter()
                .enumerate()
                .map(|(j, n)| {
                    let cell = format!(" {n:>10}");
                    if i == j { cell.green().to_string() } else { cell }
                })
                .collect();
            println!("  {:<10}{}", names[i].bold(), cells);
        }
    }
}

fn print_metrics_csv(metrics: &ModelMetrics) {
    println!("class,precision,recall,f1");
    for class in &metrics.classes {
        println!(
            "{},{:.4},{:.4},{}",
            class.class,
            class.precision,
            class.recall,
            class.f1.map(|f| format!("{f:.4}")).unwrap_or_default(),
        );
    }
}

// ---------------------------------------------------------------------------
// cellscope analyze
// ---------------------------------------------------------------------------

/// Submit a file for detection and print the results.
///
/// Ctrl-C cancels the in-flight request. With `save`, the annotated image
/// is written to disk.
pub fn run_analyze(
    config: &CellscopeConfig,
    path: &Path,
    format: OutputFormat,
    save: Option<&Path>,
) -> Result<()> {
    let file = SelectedFile::from_path(path)?;
    let client = HttpAnalyzeClient::new(config.service.clone());
    let mut controller = UploadController::new(Box::new(client));
    let cancel = controller.cancel_token();
    ctrlc::set_handler(move || cancel.cancel()).context("failed to install Ctrl-C handler")?;

    let mut page = Page::default();
    controller.select_files(vec![file], &mut page);
    if let Some(notice) = first_error(&mut page) {
        bail!("{notice} ({})", path.display());
    }

    if format == OutputFormat::Table {
        if let Some(kind) = controller.selected().and_then(SelectedFile::kind) {
            println!("{}", kind.loading_text().dimmed());
        }
    }

    let outcome = match controller.analyze(&mut page) {
        Ok(outcome) => outcome,
        Err(e) => {
            let message = first_error(&mut page).unwrap_or_else(|| e.to_string());
            bail!(message);
        }
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outcome)?),
        OutputFormat::Csv => print_rows_csv(&page),
        OutputFormat::Table => print_results_table(&page, path),
    }

    if let Some(dest) = save {
        save_annotated(&outcome, dest)?;
        if format == OutputFormat::Table {
            println!("{} Annotated image written to {}", "✓".green().bold(), dest.display());
        }
    }

    Ok(())
}

fn first_error(page: &mut Page) -> Option<String> {
    page.take_notices()
        .into_iter()
        .find(|n| n.level == NoticeLevel::Error)
        .map(|n| n.message)
}

fn print_results_table(page: &Page, path: &Path) {
    let results = &page.results;
    println!("{}", "cellscope Detection Results".bold().cyan());
    println!("{}", "=".repeat(60));
    println!("  {} {}", "File:".bold(), path.display());
    println!("  {} {}", format!("{}:", results.count_label).bold(), results.count);
    println!();

    println!("  {:<6} {:<26} {:>11}  BBox", "ID", "Class", "Confidence");
    println!("  {}", "-".repeat(58));
    for (i, row) in results.rows.iter().enumerate() {
        let line = match row {
            DetectionRow::Detection {
                id,
                class,
                confidence,
                bbox,
            } => format!("  {:<6} {:<26} {:>11}  {}", id, truncate(class, 26), confidence, bbox),
            DetectionRow::Info { message } => format!("  {}", message.yellow()),
        };
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
}

fn print_rows_csv(page: &Page) {
    println!("id,class,confidence,bbox");
    for row in &page.results.rows {
        if let DetectionRow::Detection {
            id,
            class,
            confidence,
            bbox,
        } = row
        {
            println!("{id},{class},{confidence},\"{bbox}\"");
        }
    }
}

fn save_annotated(outcome: &AnalyzeOutcome, dest: &Path) -> Result<()> {
    let AnalyzeOutcome::Image { annotated, .. } = outcome else {
        bail!("--save only applies to image analyses");
    };
    let Some((_, bytes)) = decode_data_url(annotated) else {
        bail!("annotated image is not embedded in the response; it is available at {annotated}");
    };
    fs::write(dest, bytes).with_context(|| format!("failed to write {}", dest.display()))
}

// ---------------------------------------------------------------------------
// cellscope health
// ---------------------------------------------------------------------------

/// Check the detection service, config files, and metrics source.
pub fn run_health(config: &CellscopeConfig) -> Result<()> {
    println!("{}", "cellscope Health Check".bold().cyan());
    println!("{}", "=".repeat(50));

    let report = health::report(config);

    let global = config::global_config_file()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "~/.cellscope/config.toml".to_string());
    print_health_item(
        "Global config",
        report.global_config_exists,
        &if report.global_config_exists {
            global
        } else {
            format!("{global} (not found, using defaults)")
        },
    );
    print_health_item(
        "Project config",
        report.project_config_exists,
        if report.project_config_exists {
            ".cellscope.toml"
        } else {
            ".cellscope.toml (not found)"
        },
    );

    let service = &report.service;
    let detail = match (service.status, &service.detail) {
        (Some(status), _) => {
            format!("HTTP {status} from {} in {}ms", service.url, service.latency_ms)
        }
        (None, Some(err)) => format!("{}: {err}", service.url),
        (None, None) => service.url.clone(),
    };
    print_health_item("Detection service", service.reachable, &detail);
    print_health_item("Metrics source", true, &report.metrics_source);
    print_health_item("Analyze endpoint", true, &report.analyze_url);

    Ok(())
}

fn print_health_item(name: &str, ok: bool, detail: &str) {
    let status = if ok {
        "✓".green().bold()
    } else {
        "✗".red().bold()
    };
    println!("  {} {:<20} {}", status, name, detail.dimmed());
}

// ---------------------------------------------------------------------------
// cellscope config show | init | set | reset
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show() -> Result<()> {
    let toml_str = config::show_effective_config()?;
    println!("{}", "Effective cellscope Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.cellscope/config.toml", global_exists);
    print_source(".cellscope.toml", project_exists);
    println!("  {} {}", "·".dimmed(), "CELLSCOPE_* environment variables".dimmed());

    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.cellscope/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("{} Config written to {}", "✓".green().bold(), path.display());
    println!("  {}", "Edit the file to point cellscope at your service.".dimmed());
    Ok(())
}

/// Set a single configuration value in the global config file.
pub fn run_config_set(key: &str, value: &str) -> Result<()> {
    config::set_config_value(key, value)?;
    println!("{} Set {} = {}", "✓".green().bold(), key.bold(), value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn run_config_reset() -> Result<()> {
    let path = config::reset_config()?;
    println!("{} Config reset to defaults at {}", "✓".green().bold(), path.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Truncate a string to `max_len` characters, appending "…" if truncated.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 5), "hell…");
        assert_eq!(truncate("ab", 2), "ab");
        assert_eq!(truncate("célula", 3), "cé…");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Csv);
        assert_eq!(
            OutputFormat::from_str_opt(Some("unknown")),
            OutputFormat::Table
        );
    }

    #[test]
    fn save_writes_decoded_image() {
        let dir = std::env::temp_dir().join(format!("cellscope-save-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let dest = dir.join("annotated.jpg");
        let outcome = AnalyzeOutcome::Image {
            annotated: "data:image/jpeg;base64,/9j/".into(),
            detections: vec![],
            total: 0,
        };
        save_annotated(&outcome, &dest).unwrap();
        assert_eq!(fs::read(&dest).unwrap(), vec![0xff, 0xd8, 0xff]);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn save_rejects_videos_and_remote_images() {
        let dest = Path::new("unused.jpg");
        let video = AnalyzeOutcome::Video {
            url: "http://svc/v.mp4".into(),
            frames_processed: 3,
        };
        assert!(save_annotated(&video, dest).is_err());
        let remote = AnalyzeOutcome::Image {
            annotated: "http://svc/r.jpg".into(),
            detections: vec![],
            total: 0,
        };
        assert!(save_annotated(&remote, dest).is_err());
    }
}
