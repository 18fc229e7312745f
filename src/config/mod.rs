//! Configuration system for cellscope.
//!
//! Provides a layered configuration hierarchy:
//!
//! 1. **Built-in defaults**: hardcoded in [`schema::CellscopeConfig::default()`]
//! 2. **User global config**: `~/.cellscope/config.toml`
//! 3. **Project local config**: `.cellscope.toml` in the current working directory
//! 4. **Environment variables**: `CELLSCOPE_*` overrides (highest precedence)
//!
//! # Usage
//!
//! ```rust,ignore
//! use cellscope::config;
//!
//! let cfg = config::load();
//! let url = cfg.service.metrics_url();
//! ```

pub mod schema;

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub use schema::CellscopeConfig;

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Load the fully resolved cellscope configuration.
///
/// Merges all layers in order: defaults → global TOML → project TOML → env
/// vars.
pub fn load() -> CellscopeConfig {
    let mut config = CellscopeConfig::default();

    if let Some(global) = load_toml_file(global_config_path()) {
        config = global;
    }

    if let Some(project) = load_toml_file(project_config_path()) {
        config = project;
    }

    apply_overrides(&mut config, |key| std::env::var(key).ok());

    config
}

/// Load a TOML config file from the given path (if it exists).
///
/// Malformed files are logged and ignored so a bad edit never keeps the
/// dashboard from starting.
fn load_toml_file(path: Option<PathBuf>) -> Option<CellscopeConfig> {
    let path = path?;
    let content = fs::read_to_string(&path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring malformed config file");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// File paths
// ---------------------------------------------------------------------------

fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".cellscope").join("config.toml"))
}

fn project_config_path() -> Option<PathBuf> {
    std::env::current_dir()
        .ok()
        .map(|cwd| cwd.join(".cellscope.toml"))
}

/// Return the path to the global config file for display/init purposes.
pub fn global_config_file() -> Option<PathBuf> {
    global_config_path()
}

/// Return the path to the project config file for display purposes.
pub fn project_config_file() -> Option<PathBuf> {
    project_config_path()
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply `CELLSCOPE_*` overrides read through `lookup`.
///
/// Supported variables:
/// - `CELLSCOPE_BASE_URL`: detection service base URL
/// - `CELLSCOPE_TIMEOUT_MS`: per-request deadline
/// - `CELLSCOPE_METRICS_FILE`: read metrics from a local JSON file
/// - `CELLSCOPE_WEB_ADDR`: dashboard listen address
/// - `CELLSCOPE_OPEN_BROWSER`: `1`/`true`/`yes`/`on`
/// - `CELLSCOPE_LOG`: log level
pub fn apply_overrides(config: &mut CellscopeConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(val) = lookup("CELLSCOPE_BASE_URL")
        && !val.is_empty()
    {
        config.service.base_url = val;
    }
    if let Some(val) = lookup("CELLSCOPE_TIMEOUT_MS")
        && let Ok(ms) = val.parse::<u64>()
    {
        config.service.timeout_ms = ms;
    }
    if let Some(val) = lookup("CELLSCOPE_METRICS_FILE")
        && !val.is_empty()
    {
        config.service.metrics_file = Some(val);
    }
    if let Some(val) = lookup("CELLSCOPE_WEB_ADDR")
        && !val.is_empty()
    {
        config.web.addr = val;
    }
    if let Some(val) = lookup("CELLSCOPE_OPEN_BROWSER") {
        config.web.open_browser = is_truthy(&val);
    }
    if let Some(val) = lookup("CELLSCOPE_LOG")
        && !val.is_empty()
    {
        config.logging.level = val;
    }
}

fn is_truthy(val: &str) -> bool {
    matches!(
        val.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

// ---------------------------------------------------------------------------
// Config init / set / reset
// ---------------------------------------------------------------------------

/// Write the default annotated config to `~/.cellscope/config.toml`.
///
/// Returns an error if the file already exists and `force` is not set.
pub fn init_config(force: bool) -> Result<PathBuf> {
    let path = global_config_path().context("could not determine home directory")?;

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}. Use --force to overwrite.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create ~/.cellscope/ directory")?;
    }

    fs::write(&path, CellscopeConfig::default_toml()).context("failed to write config file")?;

    Ok(path)
}

/// Set a single dotted config key (e.g. `service.timeout_ms`) in the global
/// config file, creating the file from defaults when it does not exist.
pub fn set_config_value(key: &str, value: &str) -> Result<()> {
    let path = global_config_path().context("could not determine home directory")?;

    let content = if path.exists() {
        fs::read_to_string(&path).context("failed to read config file")?
    } else {
        toml::to_string_pretty(&CellscopeConfig::default())
            .context("failed to serialize default config")?
    };

    let mut root: toml::Value =
        toml::from_str(&content).context("failed to parse config as TOML value")?;
    set_toml_value(&mut root, key, value)?;

    // Reject edits that would leave an unloadable file behind.
    let updated = toml::to_string_pretty(&root).context("failed to serialize updated config")?;
    toml::from_str::<CellscopeConfig>(&updated)
        .with_context(|| format!("value '{value}' is not valid for '{key}'"))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("failed to create config directory")?;
    }
    fs::write(&path, updated).context("failed to write config file")?;

    Ok(())
}

/// Set a value in a TOML value tree using a dotted key path, keeping the
/// existing value's type.
fn set_toml_value(root: &mut toml::Value, key: &str, raw_value: &str) -> Result<()> {
    let parts: Vec<&str> = key.split('.').filter(|p| !p.is_empty()).collect();
    let Some((leaf, sections)) = parts.split_last() else {
        anyhow::bail!("empty config key");
    };

    let mut current = root;
    for &part in sections {
        current = current
            .get_mut(part)
            .with_context(|| format!("config key not found: section '{part}' in '{key}'"))?;
    }

    let table = current.as_table_mut().with_context(|| {
        format!(
            "expected table at '{}'",
            key.rsplit_once('.').map(|(s, _)| s).unwrap_or("")
        )
    })?;

    let new_value = match table.get(*leaf) {
        Some(toml::Value::Boolean(_)) => toml::Value::Boolean(is_truthy(raw_value)),
        Some(toml::Value::Integer(_)) => {
            let n: i64 = raw_value
                .parse()
                .with_context(|| format!("expected integer for '{key}', got '{raw_value}'"))?;
            toml::Value::Integer(n)
        }
        Some(toml::Value::Float(_)) => {
            let f: f64 = raw_value
                .parse()
                .with_context(|| format!("expected float for '{key}', got '{raw_value}'"))?;
            toml::Value::Float(f)
        }
        _ => toml::Value::String(raw_value.to_string()),
    };

    table.insert((*leaf).to_string(), new_value);
    Ok(())
}

/// Reset the global config to defaults (overwrite the file).
pub fn reset_config() -> Result<PathBuf> {
    init_config(true)
}

/// Show the effective (fully resolved) config as TOML.
pub fn show_effective_config() -> Result<String> {
    let config = load();
    toml::to_string_pretty(&config).context("failed to serialize effective config")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
