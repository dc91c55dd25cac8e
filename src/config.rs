//! Styler configuration.
//!
//! Handles loading, validating, and merging `doc-styler.toml`. Stock defaults
//! are the base layer; a config file overrides any subset of keys; command-line
//! flags override both.
//!
//! ## Config File Location
//!
//! `--config <path>` wins when given. Otherwise `doc-styler.toml` is looked up
//! next to the input document:
//!
//! ```text
//! build/
//! ├── doc-styler.toml    # Applies to every document in build/
//! ├── guide.html
//! └── styles.css
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! # stylesheet = "styles.css"        # Linked, or read for --inline. Unset: styles.css (plain), styles-bootstrap.css (bootstrap)
//! family = "plain"                   # "plain" or "bootstrap"
//! cache_bust = false                 # Append ?v=<mtime> to the stylesheet link
//! on_no_tty = "abort"                # "abort" or "proceed" when nobody can answer the prompt
//! preserve_markers = ["Diagram colors"]  # Style blocks whose first-line comment matches survive
//! expected_siblings = []             # Files that should sit next to the output (warned if absent)
//!
//! [bootstrap]
//! css_url = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
//! css_integrity = "sha384-..."
//! js_url = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js"
//! js_integrity = "sha384-..."
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::confirm::NoTtyPolicy;
use crate::fragments::Family;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name looked up next to the input document.
pub const CONFIG_FILENAME: &str = "doc-styler.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Styler configuration loaded from `doc-styler.toml`.
///
/// All fields have defaults. Config files need only specify the values they
/// want to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylerConfig {
    /// Stylesheet to link (external mode) or embed (inline mode). Unset means
    /// the family's own, see [`StylerConfig::stylesheet`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,
    /// Fragment family: standalone CSS/JS or Bootstrap components.
    pub family: Family,
    /// Append a `?v=<token>` query to the stylesheet link.
    pub cache_bust: bool,
    /// What an unanswerable overwrite prompt means.
    pub on_no_tty: NoTtyPolicy,
    /// Style blocks whose leading comment contains one of these survive removal.
    pub preserve_markers: Vec<String>,
    /// Files expected next to the output document, e.g. `colors.css`.
    pub expected_siblings: Vec<String>,
    /// CDN assets for the bootstrap family.
    pub bootstrap: BootstrapConfig,
}

impl Default for StylerConfig {
    fn default() -> Self {
        Self {
            stylesheet: None,
            family: Family::Plain,
            cache_bust: false,
            on_no_tty: NoTtyPolicy::Abort,
            preserve_markers: vec!["Diagram colors".to_string()],
            expected_siblings: Vec::new(),
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl StylerConfig {
    /// The configured stylesheet, else the family default.
    pub fn stylesheet(&self) -> &str {
        self.stylesheet
            .as_deref()
            .unwrap_or(self.family.default_stylesheet())
    }

    /// Validate config values are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stylesheet.as_deref().is_some_and(|s| s.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "stylesheet must not be empty".into(),
            ));
        }
        if self.preserve_markers.iter().any(|m| m.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "preserve_markers entries must not be empty".into(),
            ));
        }
        for (key, url) in [
            ("bootstrap.css_url", &self.bootstrap.css_url),
            ("bootstrap.js_url", &self.bootstrap.js_url),
        ] {
            if !url.starts_with("https://") {
                return Err(ConfigError::Validation(format!(
                    "{key} must be an https:// URL, got {url:?}"
                )));
            }
        }
        Ok(())
    }
}

/// CDN locations and subresource-integrity hashes for Bootstrap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    pub css_url: String,
    pub css_integrity: String,
    pub js_url: String,
    pub js_integrity: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            css_url: "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
                .to_string(),
            css_integrity:
                "sha384-T3c6CoIi6uLrA9TneNEoa7RxnatzjcDSCmG1MXxSR1GAsXEV/Dwwykc2MPK8M2HN"
                    .to_string(),
            js_url: "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js"
                .to_string(),
            js_integrity:
                "sha384-C6RzsynM9kWDrMNeT87bh95OGNyZPhcTNXj1NW7RuBCsyN/o0jlpcV8Qyq46cDfL"
                    .to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(StylerConfig::default())
        .map_err(|e| ConfigError::Validation(format!("stock defaults do not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
pub fn load_raw_config(path: &Path) -> Result<toml::Value, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<StylerConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: StylerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the effective config.
///
/// An `explicit` path must exist. Without one, `doc-styler.toml` in
/// `document_dir` is used when present, else the stock defaults. Returns the
/// config together with the file it came from.
pub fn load_config(
    document_dir: &Path,
    explicit: Option<&Path>,
) -> Result<(StylerConfig, Option<PathBuf>), ConfigError> {
    let source = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => Some(document_dir.join(CONFIG_FILENAME)).filter(|p| p.exists()),
    };
    let overlay = source.as_deref().map(load_raw_config).transpose()?;
    let config = resolve_config(overlay)?;
    debug!(source = ?source, "loaded styler config");
    Ok((config, source))
}

/// Returns a fully-commented stock `doc-styler.toml`.
///
/// Used by the `--gen-config` flag.
pub fn stock_config_toml() -> &'static str {
    r##"# doc-styler configuration
# ========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Place this file next to the HTML documents it applies to, or pass
# --config <path>. Command-line flags override values set here.
# Unknown keys will cause an error.

# Stylesheet to link (default) or embed with --inline.
# Inline mode reads it relative to the working directory first, then
# relative to the input document. When unset, the family decides:
# "styles.css" for plain, "styles-bootstrap.css" for bootstrap.
# stylesheet = "styles.css"

# Fragment family:
#   "plain"     - standalone CSS/JS theme toggle and collapsible sidebar
#   "bootstrap" - Bootstrap 5 from CDN, offcanvas sidebar, container layout
family = "plain"

# Append ?v=<stylesheet mtime> to the stylesheet link so browsers pick up
# a rebuilt stylesheet without a hard refresh.
cache_bust = false

# When the document already carries styling and --force is not given,
# doc-styler asks before replacing it. If nobody can answer (stdin closed),
# "abort" leaves the file untouched and "proceed" replaces anyway.
on_no_tty = "abort"

# <style> blocks whose first line is a comment containing one of these
# markers are kept when old styling is removed.
preserve_markers = ["Diagram colors"]

# Files that should sit next to the output document. Missing ones are
# reported as warnings, e.g. ["colors.css"].
expected_siblings = []

# ---------------------------------------------------------------------------
# Bootstrap CDN assets (family = "bootstrap")
# ---------------------------------------------------------------------------
[bootstrap]
css_url = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/css/bootstrap.min.css"
css_integrity = "sha384-T3c6CoIi6uLrA9TneNEoa7RxnatzjcDSCmG1MXxSR1GAsXEV/Dwwykc2MPK8M2HN"
js_url = "https://cdn.jsdelivr.net/npm/bootstrap@5.3.2/dist/js/bootstrap.bundle.min.js"
js_integrity = "sha384-C6RzsynM9kWDrMNeT87bh95OGNyZPhcTNXj1NW7RuBCsyN/o0jlpcV8Qyq46cDfL"
"##
}
