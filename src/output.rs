//! CLI output formatting for a styling run.
//!
//! # Output Format
//!
//! ```text
//! Styled guide.html → guide.html
//!     Removed: 1 stylesheet link, 2 style blocks
//!     Kept: 1 diagram style block
//!     Added: external stylesheet (styles.css)
//!     Added: theme toggle
//!     Added: TOC sidebar
//!     Wrapped body content in a layout container
//!     Warning: colors.css not found next to guide.html
//!
//! Open guide.html in your browser to see the result.
//! Theme button (top right) cycles light ☀️ / dark 🌙 / auto 🌓.
//! Contents sidebar on the left lists every section heading.
//! ```
//!
//! # Architecture
//!
//! [`format_report`] returns `Vec<String>` for testability and
//! [`print_report`] writes it to stdout. [`report_json`] and [`aborted_json`]
//! are the machine readable variants behind `--json`. Format functions are pure: no I/O, no
//! side effects.

use crate::fragments::{Family, Feature};
use crate::inject::{Report, StylesheetReport};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

fn stylesheet_line(stylesheet: &StylesheetReport) -> String {
    let target = match stylesheet {
        StylesheetReport::Inline { source } => source.display().to_string(),
        StylesheetReport::External { href } => href.clone(),
    };
    format!("{} ({target})", stylesheet.feature().label())
}

/// Usage hint printed once per enabled feature. Icons match the family's
/// toggle script.
fn hint(feature: Feature, family: Family) -> Option<&'static str> {
    match (feature, family) {
        (Feature::ThemeToggle, Family::Plain) => {
            Some("Theme button (top right) cycles light ☀️ / dark 🌙 / auto 🌓.")
        }
        (Feature::ThemeToggle, Family::Bootstrap) => {
            Some("Theme button (top right) cycles light 🌕 / dark 🌑 / auto 🌓.")
        }
        (Feature::TocSidebar, _) => {
            Some("Contents sidebar on the left lists every section heading.")
        }
        (Feature::InlineStyle | Feature::ExternalStylesheet, _) => None,
    }
}

pub fn format_report(report: &Report) -> Vec<String> {
    let mut lines = vec![format!(
        "Styled {} → {}",
        report.input.display(),
        report.output.display()
    )];

    if !report.removed.is_empty() {
        lines.push(format!("{}Removed: {}", indent(1), report.removed));
    }
    if report.removed.preserved > 0 {
        lines.push(format!(
            "{}Kept: {}",
            indent(1),
            plural(report.removed.preserved, "diagram style block")
        ));
    }
    lines.push(format!(
        "{}Added: {}",
        indent(1),
        stylesheet_line(&report.stylesheet)
    ));
    for feature in &report.features {
        lines.push(format!("{}Added: {}", indent(1), feature.label()));
    }
    if report.wrapped_container {
        lines.push(format!(
            "{}Wrapped body content in a layout container",
            indent(1)
        ));
    }
    let output_name = report
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| report.output.display().to_string());
    for missing in &report.missing_siblings {
        lines.push(format!(
            "{}Warning: {missing} not found next to {output_name}",
            indent(1)
        ));
    }

    lines.push(String::new());
    lines.push(format!(
        "Open {} in your browser to see the result.",
        report.output.display()
    ));
    lines.extend(
        report
            .features
            .iter()
            .filter_map(|&f| hint(f, report.family))
            .map(str::to_string),
    );
    lines
}

pub fn print_report(report: &Report) {
    for line in format_report(report) {
        println!("{}", line);
    }
}

/// Pretty-printed JSON rendering of `report`.
pub fn report_json(report: &Report) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

/// JSON printed instead of `Aborted.` when the overwrite prompt is declined.
pub fn aborted_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&serde_json::json!({ "aborted": true }))
}
