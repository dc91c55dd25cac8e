//! The styling injector.
//!
//! A run is a straight line:
//!
//! ```text
//! load → detect & confirm → remove → base stylesheet → feature fragments
//!      → markup batch → script batch → write → report
//! ```
//!
//! [`apply`] is the in-memory part (remove through script batch) and does no
//! I/O. [`run`] wraps it with reading the input, the confirmation gate,
//! resolving the stylesheet, and the single write at the end. Nothing is
//! written when any step before the write fails or the prompt is declined.

use crate::anchor::{self, Anchor, MissingAnchor, Tier};
use crate::config::{ConfigError, StylerConfig};
use crate::confirm::{Answer, Confirm};
use crate::document::{Document, Element};
use crate::fragments::{self, Family, Feature, FragmentCatalog, StylesheetMode};
use crate::remove::{self, Removal};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("stylesheet not found for inline embedding: {}", .0.display())]
    MissingStylesheet(PathBuf),
    #[error(transparent)]
    MissingAnchor(#[from] MissingAnchor),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The base stylesheet, ready to splice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseStylesheet {
    Inline { css: String },
    External { href: String },
}

impl BaseStylesheet {
    fn fragment(&self) -> String {
        match self {
            BaseStylesheet::Inline { css } => fragments::inline_style(css),
            BaseStylesheet::External { href } => fragments::stylesheet_link(href),
        }
    }
}

/// What [`apply`] should put into a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub stylesheet: BaseStylesheet,
    /// Requested optional features, in any order.
    pub features: Vec<Feature>,
    pub preserve_markers: Vec<String>,
}

impl Plan {
    /// Requested optional features in collection order.
    pub fn optional_features(&self) -> Vec<Feature> {
        Feature::OPTIONAL
            .into_iter()
            .filter(|f| self.features.contains(f))
            .collect()
    }
}

/// What [`apply`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Applied {
    pub removed: Removal,
    /// Optional features added, in collection order.
    pub features: Vec<Feature>,
    /// Anchors used, with the tier each resolved through.
    pub placements: Vec<(Anchor, Tier)>,
    /// Body content was wrapped in the family's layout container.
    pub wrapped: bool,
}

/// Remove earlier injections from `doc` and insert the fragments `plan` asks for.
pub fn apply(
    doc: &mut Document,
    plan: &Plan,
    catalog: &FragmentCatalog,
) -> Result<Applied, MissingAnchor> {
    anchor::require_html(doc, Anchor::HeadEnd)?;

    let mut applied = Applied {
        removed: remove::remove(doc, catalog.removal(), &plan.preserve_markers),
        features: plan.optional_features(),
        ..Applied::default()
    };

    if let Some((present, markup)) = catalog.head_prelude() {
        if !doc.any(present) {
            place(doc, Anchor::HeadStart, &[markup], &mut applied)?;
        }
    }

    let with_toc = applied.features.contains(&Feature::TocSidebar);
    let has_container = doc.any(|el| el.has_class("container"));
    if let Some(class) = catalog.container_class(with_toc).filter(|_| !has_container) {
        let point = anchor::resolve(doc, Anchor::BodyStart)?;
        let end = doc.element(&point.parent).map_or(0, Element::end_index);
        let wrapper = Element::new("div", &[("class", class)]);
        applied.wrapped = doc.wrap_children(&point.parent, 0..end, wrapper).is_some();
        debug!(class, "wrapped body content");
    }

    let mut styles: Vec<String> = catalog.base().style.iter().cloned().collect();
    styles.push(plan.stylesheet.fragment());
    let mut markup = Vec::new();
    let mut scripts = Vec::new();
    for set in applied.features.iter().filter_map(|&f| catalog.feature(f)) {
        styles.extend(set.style.iter().cloned());
        markup.extend(set.markup.iter().cloned());
        scripts.extend(set.script.iter().cloned());
    }
    // The framework bundle loads after the feature scripts.
    scripts.extend(catalog.base().script.iter().cloned());

    place(doc, Anchor::HeadEnd, &styles, &mut applied)?;
    place(doc, Anchor::BodyStart, &markup, &mut applied)?;
    place(doc, Anchor::BodyEnd, &scripts, &mut applied)?;
    Ok(applied)
}

/// Splice `fragments` at `anchor` as one batch.
fn place(
    doc: &mut Document,
    anchor: Anchor,
    fragments: &[String],
    applied: &mut Applied,
) -> Result<(), MissingAnchor> {
    if fragments.is_empty() {
        return Ok(());
    }
    let nodes = Document::parse_fragment(&fragments.concat());
    let point = anchor::resolve(doc, anchor)?;
    doc.insert_blocks(&point.parent, point.index, nodes);
    applied.placements.push((anchor, point.tier));
    Ok(())
}

/// A styling run against one file.
#[derive(Debug, Clone)]
pub struct Request {
    pub input: PathBuf,
    /// Defaults to overwriting `input`.
    pub output: Option<PathBuf>,
    pub mode: StylesheetMode,
    pub features: Vec<Feature>,
    /// Skip the overwrite prompt.
    pub force: bool,
    pub config: StylerConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum StylesheetReport {
    Inline { source: PathBuf },
    External { href: String },
}

impl StylesheetReport {
    pub fn feature(&self) -> Feature {
        match self {
            StylesheetReport::Inline { .. } => Feature::InlineStyle,
            StylesheetReport::External { .. } => Feature::ExternalStylesheet,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub input: PathBuf,
    pub output: PathBuf,
    pub family: Family,
    pub stylesheet: StylesheetReport,
    pub features: Vec<Feature>,
    pub removed: Removal,
    pub wrapped_container: bool,
    /// Expected sibling files absent from the output directory.
    pub missing_siblings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Written(Report),
    /// The overwrite prompt was declined; nothing was written.
    Aborted,
}

/// Style `request.input` and write the result.
pub fn run(request: &Request, confirm: &mut dyn Confirm) -> Result<Outcome, StyleError> {
    let input = &request.input;
    let config = &request.config;
    if !input.is_file() {
        return Err(StyleError::MissingInput(input.clone()));
    }
    let mut doc = Document::parse(&fs::read_to_string(input)?);
    anchor::require_html(&doc, Anchor::HeadEnd)?;

    let document_dir = parent_dir(input);
    let (stylesheet, stylesheet_report) = base_stylesheet(request, document_dir)?;

    let catalog = FragmentCatalog::new(config.family, &config.bootstrap);
    let existing = remove::detect(&doc, catalog.removal(), &config.preserve_markers);
    if !existing.is_empty() && !request.force {
        let prompt = format!(
            "{} already has styling ({existing}). Replace it? [y/N] ",
            input.display()
        );
        let answer = confirm.confirm(&prompt);
        if answer == Answer::Unavailable {
            warn!(policy = ?config.on_no_tty, "overwrite prompt could not be answered");
        }
        if !config.on_no_tty.allows(answer) {
            info!(input = %input.display(), "left untouched");
            return Ok(Outcome::Aborted);
        }
    }

    let plan = Plan {
        stylesheet,
        features: request.features.clone(),
        preserve_markers: config.preserve_markers.clone(),
    };
    let applied = apply(&mut doc, &plan, &catalog)?;
    for (anchor, tier) in &applied.placements {
        if *tier != Tier::Primary {
            info!(%anchor, ?tier, "used non-primary insertion point");
        }
    }

    let output = request.output.clone().unwrap_or_else(|| input.clone());
    fs::write(&output, doc.to_string())?;
    info!(output = %output.display(), "wrote styled document");

    Ok(Outcome::Written(Report {
        input: input.clone(),
        missing_siblings: missing_siblings(&output, &config.expected_siblings),
        output,
        family: config.family,
        stylesheet: stylesheet_report,
        features: applied.features,
        removed: applied.removed,
        wrapped_container: applied.wrapped,
    }))
}

/// Resolve the base stylesheet before anything is mutated.
fn base_stylesheet(
    request: &Request,
    document_dir: &Path,
) -> Result<(BaseStylesheet, StylesheetReport), StyleError> {
    let configured = Path::new(request.config.stylesheet());
    let on_disk = locate(configured, document_dir);
    match request.mode {
        StylesheetMode::Inline => {
            let source =
                on_disk.ok_or_else(|| StyleError::MissingStylesheet(configured.to_path_buf()))?;
            let css = fs::read_to_string(&source)?;
            debug!(source = %source.display(), bytes = css.len(), "embedding stylesheet");
            Ok((
                BaseStylesheet::Inline { css },
                StylesheetReport::Inline { source },
            ))
        }
        StylesheetMode::External => {
            let href =
                fragments::stylesheet_href(configured, on_disk.as_deref(), request.config.cache_bust);
            Ok((
                BaseStylesheet::External { href: href.clone() },
                StylesheetReport::External { href },
            ))
        }
    }
}

/// Find `path` as given, then relative to the document's directory.
fn locate(path: &Path, document_dir: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let beside = document_dir.join(path);
    beside.is_file().then_some(beside)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn missing_siblings(output: &Path, expected: &[String]) -> Vec<String> {
    let dir = parent_dir(output);
    expected
        .iter()
        .filter(|name| !dir.join(name.as_str()).exists())
        .inspect(|name| warn!(file = %name, dir = %dir.display(), "expected sibling file is missing"))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapConfig;
    use crate::test_helpers::*;
    use std::fs;
    use tempfile::TempDir;

    fn plan(features: &[Feature]) -> Plan {
        Plan {
            stylesheet: BaseStylesheet::External {
                href: "styles.css".into(),
            },
            features: features.to_vec(),
            preserve_markers: vec!["Diagram colors".into()],
        }
    }

    fn catalog(family: Family) -> FragmentCatalog {
        FragmentCatalog::new(family, &BootstrapConfig::default())
    }

    fn styled(input: &str, plan: &Plan, family: Family) -> String {
        let mut doc = Document::parse(input);
        apply(&mut doc, plan, &catalog(family)).unwrap();
        doc.to_string()
    }

    // =========================================================================
    // apply
    // =========================================================================

    #[test]
    fn blank_page_gets_link_toggle_and_script() {
        let out = styled(BLANK_PAGE, &plan(&[Feature::ThemeToggle]), Family::Plain);

        assert_eq!(count(&out, r#"<link rel="stylesheet" href="styles.css">"#), 1);
        let head_end = out.find("</head>").unwrap();
        assert!(out.find("<link").unwrap() < head_end);

        assert!(out.contains("<body>\n    <button class=\"theme-toggle\""));
        assert_eq!(count(&out, "<button class=\"theme-toggle\""), 1);

        let last_script = out.rfind("<script>").unwrap();
        assert!(out[last_script..].contains("toggleTheme"));
        assert!(out.ends_with("</script></body></html>"));
    }

    #[test]
    fn second_run_is_a_fixpoint() {
        for family in [Family::Plain, Family::Bootstrap] {
            let plan = plan(&[Feature::ThemeToggle, Feature::TocSidebar]);
            let once = styled(COMPILED_PAGE, &plan, family);
            let twice = styled(&once, &plan, family);
            assert_eq!(once, twice, "{family:?} output changed on second run");
        }
    }

    #[test]
    fn fixpoint_holds_for_synthesized_anchors() {
        let plan = plan(&[Feature::ThemeToggle]);
        let once = styled("<html><p>x</p></html>", &plan, Family::Plain);
        assert_eq!(styled(&once, &plan, Family::Plain), once);
    }

    #[test]
    fn markup_order_ignores_request_order() {
        let a = styled(
            COMPILED_PAGE,
            &plan(&[Feature::TocSidebar, Feature::ThemeToggle]),
            Family::Plain,
        );
        let b = styled(
            COMPILED_PAGE,
            &plan(&[Feature::ThemeToggle, Feature::TocSidebar]),
            Family::Plain,
        );
        assert_eq!(a, b);
        assert!(a.find("class=\"theme-toggle\"").unwrap() < a.find("id=\"toc-sidebar\"").unwrap());
    }

    #[test]
    fn synthesizes_head_and_body() {
        let out = styled(
            "<html><p>x</p></html>",
            &plan(&[Feature::ThemeToggle]),
            Family::Plain,
        );
        let head = out.find("<head>").unwrap();
        let head_end = out.find("</head>").unwrap();
        let body = out.find("<body>").unwrap();
        let body_end = out.find("</body>").unwrap();
        let link = out.find("<link rel=\"stylesheet\"").unwrap();
        let button = out.find("<button").unwrap();
        let content = out.find("<p>x</p>").unwrap();

        assert!(head < link && link < head_end);
        assert!(head_end < body && body < button && button < content);
        assert!(content < out.rfind("<script>").unwrap());
        assert!(body_end < out.find("</html>").unwrap());
    }

    #[test]
    fn placements_report_tiers() {
        let mut doc = Document::parse("<html><head><body><p>x</p>");
        let applied = apply(
            &mut doc,
            &plan(&[Feature::ThemeToggle]),
            &catalog(Family::Plain),
        )
        .unwrap();
        assert_eq!(
            applied.placements,
            vec![
                (Anchor::HeadEnd, Tier::Fallback),
                (Anchor::BodyStart, Tier::Primary),
                (Anchor::BodyEnd, Tier::Fallback),
            ]
        );
    }

    #[test]
    fn missing_html_fails_without_changes() {
        let mut doc = Document::parse("<p>fragment</p><style>p{}</style>");
        let err = apply(&mut doc, &plan(&[]), &catalog(Family::Plain)).unwrap_err();
        assert_eq!(err, MissingAnchor(Anchor::HeadEnd));
        assert_eq!(doc.to_string(), "<p>fragment</p><style>p{}</style>");
    }

    #[test]
    fn carve_out_is_kept_and_other_styles_replaced() {
        let out = styled(COMPILED_PAGE, &plan(&[]), Family::Plain);
        assert!(out.contains(DIAGRAM_STYLE));
        assert!(!out.contains("font-family: serif"));
        assert!(!out.contains("old.css"));
        assert_eq!(count(&out, "<style>"), 1);
    }

    #[test]
    fn inline_mode_embeds_css() {
        let plan = Plan {
            stylesheet: BaseStylesheet::Inline {
                css: "body { margin: 0; }".into(),
            },
            ..plan(&[])
        };
        let out = styled(BLANK_PAGE, &plan, Family::Plain);
        assert!(out.contains("<style>\nbody { margin: 0; }\n    </style></head>"));
        assert!(!out.contains("<link"));
    }

    #[test]
    fn bootstrap_wraps_content_and_orders_scripts() {
        let out = styled(
            COMPILED_PAGE,
            &plan(&[Feature::ThemeToggle, Feature::TocSidebar]),
            Family::Bootstrap,
        );
        assert_eq!(count(&out, "name=\"viewport\""), 1);
        assert_eq!(count(&out, "<div class=\"container py-4 ms-auto\">"), 1);
        // Injected markup sits outside the container, content inside it
        let container = out.find("<div class=\"container").unwrap();
        assert!(out.find("id=\"tocOffcanvas\"").unwrap() < container);
        assert!(container < out.find("<h2>Intro</h2>").unwrap());

        let bundle = out.find("bootstrap.bundle.min.js").unwrap();
        assert!(out.find("function toggleTheme").unwrap() < bundle);
        assert!(out.find("buildTOC").unwrap() < bundle);
        assert!(out.find("bootstrap.min.css").unwrap() < out.find("href=\"styles.css\"").unwrap());
    }

    #[test]
    fn bootstrap_respects_existing_container() {
        let input = "<html><head></head><body><div class=\"container\">x</div></body></html>";
        let mut doc = Document::parse(input);
        let applied = apply(&mut doc, &plan(&[]), &catalog(Family::Bootstrap)).unwrap();
        assert!(!applied.wrapped);
        assert_eq!(count(&doc.to_string(), "class=\"container"), 1);
    }

    #[test]
    fn switching_family_clears_previous_markup() {
        let features = [Feature::ThemeToggle, Feature::TocSidebar];
        let bootstrap = styled(COMPILED_PAGE, &plan(&features), Family::Bootstrap);
        let plain = styled(&bootstrap, &plan(&features), Family::Plain);
        assert!(!plain.contains("tocOffcanvas"));
        assert!(!plain.contains("bootstrap.bundle.min.js"));
        assert_eq!(count(&plain, "class=\"theme-toggle\""), 1);
    }

    // =========================================================================
    // run
    // =========================================================================

    #[test]
    fn run_overwrites_input_by_default() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        let mut req = request(&input);
        req.features = vec![Feature::ThemeToggle];

        let outcome = run(&req, &mut ScriptedConfirm::never()).unwrap();
        let Outcome::Written(report) = outcome else {
            panic!("expected a write, got {outcome:?}");
        };
        assert_eq!(report.output, input);
        assert_eq!(report.features, vec![Feature::ThemeToggle]);
        assert_eq!(
            report.stylesheet,
            StylesheetReport::External {
                href: "styles.css".into()
            }
        );
        assert!(fs::read_to_string(&input).unwrap().contains("toggleTheme"));
    }

    #[test]
    fn run_writes_distinct_output() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        let output = tmp.path().join("styled.html");
        let mut req = request(&input);
        req.output = Some(output.clone());

        run(&req, &mut ScriptedConfirm::never()).unwrap();
        assert_eq!(fs::read_to_string(&input).unwrap(), BLANK_PAGE);
        assert!(fs::read_to_string(&output).unwrap().contains("styles.css"));
    }

    #[test]
    fn missing_input_is_reported() {
        let tmp = TempDir::new().unwrap();
        let req = request(&tmp.path().join("absent.html"));
        let err = run(&req, &mut ScriptedConfirm::never()).unwrap_err();
        assert!(matches!(err, StyleError::MissingInput(_)));
    }

    #[test]
    fn missing_html_element_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "frag.html", "<p>fragment</p>");
        let err = run(&request(&input), &mut ScriptedConfirm::never()).unwrap_err();
        assert!(matches!(err, StyleError::MissingAnchor(_)));
        assert_eq!(fs::read_to_string(&input).unwrap(), "<p>fragment</p>");
    }

    #[test]
    fn inline_needs_the_stylesheet() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        let mut req = request(&input);
        req.mode = StylesheetMode::Inline;
        req.config.stylesheet = Some("no-such-file.css".into());

        let err = run(&req, &mut ScriptedConfirm::never()).unwrap_err();
        assert!(matches!(err, StyleError::MissingStylesheet(_)));
        assert_eq!(fs::read_to_string(&input).unwrap(), BLANK_PAGE);
    }

    #[test]
    fn inline_finds_stylesheet_beside_document() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        fs::write(tmp.path().join("doc-styler-test.css"), "h1 { color: teal; }").unwrap();
        let mut req = request(&input);
        req.mode = StylesheetMode::Inline;
        req.config.stylesheet = Some("doc-styler-test.css".into());

        let Outcome::Written(report) = run(&req, &mut ScriptedConfirm::never()).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(
            report.stylesheet,
            StylesheetReport::Inline {
                source: tmp.path().join("doc-styler-test.css")
            }
        );
        assert!(fs::read_to_string(&input).unwrap().contains("h1 { color: teal; }"));
    }

    #[test]
    fn declined_prompt_leaves_file_untouched() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", COMPILED_PAGE);
        let mut confirm = ScriptedConfirm::answering(&[Answer::No]);

        let outcome = run(&request(&input), &mut confirm).unwrap();
        assert_eq!(outcome, Outcome::Aborted);
        assert_eq!(fs::read_to_string(&input).unwrap(), COMPILED_PAGE);
        assert_eq!(confirm.prompts.len(), 1);
        assert!(confirm.prompts[0].contains("already has styling"));
    }

    #[test]
    fn unanswerable_prompt_follows_policy() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", COMPILED_PAGE);
        let mut req = request(&input);

        let outcome = run(&req, &mut ScriptedConfirm::answering(&[Answer::Unavailable])).unwrap();
        assert_eq!(outcome, Outcome::Aborted);
        assert_eq!(fs::read_to_string(&input).unwrap(), COMPILED_PAGE);

        req.config.on_no_tty = crate::confirm::NoTtyPolicy::Proceed;
        let outcome = run(&req, &mut ScriptedConfirm::answering(&[Answer::Unavailable])).unwrap();
        assert!(matches!(outcome, Outcome::Written(_)));
    }

    #[test]
    fn force_skips_the_prompt() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", COMPILED_PAGE);
        let mut req = request(&input);
        req.force = true;

        let Outcome::Written(report) = run(&req, &mut ScriptedConfirm::never()).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(report.removed.links, 1);
        assert_eq!(report.removed.styles, 1);
        assert_eq!(report.removed.preserved, 1);
    }

    #[test]
    fn unstyled_document_is_not_prompted() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        let mut confirm = ScriptedConfirm::never();
        run(&request(&input), &mut confirm).unwrap();
        assert!(confirm.prompts.is_empty());
    }

    #[test]
    fn missing_siblings_are_reported() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        fs::write(tmp.path().join("present.css"), "").unwrap();
        let mut req = request(&input);
        req.config.expected_siblings = vec!["present.css".into(), "colors.css".into()];

        let Outcome::Written(report) = run(&req, &mut ScriptedConfirm::never()).unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(report.missing_siblings, vec!["colors.css".to_string()]);
    }

    #[test]
    fn cache_bust_appends_token() {
        let tmp = TempDir::new().unwrap();
        let input = write_page(tmp.path(), "doc.html", BLANK_PAGE);
        let mut req = request(&input);
        req.config.cache_bust = true;

        run(&req, &mut ScriptedConfirm::never()).unwrap();
        let out = fs::read_to_string(&input).unwrap();
        assert!(out.contains("href=\"styles.css?v="));
    }
}
