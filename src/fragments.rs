//! Fragment catalog.
//!
//! Every presentation feature contributes up to three fragments: a style block
//! for the end of `<head>`, markup for the start of `<body>` and a script for
//! the end of `<body>`. A [`FragmentCatalog`] holds the fragments of one
//! [`Family`] and is built once per run, then passed by reference to the
//! injector.
//!
//! Markup is rendered with Maud. CSS and JavaScript bodies live under
//! `static/` and are embedded at compile time.
//!
//! Each fragment set also carries the [`Signature`]s that identify what an
//! earlier run inserted for it, so the remover can find those nodes again
//! without regexes over raw text.

use crate::config::BootstrapConfig;
use crate::document::Element;
use maud::html;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

const PLAIN_TOGGLE_CSS: &str = include_str!("../static/plain/theme-toggle.css");
const PLAIN_TOGGLE_JS: &str = include_str!("../static/plain/theme-toggle.js");
const PLAIN_TOC_CSS: &str = include_str!("../static/plain/toc-sidebar.css");
const PLAIN_TOC_JS: &str = include_str!("../static/plain/toc-sidebar.js");
const BOOTSTRAP_TOGGLE_CSS: &str = include_str!("../static/bootstrap/theme-toggle.css");
const BOOTSTRAP_TOGGLE_JS: &str = include_str!("../static/bootstrap/theme-toggle.js");
const BOOTSTRAP_TOC_CSS: &str = include_str!("../static/bootstrap/toc-sidebar.css");
const BOOTSTRAP_TOC_JS: &str = include_str!("../static/bootstrap/toc-sidebar.js");

/// Visual family the fragments are written for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    /// Self-contained CSS and JavaScript.
    #[default]
    Plain,
    /// Bootstrap 5 components loaded from a CDN.
    Bootstrap,
}

impl Family {
    /// Stylesheet linked when the config does not name one.
    pub fn default_stylesheet(self) -> &'static str {
        match self {
            Family::Plain => "styles.css",
            Family::Bootstrap => "styles-bootstrap.css",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    InlineStyle,
    ExternalStylesheet,
    ThemeToggle,
    TocSidebar,
}

impl Feature {
    /// Optional features in the order their fragments are collected.
    pub const OPTIONAL: [Feature; 2] = [Feature::ThemeToggle, Feature::TocSidebar];

    pub fn label(self) -> &'static str {
        match self {
            Feature::InlineStyle => "inline style",
            Feature::ExternalStylesheet => "external stylesheet",
            Feature::ThemeToggle => "theme toggle",
            Feature::TocSidebar => "TOC sidebar",
        }
    }
}

/// How the base stylesheet reaches the document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StylesheetMode {
    Inline,
    #[default]
    External,
}

/// Identifies an element a previous run inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Id(String),
    Class(String),
    /// A `<script>` whose body contains this text.
    ScriptMarker(String),
    /// A `<script>` whose `src` contains this text.
    ScriptSrc(String),
}

impl Signature {
    pub fn matches(&self, el: &Element) -> bool {
        match self {
            Signature::Id(id) => el.attr("id") == Some(id.as_str()),
            Signature::Class(class) => el.has_class(class),
            Signature::ScriptMarker(marker) => {
                el.name == "script" && el.text().contains(marker.as_str())
            }
            Signature::ScriptSrc(src) => {
                el.name == "script" && el.attr("src").is_some_and(|s| s.contains(src.as_str()))
            }
        }
    }
}

/// Fragments contributed by one feature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentSet {
    /// Goes to the end of `<head>`.
    pub style: Option<String>,
    /// Goes to the end of `<body>`.
    pub script: Option<String>,
    /// Goes to the start of `<body>`.
    pub markup: Option<String>,
    pub signatures: Vec<Signature>,
}

/// Immutable fragment catalog for one family.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FragmentCatalog {
    family: Family,
    /// Family-wide assets: the framework stylesheet and script bundle.
    base: FragmentSet,
    theme_toggle: FragmentSet,
    toc_sidebar: FragmentSet,
    /// Signatures of every family.
    removal: Vec<Signature>,
}

impl FragmentCatalog {
    pub fn new(family: Family, bootstrap: &BootstrapConfig) -> Self {
        let mut catalog = Self::build(family, bootstrap);
        catalog.removal = Self::removal_signatures(bootstrap);
        catalog
    }

    fn build(family: Family, bootstrap: &BootstrapConfig) -> Self {
        match family {
            Family::Plain => Self {
                family,
                base: FragmentSet::default(),
                theme_toggle: plain_theme_toggle(),
                toc_sidebar: plain_toc_sidebar(),
                removal: Vec::new(),
            },
            Family::Bootstrap => Self {
                family,
                base: bootstrap_base(bootstrap),
                theme_toggle: bootstrap_theme_toggle(),
                toc_sidebar: bootstrap_toc_sidebar(),
                removal: Vec::new(),
            },
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn base(&self) -> &FragmentSet {
        &self.base
    }

    /// Fragments of an optional feature. Stylesheet features have none here;
    /// see [`stylesheet_link`] and [`inline_style`].
    pub fn feature(&self, feature: Feature) -> Option<&FragmentSet> {
        match feature {
            Feature::ThemeToggle => Some(&self.theme_toggle),
            Feature::TocSidebar => Some(&self.toc_sidebar),
            Feature::InlineStyle | Feature::ExternalStylesheet => None,
        }
    }

    pub fn signatures(&self) -> impl Iterator<Item = &Signature> {
        [&self.base, &self.theme_toggle, &self.toc_sidebar]
            .into_iter()
            .flat_map(|set| set.signatures.iter())
    }

    /// Everything the remover looks for, whichever family inserted it.
    pub fn removal(&self) -> &[Signature] {
        &self.removal
    }

    /// Signatures of every family, so switching families still finds the
    /// other family's leftovers.
    pub fn removal_signatures(bootstrap: &BootstrapConfig) -> Vec<Signature> {
        let mut all: Vec<Signature> = Vec::new();
        for family in [Family::Plain, Family::Bootstrap] {
            for sig in Self::build(family, bootstrap).signatures() {
                if !all.contains(sig) {
                    all.push(sig.clone());
                }
            }
        }
        all
    }

    /// Markup that must exist at the start of `<head>`, keyed by a check for
    /// whether the document already has it.
    pub fn head_prelude(&self) -> Option<(fn(&Element) -> bool, String)> {
        match self.family {
            Family::Plain => None,
            Family::Bootstrap => Some((is_viewport_meta as fn(&Element) -> bool, viewport_meta())),
        }
    }

    /// Class list of the layout container wrapped around body content, if
    /// the family uses one.
    pub fn container_class(&self, with_toc: bool) -> Option<&'static str> {
        match (self.family, with_toc) {
            (Family::Plain, _) => None,
            (Family::Bootstrap, false) => Some("container py-4"),
            (Family::Bootstrap, true) => Some("container py-4 ms-auto"),
        }
    }
}

/// `<link rel="stylesheet">` for the base stylesheet.
pub fn stylesheet_link(href: &str) -> String {
    html! { link rel="stylesheet" href=(href); }.into_string()
}

/// `<style>` block embedding the base stylesheet.
pub fn inline_style(css: &str) -> String {
    style_block(css)
}

/// Link target for `stylesheet`: its file name, plus `?v=<token>` when
/// `cache_bust` is set.
///
/// The token is the file's modification time in Unix seconds, or the current
/// time when `on_disk` does not exist.
pub fn stylesheet_href(stylesheet: &Path, on_disk: Option<&Path>, cache_bust: bool) -> String {
    let name = stylesheet
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| stylesheet.to_string_lossy().into_owned());
    if !cache_bust {
        return name;
    }
    let token = cache_bust_token(on_disk);
    tracing::debug!(token, stylesheet = %name, "cache-busting stylesheet link");
    format!("{name}?v={token}")
}

fn cache_bust_token(path: Option<&Path>) -> u64 {
    let stamp = path
        .and_then(|p| p.metadata().ok())
        .and_then(|m| m.modified().ok())
        .unwrap_or_else(SystemTime::now);
    stamp
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn style_block(css: &str) -> String {
    format!("<style>\n{}\n    </style>", css.trim_end())
}

fn script_block(js: &str) -> String {
    format!("<script>\n{}\n    </script>", js.trim_end())
}

fn is_viewport_meta(el: &Element) -> bool {
    el.name == "meta" && el.attr("name").is_some_and(|n| n.eq_ignore_ascii_case("viewport"))
}

fn viewport_meta() -> String {
    html! { meta name="viewport" content="width=device-width, initial-scale=1"; }.into_string()
}

// ============================================================================
// Plain family
// ============================================================================

fn plain_theme_toggle() -> FragmentSet {
    let markup = html! {
        button class="theme-toggle" onclick="toggleTheme()" aria-label="Toggle theme" {
            span id="theme-icon" { "🌓" }
            " Theme"
        }
    };
    FragmentSet {
        style: Some(style_block(PLAIN_TOGGLE_CSS)),
        script: Some(script_block(PLAIN_TOGGLE_JS)),
        markup: Some(markup.into_string()),
        signatures: vec![
            Signature::Class("theme-toggle".into()),
            Signature::ScriptMarker("toggleTheme".into()),
        ],
    }
}

fn plain_toc_sidebar() -> FragmentSet {
    let markup = html! {
        div id="toc-sidebar" class="toc-sidebar" {
            div class="toc-header" {
                h3 { "📚 Contents" }
                button id="toc-toggle" class="toc-collapse-btn" aria-label="Collapse sidebar" { "←" }
            }
            nav id="toc-nav" class="toc-nav" {}
        }
        button id="toc-mobile-toggle" class="toc-mobile-toggle" aria-label="Toggle table of contents" { "📚" }
    };
    FragmentSet {
        style: Some(style_block(PLAIN_TOC_CSS)),
        script: Some(script_block(PLAIN_TOC_JS)),
        markup: Some(markup.into_string()),
        signatures: vec![
            Signature::Id("toc-sidebar".into()),
            Signature::Id("toc-mobile-toggle".into()),
            Signature::ScriptMarker("buildTOC".into()),
        ],
    }
}

// ============================================================================
// Bootstrap family
// ============================================================================

fn bootstrap_base(cdn: &BootstrapConfig) -> FragmentSet {
    let link = html! {
        link rel="stylesheet" href=(cdn.css_url) integrity=(cdn.css_integrity) crossorigin="anonymous";
    };
    let bundle = html! {
        script src=(cdn.js_url) integrity=(cdn.js_integrity) crossorigin="anonymous" {}
    };
    FragmentSet {
        style: Some(link.into_string()),
        script: Some(bundle.into_string()),
        markup: None,
        signatures: vec![Signature::ScriptSrc(cdn.js_url.clone())],
    }
}

fn bootstrap_theme_toggle() -> FragmentSet {
    let markup = html! {
        button class="theme-toggle btn btn-primary" onclick="toggleTheme()" aria-label="Toggle theme" {
            span id="theme-icon" { "🌓" }
            " "
            span class="d-none d-sm-inline" { "Theme" }
        }
    };
    FragmentSet {
        style: Some(style_block(BOOTSTRAP_TOGGLE_CSS)),
        script: Some(script_block(BOOTSTRAP_TOGGLE_JS)),
        markup: Some(markup.into_string()),
        signatures: vec![
            Signature::Class("theme-toggle".into()),
            Signature::ScriptMarker("toggleTheme".into()),
        ],
    }
}

fn bootstrap_toc_sidebar() -> FragmentSet {
    let markup = html! {
        button class="btn btn-primary toc-mobile-toggle d-lg-none" type="button"
            data-bs-toggle="offcanvas" data-bs-target="#tocOffcanvas"
            aria-label="Toggle table of contents" { "📋" }
        div class="offcanvas offcanvas-start show d-none d-lg-block" data-bs-scroll="true"
            data-bs-backdrop="false" tabindex="-1" id="tocOffcanvas"
            style="width: 280px; position: fixed; height: 100vh;" {
            div class="offcanvas-header border-bottom" {
                h5 class="offcanvas-title" { "Contents" }
                button type="button" class="btn-close d-lg-none" data-bs-dismiss="offcanvas" aria-label="Close" {}
            }
            div class="offcanvas-body" style="overflow-y: auto;" {
                nav id="toc-nav" class="nav flex-column" {}
            }
        }
    };
    FragmentSet {
        style: Some(style_block(BOOTSTRAP_TOC_CSS)),
        script: Some(script_block(BOOTSTRAP_TOC_JS)),
        markup: Some(markup.into_string()),
        signatures: vec![
            Signature::Id("tocOffcanvas".into()),
            Signature::Class("toc-mobile-toggle".into()),
            Signature::ScriptMarker("buildTOC".into()),
        ],
    }
}
