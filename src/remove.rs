//! Removal of earlier injections.
//!
//! Before fragments are inserted, everything a previous run could have put
//! into the document is taken out again:
//!
//! - `<link>` elements whose `rel` includes `stylesheet`
//! - `<style>` elements, except carve-outs
//! - elements matching a fragment [`Signature`]
//!
//! A carve-out is a style block whose first non-blank line is a comment
//! carrying one of the preserve markers, e.g. the diagram palette:
//!
//! ```text
//! <style>
//! /* Diagram colors (generated) */
//! :root { --diagram-fill: #fff; }
//! </style>
//! ```
//!
//! Carve-outs stay where they are. Nothing inside inline `<svg>` or `<math>`
//! is touched: those carry their own `<style>` elements.

use crate::document::{Document, Element};
use crate::fragments::Signature;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// What a removal pass found.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Removal {
    pub links: usize,
    pub styles: usize,
    /// Elements matched by a fragment signature.
    pub features: usize,
    /// Carve-out style blocks left in place.
    pub preserved: usize,
}

impl Removal {
    /// True when nothing would be removed. Preserved blocks do not count.
    pub fn is_empty(&self) -> bool {
        self.links + self.styles + self.features == 0
    }
}

impl fmt::Display for Removal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        for (count, noun) in [
            (self.links, "stylesheet link"),
            (self.styles, "style block"),
            (self.features, "feature element"),
        ] {
            match count {
                0 => {}
                1 => parts.push(format!("1 {noun}")),
                n => parts.push(format!("{n} {noun}s")),
            }
        }
        if parts.is_empty() {
            f.write_str("nothing")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Foreign-content roots whose subtrees are left alone.
const FOREIGN: [&str; 2] = ["svg", "math"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Link,
    Style,
    Feature,
    Preserved,
}

fn classify(el: &Element, signatures: &[Signature], markers: &[String]) -> Option<Kind> {
    if el.name == "link" && is_stylesheet_link(el) {
        return Some(Kind::Link);
    }
    if el.name == "style" {
        return Some(if is_carve_out(el, markers) {
            Kind::Preserved
        } else {
            Kind::Style
        });
    }
    signatures
        .iter()
        .any(|sig| sig.matches(el))
        .then_some(Kind::Feature)
}

fn is_stylesheet_link(el: &Element) -> bool {
    el.attr("rel").is_some_and(|rel| {
        rel.split_ascii_whitespace()
            .any(|r| r.eq_ignore_ascii_case("stylesheet"))
    })
}

/// True when the first non-blank line of a style block is a comment
/// containing one of `markers`.
pub fn is_carve_out(style: &Element, markers: &[String]) -> bool {
    let text = style.text();
    let Some(first) = text.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return false;
    };
    first.starts_with("/*") && markers.iter().any(|m| first.contains(m.as_str()))
}

/// Strip earlier injections from `doc`.
pub fn remove(doc: &mut Document, signatures: &[Signature], markers: &[String]) -> Removal {
    let mut found = Removal::default();
    let foreign = |el: &Element| FOREIGN.contains(&el.name.as_str());
    let removed = doc.remove_where_outside(foreign, |el| match classify(el, signatures, markers) {
        Some(Kind::Preserved) => {
            found.preserved += 1;
            false
        }
        Some(kind) => {
            match kind {
                Kind::Link => found.links += 1,
                Kind::Style => found.styles += 1,
                _ => found.features += 1,
            }
            true
        }
        None => false,
    });
    for el in &removed {
        debug!(element = %el.open_tag, "removed earlier injection");
    }
    if found.preserved > 0 {
        debug!(count = found.preserved, "kept carve-out style blocks");
    }
    found
}

/// Report what [`remove`] would strip, leaving `doc` untouched.
pub fn detect(doc: &Document, signatures: &[Signature], markers: &[String]) -> Removal {
    remove(&mut doc.clone(), signatures, markers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BootstrapConfig;
    use crate::fragments::FragmentCatalog;

    fn markers() -> Vec<String> {
        vec!["Diagram colors".to_string()]
    }

    fn signatures() -> Vec<Signature> {
        FragmentCatalog::removal_signatures(&BootstrapConfig::default())
    }

    const DIAGRAM_STYLE: &str = "<style>\n/* Diagram colors (generated) */\n:root { --fill: #fff; }\n</style>";

    #[test]
    fn removes_links_and_styles() {
        let mut doc = Document::parse(
            "<head>\n<link rel=\"stylesheet\" href=\"a.css\">\n<link rel=\"icon\" href=\"i.png\">\n<style>p{}</style>\n</head>",
        );
        let found = remove(&mut doc, &signatures(), &markers());
        assert_eq!(found.links, 1);
        assert_eq!(found.styles, 1);
        assert_eq!(
            doc.to_string(),
            "<head>\n<link rel=\"icon\" href=\"i.png\">\n</head>"
        );
    }

    #[test]
    fn rel_matching_is_token_based() {
        let mut doc = Document::parse(
            r#"<link rel="alternate stylesheet" href="a.css"><link rel="STYLESHEET" href="b.css"><link rel="preload" href="c.css">"#,
        );
        let found = remove(&mut doc, &[], &markers());
        assert_eq!(found.links, 2);
        assert_eq!(doc.to_string(), r#"<link rel="preload" href="c.css">"#);
    }

    #[test]
    fn carve_out_survives_removal() {
        let input = format!("<head>\n{DIAGRAM_STYLE}\n<style>body{{}}</style>\n</head>");
        let mut doc = Document::parse(&input);
        let found = remove(&mut doc, &signatures(), &markers());
        assert_eq!(found.styles, 1);
        assert_eq!(found.preserved, 1);
        assert_eq!(doc.to_string(), format!("<head>\n{DIAGRAM_STYLE}\n</head>"));
    }

    #[test]
    fn inline_svg_keeps_its_stylesheet() {
        let input = concat!(
            "<body>\n",
            "<svg viewBox=\"0 0 10 10\"><style type=\"text/css\">.t{fill:red}</style>",
            "<text class=\"t\">x</text></svg>\n",
            "</body>",
        );
        let mut doc = Document::parse(input);
        let found = remove(&mut doc, &signatures(), &markers());
        assert!(found.is_empty());
        assert_eq!(doc.to_string(), input);
    }

    #[test]
    fn marker_must_be_on_the_first_line() {
        let doc = Document::parse("<style>\nbody {}\n/* Diagram colors */\n</style>");
        let style = doc.elements()[0];
        assert!(!is_carve_out(style, &markers()));

        let doc = Document::parse("<style>\n\n  /* Diagram colors */\n</style>");
        assert!(is_carve_out(doc.elements()[0], &markers()));
    }

    #[test]
    fn marker_must_be_in_a_comment() {
        let doc = Document::parse("<style>.x { content: 'Diagram colors'; }</style>");
        assert!(!is_carve_out(doc.elements()[0], &markers()));
    }

    #[test]
    fn feature_markup_and_scripts_are_removed() {
        let mut doc = Document::parse(concat!(
            "<body>\n",
            "    <button class=\"theme-toggle\" onclick=\"toggleTheme()\">x</button>\n",
            "    <div id=\"toc-sidebar\"><nav id=\"toc-nav\"></nav></div>\n",
            "<p>content</p>\n",
            "    <script>function toggleTheme() {}</script>\n",
            "    <script>analytics()</script>\n",
            "</body>",
        ));
        let found = remove(&mut doc, &signatures(), &markers());
        assert_eq!(found.features, 3);
        assert_eq!(
            doc.to_string(),
            "<body>\n<p>content</p>\n    <script>analytics()</script>\n</body>"
        );
    }

    #[test]
    fn bootstrap_bundle_is_recognised_by_src() {
        let cdn = BootstrapConfig::default();
        let input = format!(r#"<body><script src="{}"></script></body>"#, cdn.js_url);
        let mut doc = Document::parse(&input);
        let found = remove(&mut doc, &signatures(), &markers());
        assert_eq!(found.features, 1);
        assert_eq!(doc.to_string(), "<body></body>");
    }

    #[test]
    fn detect_leaves_document_untouched() {
        let input = "<head><style>p{}</style></head>";
        let doc = Document::parse(input);
        let found = detect(&doc, &signatures(), &markers());
        assert!(!found.is_empty());
        assert_eq!(doc.to_string(), input);
    }

    #[test]
    fn preserved_blocks_alone_are_not_styling() {
        let doc = Document::parse(&format!("<head>{DIAGRAM_STYLE}</head>"));
        let found = detect(&doc, &signatures(), &markers());
        assert!(found.is_empty());
        assert_eq!(found.preserved, 1);
    }

    #[test]
    fn display_lists_nonzero_counts() {
        let found = Removal {
            links: 1,
            styles: 2,
            features: 0,
            preserved: 1,
        };
        assert_eq!(found.to_string(), "1 stylesheet link, 2 style blocks");
        assert_eq!(Removal::default().to_string(), "nothing");
    }
}
