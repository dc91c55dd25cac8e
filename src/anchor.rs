//! Insertion-point resolution.
//!
//! Every fragment lands at one of four anchors. Each anchor resolves through
//! a fixed fallback order and reports which tier it used:
//!
//! | Anchor | Primary | Fallback | Synthesized |
//! |--------|---------|----------|-------------|
//! | [`Anchor::HeadEnd`] | before `</head>` | after `<head>` (no `</head>`) | new `<head>` in `<html>` |
//! | [`Anchor::HeadStart`] | after `<head>` | n/a | new `<head>` in `<html>` |
//! | [`Anchor::BodyStart`] | after `<body>` | n/a | new `<body>` in `<html>` |
//! | [`Anchor::BodyEnd`] | before `</body>` | end of body (no `</body>`) | new `<body>` in `<html>` |
//!
//! A synthesized `<body>` adopts every `<html>` child that follows the head,
//! so the document's existing content ends up inside it. Without an `<html>`
//! element there is nothing to anchor to and resolution fails with
//! [`MissingAnchor`].

use crate::document::{Document, Element, Node, NodePath};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("document has no <html> element to anchor {0} insertions")]
pub struct MissingAnchor(pub Anchor);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    HeadStart,
    HeadEnd,
    BodyStart,
    BodyEnd,
}

impl std::fmt::Display for Anchor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Anchor::HeadStart => "head-start",
            Anchor::HeadEnd => "head-end",
            Anchor::BodyStart => "body-start",
            Anchor::BodyEnd => "body-end",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Fallback,
    Synthesized,
}

/// A resolved position: insert as child `index` of the element at `parent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertionPoint {
    pub parent: NodePath,
    pub index: usize,
    pub tier: Tier,
}

/// Resolve `anchor`, synthesizing `<head>` or `<body>` when the document
/// lacks them.
pub fn resolve(doc: &mut Document, anchor: Anchor) -> Result<InsertionPoint, MissingAnchor> {
    let html = require_html(doc, anchor)?;
    let point = match anchor {
        Anchor::HeadStart | Anchor::HeadEnd => resolve_head(doc, &html, anchor),
        Anchor::BodyStart | Anchor::BodyEnd => resolve_body(doc, &html, anchor),
    };
    debug!(%anchor, tier = ?point.tier, index = point.index, "resolved insertion point");
    Ok(point)
}

/// Path of the `<html>` element every anchor hangs off.
pub fn require_html(doc: &Document, anchor: Anchor) -> Result<NodePath, MissingAnchor> {
    doc.find_named("html").ok_or(MissingAnchor(anchor))
}

fn resolve_head(doc: &mut Document, html: &[usize], anchor: Anchor) -> InsertionPoint {
    let found = doc
        .child_named(html, "head")
        .and_then(|head| doc.element(&head).map(|el| (head, el)));
    if let Some((head, el)) = found {
        let (index, tier) = match (anchor, el.close_tag.is_some()) {
            (Anchor::HeadEnd, true) => (el.end_index(), Tier::Primary),
            (Anchor::HeadEnd, false) => (0, Tier::Fallback),
            _ => (0, Tier::Primary),
        };
        return InsertionPoint {
            parent: head,
            index,
            tier,
        };
    }
    InsertionPoint {
        parent: synthesize_head(doc, html),
        index: 0,
        tier: Tier::Synthesized,
    }
}

fn resolve_body(doc: &mut Document, html: &[usize], anchor: Anchor) -> InsertionPoint {
    let found = doc
        .child_named(html, "body")
        .and_then(|body| doc.element(&body).map(|el| (body, el)));
    if let Some((body, el)) = found {
        let (index, tier) = match (anchor, el.close_tag.is_some()) {
            (Anchor::BodyEnd, true) => (el.end_index(), Tier::Primary),
            (Anchor::BodyEnd, false) => (el.end_index(), Tier::Fallback),
            _ => (0, Tier::Primary),
        };
        return InsertionPoint {
            parent: body,
            index,
            tier,
        };
    }
    let body = synthesize_body(doc, html);
    let index = match anchor {
        Anchor::BodyEnd => doc.element(&body).map_or(0, Element::end_index),
        _ => 0,
    };
    InsertionPoint {
        parent: body,
        index,
        tier: Tier::Synthesized,
    }
}

/// Insert an empty `<head></head>` as the first child of `<html>`.
fn synthesize_head(doc: &mut Document, html: &[usize]) -> NodePath {
    if let Some(children) = doc.children_mut(html) {
        children.insert(0, Node::Element(Element::new("head", &[])));
    }
    debug!("synthesized <head>");
    let mut path = html.to_vec();
    path.push(0);
    path
}

/// Wrap every `<html>` child after the head in a new `<body>`.
fn synthesize_body(doc: &mut Document, html: &[usize]) -> NodePath {
    let start = doc
        .child_named(html, "head")
        .and_then(|head| head.last().copied())
        .map_or(0, |i| i + 1);
    let Some(children) = doc.children_mut(html) else {
        return html.to_vec();
    };
    let start = start.min(children.len());
    let mut body = Element::new("body", &[]);
    body.children = children.drain(start..).collect();
    children.push(Node::Element(body));
    debug!("synthesized <body>");
    let mut path = html.to_vec();
    path.push(start);
    path
}
