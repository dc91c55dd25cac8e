//! Lossless HTML tree.
//!
//! Documents are parsed into a minimal tree of [`Node`]s that keeps the raw
//! text of every tag, so serializing an untouched tree reproduces the input
//! byte for byte:
//!
//! ```text
//! Document::parse(s).to_string() == s
//! ```
//!
//! The tree is deliberately shallow in its understanding of HTML. It knows
//! about void elements, raw-text elements (`script`, `style`, `title`,
//! `textarea`), end tags that close intermediate elements, and that `<body>`
//! ends an open `<head>`. That is enough to find the handful of anchors the
//! injector needs (`html`, `head`, `body`) and to recognise previously
//! injected stylesheets, scripts and markup as whole elements rather than as
//! regex matches.
//!
//! # Whitespace
//!
//! Inserted blocks are laid out one per line with [`BLOCK_INDENT`]. Removing
//! an element also trims the line-break whitespace in front of it, so
//! removing everything an earlier run inserted restores the earlier layout.
//! This is what makes a second run over the same file a fixpoint.

mod parse;

use std::fmt;
use std::ops::Range;

/// Indentation written in front of every inserted block.
pub const BLOCK_INDENT: &str = "\n    ";

/// Index path from the document root to a node.
///
/// An empty path addresses the root node list.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    /// Raw comment including its `<!--` / `-->` delimiters.
    Comment(String),
    /// Raw `<!DOCTYPE ...>` or other `<!...>` / `<?...>` declaration.
    Declaration(String),
    /// An end tag with no matching open element, kept verbatim.
    Stray(String),
    Element(Element),
}

impl Node {
    /// True for text nodes made only of whitespace.
    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Text(t) if t.trim().is_empty())
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercased tag name.
    pub name: String,
    /// Lowercased attribute names with raw (undecoded) values.
    pub attrs: Vec<(String, Option<String>)>,
    /// Raw start tag as it appeared in the source.
    pub open_tag: String,
    pub children: Vec<Node>,
    /// Raw end tag, `None` when the element was closed implicitly.
    pub close_tag: Option<String>,
}

impl Element {
    /// Build a fresh element with an explicit end tag.
    pub fn new(name: &str, attrs: &[(&str, &str)]) -> Self {
        let mut open_tag = format!("<{name}");
        for (key, value) in attrs {
            open_tag.push_str(&format!(r#" {key}="{value}""#));
        }
        open_tag.push('>');
        Self {
            name: name.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), Some(v.to_string())))
                .collect(),
            open_tag,
            children: Vec::new(),
            close_tag: Some(format!("</{name}>")),
        }
    }

    /// Attribute value by name. Bare attributes (`<input checked>`) yield `""`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }

    /// Concatenated text of direct text children (the raw body of `style`/`script`).
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Index in front of trailing whitespace, where an appended block belongs.
    pub fn end_index(&self) -> usize {
        match self.children.last() {
            Some(last) if last.is_blank() => self.children.len() - 1,
            _ => self.children.len(),
        }
    }
}

/// A parsed HTML document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    nodes: Vec<Node>,
}

impl Document {
    /// Parse markup into a tree. Never fails: anything that does not look
    /// like a tag stays text.
    pub fn parse(input: &str) -> Self {
        Self {
            nodes: parse::parse_nodes(input),
        }
    }

    /// Parse a fragment into top-level nodes, dropping whitespace-only text
    /// between them so the caller controls layout.
    pub fn parse_fragment(input: &str) -> Vec<Node> {
        parse::parse_nodes(input)
            .into_iter()
            .filter(|n| !n.is_blank())
            .collect()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Path of the first element (depth-first) satisfying `pred`.
    pub fn find(&self, pred: impl Fn(&Element) -> bool) -> Option<NodePath> {
        fn walk(
            nodes: &[Node],
            pred: &dyn Fn(&Element) -> bool,
            path: &mut NodePath,
        ) -> bool {
            for (i, node) in nodes.iter().enumerate() {
                if let Node::Element(el) = node {
                    path.push(i);
                    if pred(el) || walk(&el.children, pred, path) {
                        return true;
                    }
                    path.pop();
                }
            }
            false
        }
        let mut path = Vec::new();
        walk(&self.nodes, &pred, &mut path).then_some(path)
    }

    /// Path of the first element named `name`.
    pub fn find_named(&self, name: &str) -> Option<NodePath> {
        self.find(|el| el.name == name)
    }

    /// Path of a direct child element of `parent` named `name`.
    pub fn child_named(&self, parent: &[usize], name: &str) -> Option<NodePath> {
        let children = self.children(parent)?;
        children
            .iter()
            .position(|n| n.as_element().is_some_and(|el| el.name == name))
            .map(|i| {
                let mut path = parent.to_vec();
                path.push(i);
                path
            })
    }

    pub fn any(&self, pred: impl Fn(&Element) -> bool) -> bool {
        self.find(pred).is_some()
    }

    /// Every element in document order.
    pub fn elements(&self) -> Vec<&Element> {
        fn walk<'a>(nodes: &'a [Node], out: &mut Vec<&'a Element>) {
            for node in nodes {
                if let Node::Element(el) = node {
                    out.push(el);
                    walk(&el.children, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.nodes, &mut out);
        out
    }

    pub fn element(&self, path: &[usize]) -> Option<&Element> {
        let (&last, parent) = path.split_last()?;
        self.children(parent)?.get(last)?.as_element()
    }

    pub fn element_mut(&mut self, path: &[usize]) -> Option<&mut Element> {
        let (&last, parent) = path.split_last()?;
        match self.children_mut(parent)?.get_mut(last)? {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Children of the element at `parent`, or the root list for an empty path.
    pub fn children(&self, parent: &[usize]) -> Option<&[Node]> {
        if parent.is_empty() {
            return Some(&self.nodes);
        }
        self.element(parent).map(|el| el.children.as_slice())
    }

    pub fn children_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Node>> {
        let mut nodes = &mut self.nodes;
        for &i in parent {
            nodes = match nodes.get_mut(i)? {
                Node::Element(el) => &mut el.children,
                _ => return None,
            };
        }
        Some(nodes)
    }

    /// Insert `blocks` at `index` under `parent`, each on its own indented line.
    ///
    /// Returns `false` when `parent` does not address an element.
    pub fn insert_blocks(&mut self, parent: &[usize], index: usize, blocks: Vec<Node>) -> bool {
        let Some(children) = self.children_mut(parent) else {
            return false;
        };
        let index = index.min(children.len());
        let laid_out = blocks
            .into_iter()
            .flat_map(|block| [Node::Text(BLOCK_INDENT.to_string()), block]);
        children.splice(index..index, laid_out);
        true
    }

    /// Move children `range` of `parent` into `wrapper`, which takes their
    /// place on its own indented line. Returns the wrapper's path.
    pub fn wrap_children(
        &mut self,
        parent: &[usize],
        range: Range<usize>,
        mut wrapper: Element,
    ) -> Option<NodePath> {
        let children = self.children_mut(parent)?;
        let end = range.end.min(children.len());
        let start = range.start.min(end);
        wrapper.children = children.drain(start..end).collect();
        if !wrapper.children.last().is_some_and(Node::is_blank) {
            wrapper.children.push(Node::Text(BLOCK_INDENT.to_string()));
        }
        children.splice(
            start..start,
            [Node::Text(BLOCK_INDENT.to_string()), Node::Element(wrapper)],
        );
        let mut path = parent.to_vec();
        path.push(start + 1);
        Some(path)
    }

    /// Remove every element for which `pred` holds, without descending into
    /// removed elements. Returns the removed elements in document order.
    pub fn remove_where(&mut self, pred: impl FnMut(&Element) -> bool) -> Vec<Element> {
        self.remove_where_outside(|_| false, pred)
    }

    /// Like [`Document::remove_where`], but elements for which `opaque` holds
    /// are neither tested nor descended into.
    pub fn remove_where_outside(
        &mut self,
        opaque: impl Fn(&Element) -> bool,
        mut pred: impl FnMut(&Element) -> bool,
    ) -> Vec<Element> {
        let mut removed = Vec::new();
        remove_in(&mut self.nodes, &opaque, &mut pred, &mut removed);
        removed
    }
}

fn remove_in(
    children: &mut Vec<Node>,
    opaque: &dyn Fn(&Element) -> bool,
    pred: &mut dyn FnMut(&Element) -> bool,
    removed: &mut Vec<Element>,
) {
    let mut i = 0;
    while i < children.len() {
        if matches!(&children[i], Node::Element(el) if opaque(el)) {
            i += 1;
            continue;
        }
        let hit = matches!(&children[i], Node::Element(el) if pred(el));
        if hit {
            if let Node::Element(el) = children.remove(i) {
                removed.push(el);
            }
            if i > 0 && trim_line_break(&mut children[i - 1]) {
                children.remove(i - 1);
                i -= 1;
            }
            continue;
        }
        if let Node::Element(el) = &mut children[i] {
            remove_in(&mut el.children, opaque, pred, removed);
        }
        i += 1;
    }
}

/// Trim trailing whitespace from a text node if that whitespace spans a line
/// break. Returns true when the node is left empty.
fn trim_line_break(node: &mut Node) -> bool {
    let Node::Text(text) = node else {
        return false;
    };
    let kept = text.trim_end().len();
    if text[kept..].contains('\n') {
        text.truncate(kept);
    }
    text.is_empty()
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(raw) | Node::Comment(raw) | Node::Declaration(raw) | Node::Stray(raw) => {
                f.write_str(raw)
            }
            Node::Element(el) => write!(f, "{el}"),
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.open_tag)?;
        for child in &self.children {
            write!(f, "{child}")?;
        }
        if let Some(close) = &self.close_tag {
            f.write_str(close)?;
        }
        Ok(())
    }
}
