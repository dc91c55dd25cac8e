//! Tolerant, lossless tokenizer and tree builder.
//!
//! Tag and attribute names are ASCII `[A-Za-z0-9:_-]`. Attribute values are
//! kept raw; entities are never decoded because nothing downstream needs them
//! and the original bytes must survive serialization.
//!
//! Tree building keeps a stack of open elements. An end tag closes the
//! nearest open element of the same name and implicitly closes everything
//! opened after it. An end tag with nothing to close becomes [`Node::Stray`].

use super::{Element, Node};
use memchr::memchr;

const COMMENT_START: &str = "<!--";
const COMMENT_END: &str = "-->";

fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

fn is_raw_text_element(name: &str) -> bool {
    matches!(name, "script" | "style" | "title" | "textarea")
}

fn is_name_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'-' || c == b'_' || c == b':'
}

/// Does the `<` at `at` open a tag, comment or declaration?
fn starts_markup(bytes: &[u8], at: usize) -> bool {
    match bytes.get(at + 1) {
        Some(c) if c.is_ascii_alphabetic() => true,
        Some(b'!') | Some(b'?') => true,
        Some(b'/') => bytes.get(at + 2).is_some_and(|c| c.is_ascii_alphabetic()),
        _ => false,
    }
}

/// Find `</name` followed by optional ASCII whitespace and `>`, ignoring case.
/// Returns the byte range of the close tag within `haystack`.
fn find_raw_text_close(haystack: &str, name: &str) -> Option<(usize, usize)> {
    let bytes = haystack.as_bytes();
    let name = name.as_bytes();
    let mut i = 0;
    while let Some(rel) = memchr(b'<', &bytes[i..]) {
        let at = i + rel;
        let name_end = at + 2 + name.len();
        if bytes.get(at + 1) == Some(&b'/')
            && name_end <= bytes.len()
            && bytes[at + 2..name_end].eq_ignore_ascii_case(name)
        {
            let mut k = name_end;
            while k < bytes.len() && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < bytes.len() && bytes[k] == b'>' {
                return Some((at, k + 1));
            }
        }
        i = at + 1;
    }
    None
}

struct StartTag {
    name: String,
    attrs: Vec<(String, Option<String>)>,
    self_closing: bool,
    /// Byte offset just past the closing `>`.
    end: usize,
}

/// Parse the start tag beginning at `start` (which holds `<`).
/// Returns `None` when the input ends before the tag's `>`.
fn parse_start_tag(input: &str, start: usize) -> Option<StartTag> {
    let bytes = input.as_bytes();
    let len = bytes.len();
    let mut k = start + 1;
    while k < len && is_name_char(bytes[k]) {
        k += 1;
    }
    let name = input[start + 1..k].to_ascii_lowercase();
    let mut attrs = Vec::new();
    let mut self_closing = false;

    loop {
        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        if k >= len {
            return None;
        }
        match bytes[k] {
            b'>' => {
                k += 1;
                break;
            }
            b'/' if bytes.get(k + 1) == Some(&b'>') => {
                self_closing = true;
                k += 2;
                break;
            }
            _ => {}
        }
        let name_start = k;
        while k < len && is_name_char(bytes[k]) {
            k += 1;
        }
        if name_start == k {
            // Junk such as a lone `/` or `"`: skip it.
            k += 1;
            continue;
        }
        let attr_name = input[name_start..k].to_ascii_lowercase();
        while k < len && bytes[k].is_ascii_whitespace() {
            k += 1;
        }
        let value = if k < len && bytes[k] == b'=' {
            k += 1;
            while k < len && bytes[k].is_ascii_whitespace() {
                k += 1;
            }
            if k < len && (bytes[k] == b'"' || bytes[k] == b'\'') {
                let quote = bytes[k];
                let value_start = k + 1;
                let close = memchr(quote, &bytes[value_start..])?;
                k = value_start + close + 1;
                Some(input[value_start..value_start + close].to_string())
            } else {
                let value_start = k;
                while k < len && !bytes[k].is_ascii_whitespace() && bytes[k] != b'>' {
                    k += 1;
                }
                Some(input[value_start..k].to_string())
            }
        } else {
            None
        };
        attrs.push((attr_name, value));
    }

    Some(StartTag {
        name,
        attrs,
        self_closing,
        end: k,
    })
}

#[derive(Default)]
struct TreeBuilder {
    root: Vec<Node>,
    open: Vec<Element>,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) {
        match self.open.last_mut() {
            Some(parent) => parent.children.push(node),
            None => self.root.push(node),
        }
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let siblings = match self.open.last_mut() {
            Some(parent) => &mut parent.children,
            None => &mut self.root,
        };
        if let Some(Node::Text(prev)) = siblings.last_mut() {
            prev.push_str(text);
        } else {
            siblings.push(Node::Text(text.to_string()));
        }
    }

    /// Pop the top element, attaching it to its parent with the given end tag.
    fn pop_with(&mut self, close_tag: Option<String>) {
        if let Some(mut el) = self.open.pop() {
            el.close_tag = close_tag;
            self.push(Node::Element(el));
        }
    }

    /// Close the nearest open `name`, implicitly closing anything above it.
    fn close(&mut self, name: &str, close_tag: Option<String>) -> bool {
        let Some(pos) = self.open.iter().rposition(|el| el.name == name) else {
            return false;
        };
        while self.open.len() > pos + 1 {
            self.pop_with(None);
        }
        self.pop_with(close_tag);
        true
    }

    fn finish(mut self) -> Vec<Node> {
        while !self.open.is_empty() {
            self.pop_with(None);
        }
        self.root
    }
}

pub(super) fn parse_nodes(input: &str) -> Vec<Node> {
    let bytes = input.as_bytes();
    let mut tree = TreeBuilder::default();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' || !starts_markup(bytes, i) {
            // Text runs until the next `<` that actually opens markup.
            let start = i;
            i += 1;
            loop {
                match memchr(b'<', &bytes[i..]) {
                    Some(rel) if starts_markup(bytes, i + rel) => {
                        i += rel;
                        break;
                    }
                    Some(rel) => i += rel + 1,
                    None => {
                        i = bytes.len();
                        break;
                    }
                }
            }
            tree.push_text(&input[start..i]);
            continue;
        }

        if input[i..].starts_with(COMMENT_START) {
            let end = input[i + COMMENT_START.len()..]
                .find(COMMENT_END)
                .map(|rel| i + COMMENT_START.len() + rel + COMMENT_END.len())
                .unwrap_or(bytes.len());
            tree.push(Node::Comment(input[i..end].to_string()));
            i = end;
            continue;
        }

        if matches!(bytes[i + 1], b'!' | b'?') {
            match memchr(b'>', &bytes[i..]) {
                Some(rel) => {
                    tree.push(Node::Declaration(input[i..i + rel + 1].to_string()));
                    i += rel + 1;
                }
                None => {
                    tree.push_text(&input[i..]);
                    i = bytes.len();
                }
            }
            continue;
        }

        if bytes[i + 1] == b'/' {
            let name_start = i + 2;
            let mut j = name_start;
            while j < bytes.len() && is_name_char(bytes[j]) {
                j += 1;
            }
            let name = input[name_start..j].to_ascii_lowercase();
            let end = memchr(b'>', &bytes[j..])
                .map(|rel| j + rel + 1)
                .unwrap_or(bytes.len());
            let raw = input[i..end].to_string();
            if !tree.close(&name, Some(raw.clone())) {
                tree.push(Node::Stray(raw));
            }
            i = end;
            continue;
        }

        let Some(tag) = parse_start_tag(input, i) else {
            // Unterminated start tag: the rest is text.
            tree.push_text(&input[i..]);
            break;
        };
        let open_tag = input[i..tag.end].to_string();
        i = tag.end;

        if tag.name == "body" {
            tree.close("head", None);
        }

        let mut el = Element {
            name: tag.name,
            attrs: tag.attrs,
            open_tag,
            children: Vec::new(),
            close_tag: None,
        };

        if tag.self_closing || is_void_element(&el.name) {
            tree.push(Node::Element(el));
            continue;
        }

        if is_raw_text_element(&el.name) {
            match find_raw_text_close(&input[i..], &el.name) {
                Some((close_start, close_end)) => {
                    if close_start > 0 {
                        el.children
                            .push(Node::Text(input[i..i + close_start].to_string()));
                    }
                    el.close_tag = Some(input[i + close_start..i + close_end].to_string());
                    i += close_end;
                }
                None => {
                    if i < bytes.len() {
                        el.children.push(Node::Text(input[i..].to_string()));
                    }
                    i = bytes.len();
                }
            }
            tree.push(Node::Element(el));
            continue;
        }

        tree.open.push(el);
    }

    tree.finish()
}
