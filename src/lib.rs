//! # doc-styler
//!
//! Post-processes HTML produced by a document compiler: links or embeds a
//! stylesheet and optionally adds a light/dark/auto theme toggle and a
//! table-of-contents sidebar. Re-running it on its own output replaces the
//! earlier injections instead of stacking them, so it can sit at the end of
//! any build script.
//!
//! # Architecture: Parse, Remove, Insert
//!
//! ```text
//! 1. Parse    page.html  →  Document      (lossless tree)
//! 2. Remove   Document   →  Document      (earlier links, styles, feature markup)
//! 3. Insert   Document   →  page.html     (fragments at resolved anchors)
//! ```
//!
//! The document is parsed into a minimal tree that keeps every byte of the
//! source, so anything the tool does not touch is written back unchanged.
//! Earlier injections are recognised as whole elements through fragment
//! signatures, never by searching raw text.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`document`] | Lossless HTML tree: parse, query, insert, remove, serialize |
//! | [`anchor`] | Resolves `head`/`body` insertion points with fallbacks and synthesis |
//! | [`fragments`] | Fragment catalog per family (Maud markup, embedded CSS/JS) and signatures |
//! | [`remove`] | Strips earlier stylesheet links, style blocks and feature markup |
//! | [`confirm`] | Injectable overwrite confirmation and the no-TTY policy |
//! | [`inject`] | The orchestrator: `apply` on a tree, `run` on a file |
//! | [`config`] | `doc-styler.toml` loading, merging and validation |
//! | [`output`] | CLI report formatting, text and JSON |
//!
//! # Design Decisions
//!
//! ## Idempotent By Construction
//!
//! Every inserted block sits on its own indented line, and removing an element
//! also removes the line break in front of it. Removal of everything a run
//! inserted therefore restores the document it started from, and a second run
//! with the same options is byte-identical to the first.
//!
//! ## Explicit Catalog, Explicit Confirmation
//!
//! The [`fragments::FragmentCatalog`] is an immutable value built per run and
//! handed to [`inject::apply`]. The overwrite prompt goes through the
//! [`confirm::Confirm`] trait, and what an unanswerable prompt means is the
//! configured [`confirm::NoTtyPolicy`] rather than whatever EOF happens to do.
//!
//! ## Carve-Outs
//!
//! Diagram palettes are emitted as `<style>` blocks by an earlier build step.
//! Blocks whose first line is a comment carrying a preserve marker
//! (`Diagram colors` by default) survive removal.

pub mod anchor;
pub mod config;
pub mod confirm;
pub mod document;
pub mod fragments;
pub mod inject;
pub mod output;
pub mod remove;

#[cfg(test)]
pub(crate) mod test_helpers;
