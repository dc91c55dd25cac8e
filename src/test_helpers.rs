//! Shared test utilities for the doc-styler test suite.
//!
//! Provides fixture documents, a scripted [`Confirm`] and small helpers for
//! setting up runs against temporary files.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! let input = write_page(tmp.path(), "doc.html", COMPILED_PAGE);
//! let mut confirm = ScriptedConfirm::answering(&[Answer::No]);
//!
//! let outcome = run(&request(&input), &mut confirm).unwrap();
//! assert_eq!(outcome, Outcome::Aborted);
//! assert_eq!(count(&std::fs::read_to_string(&input).unwrap(), "<style>"), 2);
//! ```

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crate::config::StylerConfig;
use crate::confirm::{Answer, Confirm};
use crate::fragments::StylesheetMode;
use crate::inject::Request;

// =========================================================================
// Fixture documents
// =========================================================================

/// The smallest complete page.
pub const BLANK_PAGE: &str = "<html><head></head><body></body></html>";

/// Diagram palette block that must survive restyling.
pub const DIAGRAM_STYLE: &str =
    "<style>\n/* Diagram colors (generated) */\n:root { --diagram-fill: #f8f8f8; }\n</style>";

/// A compiler-produced page carrying its own styling and a diagram palette.
pub const COMPILED_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="utf-8">
    <title>Guide</title>
    <link rel="stylesheet" href="old.css">
    <style>
/* Diagram colors (generated) */
:root { --diagram-fill: #f8f8f8; }
</style>
    <style>
body { font-family: serif; }
</style>
  </head>
  <body>
    <h2>Intro</h2>
    <p>Text</p>
    <h3>Details</h3>
  </body>
</html>
"#;

// =========================================================================
// Setup
// =========================================================================

/// Write `html` to `dir/name` and return the path.
pub fn write_page(dir: &Path, name: &str, html: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, html).unwrap();
    path
}

/// External-stylesheet request for `input` with stock config and no features.
pub fn request(input: &Path) -> Request {
    Request {
        input: input.to_path_buf(),
        output: None,
        mode: StylesheetMode::External,
        features: Vec::new(),
        force: false,
        config: StylerConfig::default(),
    }
}

/// Number of non-overlapping occurrences of `needle` in `haystack`.
pub fn count(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

// =========================================================================
// Scripted confirmation
// =========================================================================

/// A [`Confirm`] that replays fixed answers and records every prompt.
///
/// Panics when asked more often than it has answers, so a test that expects
/// no prompt can use [`ScriptedConfirm::never`].
pub struct ScriptedConfirm {
    answers: VecDeque<Answer>,
    pub prompts: Vec<String>,
}

impl ScriptedConfirm {
    pub fn answering(answers: &[Answer]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            prompts: Vec::new(),
        }
    }

    pub fn never() -> Self {
        Self::answering(&[])
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&mut self, prompt: &str) -> Answer {
        self.prompts.push(prompt.to_string());
        self.answers
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected prompt: {prompt}"))
    }
}
