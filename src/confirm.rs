//! Overwrite confirmation.
//!
//! The injector never reads stdin itself. It asks a [`Confirm`] implementation,
//! which makes the gate scriptable in tests and lets the caller decide what an
//! unanswerable prompt means through [`NoTtyPolicy`].

use serde::{Deserialize, Serialize};
use std::io::{self, BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Nobody could answer: stdin closed or unreadable.
    Unavailable,
}

pub trait Confirm {
    fn confirm(&mut self, prompt: &str) -> Answer;
}

/// What to do when the prompt gets [`Answer::Unavailable`].
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NoTtyPolicy {
    Proceed,
    #[default]
    Abort,
}

impl NoTtyPolicy {
    /// Whether the run may continue given `answer`.
    pub fn allows(self, answer: Answer) -> bool {
        match answer {
            Answer::Yes => true,
            Answer::No => false,
            Answer::Unavailable => self == NoTtyPolicy::Proceed,
        }
    }
}

/// Line-based prompt: writes the question, reads one answer line.
///
/// Only `y` or `Y` is consent. An empty line or anything else is a refusal,
/// end of input is [`Answer::Unavailable`].
pub struct StdinConfirm<R, W> {
    input: R,
    output: W,
}

impl StdinConfirm<io::StdinLock<'static>, io::Stderr> {
    /// Prompt on stderr, answer on stdin. Stdout stays free for the report.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stderr())
    }
}

impl<R: BufRead, W: Write> StdinConfirm<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Confirm for StdinConfirm<R, W> {
    fn confirm(&mut self, prompt: &str) -> Answer {
        if write!(self.output, "{prompt}")
            .and_then(|()| self.output.flush())
            .is_err()
        {
            return Answer::Unavailable;
        }
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => Answer::Unavailable,
            Ok(_) if matches!(line.trim(), "y" | "Y") => Answer::Yes,
            Ok(_) => Answer::No,
        }
    }
}
