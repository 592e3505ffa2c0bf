//! Operator prompt abstraction.
//!
//! The provisioning flow asks yes/no questions and reads file paths. Keeping
//! that behind a trait lets the decision tree run against scripted inputs in
//! tests instead of a real terminal. Prompts may block indefinitely; they are
//! an operator-controlled boundary with no timeout.

use crate::error::Result;
use std::collections::VecDeque;

/// Source of interactive operator decisions.
pub trait Prompt {
    /// Ask a yes/no question, defaulting to no.
    fn confirm(&mut self, message: &str) -> Result<bool>;

    /// Ask for a free-form line of input (may be empty).
    fn input(&mut self, message: &str) -> Result<String>;
}

/// A scripted answer for [`ScriptedPrompt`].
#[derive(Debug, Clone)]
pub enum Answer {
    Yes,
    No,
    Line(String),
}

/// Replays a fixed sequence of answers; panics when the flow asks more
/// questions than were scripted, which makes decision-tree tests exact.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: VecDeque<Answer>,
}

impl ScriptedPrompt {
    pub fn new(answers: impl IntoIterator<Item = Answer>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.answers.is_empty()
    }
}

impl Prompt for ScriptedPrompt {
    fn confirm(&mut self, message: &str) -> Result<bool> {
        match self.answers.pop_front() {
            Some(Answer::Yes) => Ok(true),
            Some(Answer::No) => Ok(false),
            other => panic!("unexpected confirm '{message}', scripted answer was {other:?}"),
        }
    }

    fn input(&mut self, message: &str) -> Result<String> {
        match self.answers.pop_front() {
            Some(Answer::Line(line)) => Ok(line),
            other => panic!("unexpected input '{message}', scripted answer was {other:?}"),
        }
    }
}
