//! Terminal prompt implementation.

use dbup_core::{Error, Prompt};
use dialoguer::{Confirm, Input};

/// Asks the operator on the controlling terminal. Blocks until answered.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn confirm(&mut self, message: &str) -> dbup_core::Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(|e| Error::Prompt(e.to_string()))
    }

    fn input(&mut self, message: &str) -> dbup_core::Result<String> {
        Input::<String>::new()
            .with_prompt(message)
            .allow_empty(true)
            .interact_text()
            .map_err(|e| Error::Prompt(e.to_string()))
    }
}
