//! Confirmation prompts.

use dialoguer::{theme::ColorfulTheme, Confirm};

use crate::error::{Error, Result};

/// Asks the operator a yes/no question.
pub trait Confirmer: Send + Sync {
    /// Returns the operator's answer.
    ///
    /// An `Err` means the prompt could not be shown; callers treat it as a
    /// decline.
    fn confirm(&self, prompt: &str) -> Result<bool>;
}

/// Interactive terminal prompt.
pub struct DialoguerConfirmer {
    theme: ColorfulTheme,
}

impl Default for DialoguerConfirmer {
    fn default() -> Self {
        Self::new()
    }
}

impl DialoguerConfirmer {
    /// Creates a new prompt handler.
    pub fn new() -> Self {
        Self {
            theme: ColorfulTheme::default(),
        }
    }
}

impl Confirmer for DialoguerConfirmer {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        Confirm::with_theme(&self.theme)
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| Error::Prompt(format!("Input cancelled: {e}")))
    }
}

/// Fixed answer, for `--yes` and tests.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

impl Confirmer for AutoConfirm {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_confirm() {
        assert!(AutoConfirm(true).confirm("continue?").unwrap());
        assert!(!AutoConfirm(false).confirm("continue?").unwrap());
    }
}
