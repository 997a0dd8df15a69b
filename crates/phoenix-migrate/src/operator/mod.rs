//! Operator interaction: confirmation gates and console output.
//!
//! The import pipeline pauses twice for the operator. Prompts go through the
//! [`Confirmer`] trait so unattended runs and tests can answer without a
//! terminal.

mod prompts;
mod ui;

pub use prompts::{AutoConfirm, Confirmer, DialoguerConfirmer};
pub use ui::OperatorUi;
