//! Flashable zip installation.
//!
//! `Start -> Staging -> Validating -> Installing -> outcome`. Every failure
//! is folded into a [`FlashOutcome`]; nothing here is fatal.

mod commands;
mod outcome;
mod runner;

pub use commands::{cleanup_batch, install_batch, EXIT_SENTINEL};
pub use outcome::{classify, FlashOutcome, Notice};
pub use runner::{FlashRequest, Flasher, Notifier, PreStage, COPYING_LABEL};
