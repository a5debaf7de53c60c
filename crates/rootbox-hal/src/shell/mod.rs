//! Shell session trait and its implementations.

pub mod fake_shell;
pub mod su_shell;

pub use fake_shell::{FakeReply, FakeShell, ShellCall};
pub use su_shell::SuShell;

use crate::SessionResult;

/// Runs batches of command lines inside a single shell session.
///
/// A batch executes in order within one process; the caller gets stdout back
/// as lines once the whole batch has finished.
pub trait Shell: Send + Sync {
    /// Whether a privileged session can be opened at all.
    fn root_access(&self) -> bool;

    /// Run `lines` in one elevated session.
    fn su(&self, lines: &[String]) -> SessionResult<Vec<String>>;

    /// Run `lines` in one unelevated session.
    fn sh(&self, lines: &[String]) -> SessionResult<Vec<String>>;
}

/// Convenience for building a batch from string slices.
pub fn batch<I, S>(lines: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    lines.into_iter().map(Into::into).collect()
}
