//! rootbox shell abstraction.
//!
//! Every command that touches the device goes through a [`Shell`] so workflows
//! can be exercised against [`FakeShell`] without spawning `su`.

pub mod shell;

pub use rootbox_error::{SessionError, SessionResult};
pub use shell::{batch, FakeReply, FakeShell, Shell, ShellCall, SuShell};
