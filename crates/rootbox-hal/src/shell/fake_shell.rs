//! Fake shell for testing.
//!
//! Records every batch without executing anything and answers from a small
//! rule table, so workflows can be tested without root or a device.

use super::Shell;
use crate::{SessionError, SessionResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Recorded shell invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCall {
    RootProbe,
    Su(Vec<String>),
    Sh(Vec<String>),
}

/// Scripted answer for a batch.
#[derive(Debug, Clone)]
pub enum FakeReply {
    Lines(Vec<String>),
    /// Behave as if the root broker refused to open a session.
    Fail,
}

#[derive(Debug, Clone)]
struct Rule {
    needle: String,
    reply: FakeReply,
}

#[derive(Debug, Default)]
struct FakeShellState {
    root: bool,
    calls: Vec<ShellCall>,
    rules: Vec<Rule>,
    delay: Option<Duration>,
    active_su: usize,
    max_active_su: usize,
}

/// Fake shell that records batches and replies from rules.
///
/// A rule matches when any line of the batch contains its needle; the first
/// matching rule wins. Unmatched batches succeed with no output.
#[derive(Debug, Clone, Default)]
pub struct FakeShell {
    state: Arc<Mutex<FakeShellState>>,
}

impl FakeShell {
    pub fn new(root: bool) -> Self {
        let shell = Self::default();
        shell.set_root(root);
        shell
    }

    pub fn set_root(&self, root: bool) {
        self.state.lock().unwrap().root = root;
    }

    /// Reply with `lines` to any batch mentioning `needle`.
    pub fn on(&self, needle: &str, lines: &[&str]) -> &Self {
        let reply = FakeReply::Lines(lines.iter().map(|s| s.to_string()).collect());
        self.push_rule(needle, reply)
    }

    /// Fail any batch mentioning `needle`.
    pub fn fail_on(&self, needle: &str) -> &Self {
        self.push_rule(needle, FakeReply::Fail)
    }

    /// Make every su batch take `delay`, so overlapping sessions become visible.
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn calls(&self) -> Vec<ShellCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Only the elevated batches, in call order.
    pub fn su_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ShellCall::Su(lines) => Some(lines),
                _ => None,
            })
            .collect()
    }

    pub fn sh_batches(&self) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ShellCall::Sh(lines) => Some(lines),
                _ => None,
            })
            .collect()
    }

    /// Whether any recorded batch contains a line containing `needle`.
    pub fn ran(&self, needle: &str) -> bool {
        self.calls().iter().any(|call| match call {
            ShellCall::Su(lines) | ShellCall::Sh(lines) => {
                lines.iter().any(|line| line.contains(needle))
            }
            ShellCall::RootProbe => false,
        })
    }

    /// Highest number of su batches observed running at the same time.
    pub fn max_concurrent_su(&self) -> usize {
        self.state.lock().unwrap().max_active_su
    }

    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.calls.clear();
        state.max_active_su = 0;
    }

    fn push_rule(&self, needle: &str, reply: FakeReply) -> &Self {
        self.state.lock().unwrap().rules.push(Rule {
            needle: needle.to_string(),
            reply,
        });
        self
    }

    fn reply_for(&self, program: &str, lines: &[String]) -> SessionResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        let rule = state
            .rules
            .iter()
            .find(|rule| lines.iter().any(|line| line.contains(&rule.needle)));
        match rule.map(|rule| &rule.reply) {
            Some(FakeReply::Lines(out)) => Ok(out.clone()),
            Some(FakeReply::Fail) => Err(SessionError::NoContext {
                program: program.to_string(),
                code: Some(1),
            }),
            None => Ok(Vec::new()),
        }
    }
}

impl Shell for FakeShell {
    fn root_access(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ShellCall::RootProbe);
        state.root
    }

    fn su(&self, lines: &[String]) -> SessionResult<Vec<String>> {
        let delay = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(ShellCall::Su(lines.to_vec()));
            state.active_su += 1;
            state.max_active_su = state.max_active_su.max(state.active_su);
            state.delay
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        let reply = self.reply_for("su", lines);
        self.state.lock().unwrap().active_su -= 1;
        reply
    }

    fn sh(&self, lines: &[String]) -> SessionResult<Vec<String>> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(ShellCall::Sh(lines.to_vec()));
        self.reply_for("sh", lines)
    }
}
