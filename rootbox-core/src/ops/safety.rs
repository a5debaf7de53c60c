//! Device integrity attestation.

use super::Ops;
use crate::events::Event;
use rootbox_workflow::{Submission, Task};
use std::sync::Arc;

/// Runs an attestation and returns its status code.
pub trait SafetyCheck: Send + Sync {
    fn run(&self) -> i32;
}

impl<F> SafetyCheck for F
where
    F: Fn() -> i32 + Send + Sync,
{
    fn run(&self) -> i32 {
        self()
    }
}

impl Ops {
    /// Run the attestation, store its code, then fire
    /// [`Event::SafetyCheckDone`].
    pub fn check_safety(&self, check: Arc<dyn SafetyCheck>) -> Submission {
        let state = self.state.clone();
        let events = self.events.clone();
        let task = Task::unprivileged("safety check", move |_| {
            let code = check.run();
            log::info!("safety check returned {}", code);
            state.set_safety_result(code);
        })
        .on_complete(move |()| events.trigger(Event::SafetyCheckDone));
        self.scheduler.submit(task)
    }
}
