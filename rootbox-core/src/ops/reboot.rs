//! Device reboot.

use super::Ops;
use rootbox_hal::Shell;
use rootbox_workflow::{Submission, Task};

pub const REBOOT_COMMAND: &str = "su -c reboot";

impl Ops {
    /// Ask the root broker to reboot. Runs through the unprivileged shell so
    /// it does not queue behind privileged work.
    pub fn reboot(&self) -> Submission {
        let shell = self.shell.clone();
        self.scheduler.submit(Task::unprivileged("reboot", move |_| {
            log::info!("requesting reboot");
            if let Err(err) = shell.sh(&[REBOOT_COMMAND.to_string()]) {
                log::error!("reboot failed: {}", err);
            }
        }))
    }
}
