//! MagiskHide control.

use super::{su_lines, Ops};
use rootbox_workflow::{Submission, Task};

impl Ops {
    pub fn hide_add(&self, package: &str) -> Submission {
        self.hide_command(format!("add {}", package))
    }

    pub fn hide_rm(&self, package: &str) -> Submission {
        self.hide_command(format!("rm {}", package))
    }

    pub fn hide_enable(&self) -> Submission {
        self.hide_command("enable".to_string())
    }

    pub fn hide_disable(&self) -> Submission {
        self.hide_command("disable".to_string())
    }

    /// Reload the hide list into state.
    pub fn refresh_hide_list(&self) -> Submission {
        let shell = self.shell.clone();
        let state = self.state.clone();
        let line = format!("{}list", self.config.hide_path);
        self.scheduler.submit(Task::privileged("magiskhide list", move |_| {
            state.set_hide_list(su_lines(shell.as_ref(), vec![line]));
        }))
    }

    fn hide_command(&self, command: String) -> Submission {
        let shell = self.shell.clone();
        let line = format!("{}{}", self.config.hide_path, command);
        self.scheduler
            .submit(Task::privileged(format!("magiskhide {}", command), move |_| {
                su_lines(shell.as_ref(), vec![line]);
            }))
    }
}
