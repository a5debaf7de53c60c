//! Probe of optional root features.

use super::{su_lines, Ops};
use rootbox_workflow::{Submission, Task};
use std::path::Path;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeatureFlags {
    /// A `busybox` binary is on the session's PATH.
    pub busybox: bool,
    /// Systemless hosts file is active.
    pub hosts: bool,
    /// The disable marker exists, so the core is off on next boot.
    pub disabled: bool,
}

impl FeatureFlags {
    fn from_lines(lines: &[String]) -> Self {
        let has = |marker: &str| lines.iter().any(|line| line.trim() == marker);
        Self {
            busybox: has("busybox"),
            hosts: has("hosts"),
            disabled: has("disabled"),
        }
    }
}

fn probe_batch(magisk_path: &Path, disable_file: &Path) -> Vec<String> {
    let core = magisk_path.join(".core");
    vec![
        "command -v busybox >/dev/null && echo busybox".to_string(),
        format!("[ -f {}/hosts ] && echo hosts", core.display()),
        format!("[ -f {} ] && echo disabled", disable_file.display()),
        "echo done".to_string(),
    ]
}

impl Ops {
    pub fn probe_features(&self) -> Submission {
        let shell = self.shell.clone();
        let state = self.state.clone();
        let batch = probe_batch(&self.config.magisk_path, &self.config.disable_file);
        self.scheduler.submit(Task::privileged("probe features", move |_| {
            let out = su_lines(shell.as_ref(), batch);
            // Without the trailing marker the session never ran the probe.
            if out.last().map(|line| line.trim()) != Some("done") {
                log::warn!("feature probe produced no result");
                return;
            }
            state.set_features(FeatureFlags::from_lines(&out));
        }))
    }
}
