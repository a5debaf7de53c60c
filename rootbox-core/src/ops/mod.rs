//! Named background operations.
//!
//! Each operation is a small task submitted to the scheduler. Privileged ones
//! are skipped outright without root, in which case their completion signal
//! never fires.

mod apps;
mod blocks;
mod features;
mod hide;
mod modules;
mod reboot;
mod repos;
mod safety;
mod update;

pub use apps::{AppInfo, PackageSource, PmPackageSource};
pub use blocks::BOOT_DETECT_SCRIPT;
pub use features::FeatureFlags;
pub use modules::Module;
pub use reboot::REBOOT_COMMAND;
pub use repos::{JsonRepoSource, Repo, RepoSource};
pub use safety::SafetyCheck;
pub use update::{RemoteInfo, UpdateSource};

use crate::config::Config;
use crate::events::Events;
use crate::state::DeviceState;
use rootbox_hal::Shell;
use rootbox_workflow::Scheduler;
use std::sync::Arc;

/// Handle bundling everything the operations need. Cheap to clone.
#[derive(Clone)]
pub struct Ops {
    scheduler: Scheduler,
    shell: Arc<dyn Shell>,
    state: Arc<DeviceState>,
    events: Arc<Events>,
    config: Arc<Config>,
}

impl Ops {
    pub fn new(
        scheduler: Scheduler,
        shell: Arc<dyn Shell>,
        state: Arc<DeviceState>,
        events: Arc<Events>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            scheduler,
            shell,
            state,
            events,
            config,
        }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn shell(&self) -> &Arc<dyn Shell> {
        &self.shell
    }

    pub fn state(&self) -> &Arc<DeviceState> {
        &self.state
    }

    pub fn events(&self) -> &Arc<Events> {
        &self.events
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}

/// Run an elevated batch, logging and swallowing failure.
fn su_lines(shell: &dyn Shell, lines: Vec<String>) -> Vec<String> {
    match shell.su(&lines) {
        Ok(out) => out,
        Err(err) => {
            log::warn!("su batch {:?} failed: {}", lines, err);
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rootbox_hal::FakeShell;
    use rootbox_workflow::{MainLoop, SchedulerConfig};

    pub(crate) struct Harness {
        pub main: MainLoop,
        pub shell: FakeShell,
        pub ops: Ops,
    }

    impl Harness {
        pub fn new(root: bool) -> Self {
            Self::with_config(root, Config::default())
        }

        pub fn with_config(root: bool, config: Config) -> Self {
            let main = MainLoop::new();
            let shell = FakeShell::new(root);
            let probe_shell = shell.clone();
            let scheduler = Scheduler::new(
                &SchedulerConfig::default(),
                Arc::new(move || probe_shell.root_access()),
                main.handle(),
            )
            .unwrap();
            let ops = Ops::new(
                scheduler,
                Arc::new(shell.clone()),
                Arc::new(DeviceState::new()),
                Arc::new(Events::new()),
                Arc::new(config),
            );
            Self { main, shell, ops }
        }

        pub fn settle(&self) {
            self.main.run_until_idle(self.ops.scheduler());
        }
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            self.ops.scheduler().shutdown();
        }
    }
}
