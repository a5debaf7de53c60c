//! Wiring of scheduler, shell, state and flasher for one process.

use crate::config::Config;
use crate::events::Events;
use crate::flash::{Flasher, Notifier};
use crate::ops::Ops;
use crate::staging::Stager;
use crate::state::DeviceState;
use anyhow::{Context, Result};
use rootbox_error::{RootboxError, RootboxResult};
use rootbox_hal::{Shell, SuShell};
use rootbox_workflow::{MainHandle, Scheduler, Submission};
use std::sync::Arc;

/// Real shell built from config.
pub fn su_shell(config: &Config) -> SuShell {
    SuShell::new(
        config.su_binary.clone(),
        config.sh_binary.clone(),
        config.session_timeout(),
    )
}

/// Error out unless the task actually went onto a pool.
pub fn ensure_queued(submission: Submission) -> RootboxResult<()> {
    match submission {
        Submission::Queued => Ok(()),
        Submission::Skipped => Err(RootboxError::RootUnavailable),
        Submission::Rejected => Err(RootboxError::SchedulerShutDown),
    }
}

pub struct Rootbox {
    ops: Ops,
    flasher: Flasher,
}

impl Rootbox {
    /// Start the worker pools. Callbacks are delivered through `main`.
    pub fn new(
        config: Config,
        shell: Arc<dyn Shell>,
        notifier: Arc<dyn Notifier>,
        main: MainHandle,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|err| RootboxError::Config(format!("{:#}", err)))?;
        let probe_shell = shell.clone();
        let scheduler = Scheduler::new(
            &config.scheduler(),
            Arc::new(move || probe_shell.root_access()),
            main,
        )
        .context("failed to start scheduler")?;

        let stager = Arc::new(Stager::new(config.cache_dir.clone()));
        let ops = Ops::new(
            scheduler,
            shell,
            Arc::new(DeviceState::new()),
            Arc::new(Events::new()),
            Arc::new(config),
        );
        let flasher = Flasher::new(ops.clone(), stager, notifier);
        log::debug!("runtime ready (cache: {})", ops.config().cache_dir.display());
        Ok(Self { ops, flasher })
    }

    pub fn ops(&self) -> &Ops {
        &self.ops
    }

    pub fn flasher(&self) -> &Flasher {
        &self.flasher
    }

    pub fn config(&self) -> &Config {
        self.ops.config()
    }

    /// Stop accepting work and let queued tasks drain.
    pub fn shutdown(&self) {
        self.ops.scheduler().shutdown();
    }
}

impl Drop for Rootbox {
    fn drop(&mut self) {
        self.shutdown();
    }
}
