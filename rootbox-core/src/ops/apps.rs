//! Installed application list for the hide UI.

use super::{su_lines, Ops};
use crate::events::Event;
use anyhow::Result;
use rootbox_hal::Shell;
use rootbox_workflow::{Submission, Task};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub package: String,
    pub label: String,
    pub enabled: bool,
}

/// Enumerates installed applications (package manager collaborator).
pub trait PackageSource: Send + Sync {
    fn installed_apps(&self) -> Result<Vec<AppInfo>>;
}

/// Package source backed by `pm list packages`. Labels are package names.
pub struct PmPackageSource {
    shell: Arc<dyn Shell>,
}

impl PmPackageSource {
    pub fn new(shell: Arc<dyn Shell>) -> Self {
        Self { shell }
    }
}

impl PackageSource for PmPackageSource {
    fn installed_apps(&self) -> Result<Vec<AppInfo>> {
        let enabled = self.shell.sh(&["pm list packages -e".to_string()])?;
        Ok(enabled
            .iter()
            .filter_map(|line| line.strip_prefix("package:"))
            .map(|package| AppInfo {
                package: package.trim().to_string(),
                label: package.trim().to_string(),
                enabled: true,
            })
            .collect())
    }
}

impl Ops {
    /// Load the filtered, sorted app list plus the current hide list, then
    /// fire [`Event::PackageLoadDone`].
    pub fn load_apps(&self, source: Arc<dyn PackageSource>) -> Submission {
        let shell = self.shell.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let denylist = self.config.app_denylist.clone();
        let hide_list_cmd = format!("{}list", self.config.hide_path);

        let task = Task::privileged("load apps", move |_| {
            let apps = match source.installed_apps() {
                Ok(apps) => apps,
                Err(err) => {
                    log::warn!("failed to enumerate packages: {:#}", err);
                    Vec::new()
                }
            };
            state.set_apps(filter_and_sort(apps, &denylist));
            state.set_hide_list(su_lines(shell.as_ref(), vec![hide_list_cmd]));
        })
        .on_complete(move |()| events.trigger(Event::PackageLoadDone));
        self.scheduler.submit(task)
    }
}

fn filter_and_sort(apps: Vec<AppInfo>, denylist: &[String]) -> Vec<AppInfo> {
    let mut apps: Vec<AppInfo> = apps
        .into_iter()
        .filter(|app| app.enabled && !denylist.contains(&app.package))
        .collect();
    apps.sort_by_cached_key(|app| app.label.to_lowercase());
    apps
}
