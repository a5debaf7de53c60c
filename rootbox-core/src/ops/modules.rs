//! Installed module discovery.

use super::{su_lines, Ops};
use crate::events::Event;
use rootbox_hal::Shell;
use rootbox_workflow::{Submission, Task};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const FLAG_PREFIX: &str = "flag=";

/// A module installed under the module root, parsed from `module.prop`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub id: String,
    pub name: String,
    pub version: String,
    pub version_code: i64,
    pub author: String,
    pub description: String,
    /// Scheduled for removal on next boot.
    pub remove: bool,
    pub disable: bool,
    /// Freshly updated; takes effect on next boot.
    pub update: bool,
    pub path: PathBuf,
}

impl Module {
    /// Build a module from `key=value` prop lines and `flag=<name>` markers.
    /// The directory name stands in for a missing `id`.
    pub fn parse(path: &Path, lines: &[String]) -> Self {
        let mut module = Module {
            path: path.to_path_buf(),
            ..Module::default()
        };
        for line in lines {
            let line = line.trim();
            if let Some(flag) = line.strip_prefix(FLAG_PREFIX) {
                match flag {
                    "remove" => module.remove = true,
                    "disable" => module.disable = true,
                    "update" => module.update = true,
                    other => log::debug!("unknown module flag {:?}", other),
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim() {
                "id" => module.id = value,
                "name" => module.name = value,
                "version" => module.version = value,
                "versionCode" => module.version_code = value.parse().unwrap_or(0),
                "author" => module.author = value,
                "description" => module.description = value,
                _ => {}
            }
        }
        if module.id.is_empty() {
            module.id = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
        }
        if module.name.is_empty() {
            module.name = module.id.clone();
        }
        module
    }
}

impl Ops {
    /// Rescan installed modules, then fire [`Event::ModuleLoadDone`].
    pub fn load_modules(&self) -> Submission {
        let shell = self.shell.clone();
        let state = self.state.clone();
        let events = self.events.clone();
        let root = self.config.magisk_path.clone();

        let task = Task::privileged("load modules", move |_| {
            let modules = scan_modules(shell.as_ref(), &root);
            log::info!("found {} module(s) under {}", modules.len(), root.display());
            state.set_modules(modules);
        })
        .on_complete(move |()| events.trigger(Event::ModuleLoadDone));
        self.scheduler.submit(task)
    }
}

fn scan_modules(shell: &dyn Shell, root: &Path) -> BTreeMap<String, Module> {
    let listing = format!(
        "find {} -mindepth 1 -maxdepth 1 -type d ! -name '.core' ! -name 'lost+found'",
        root.display()
    );
    let mut modules = BTreeMap::new();
    for dir in su_lines(shell, vec![listing]) {
        let dir = PathBuf::from(dir.trim());
        if dir.as_os_str().is_empty() {
            continue;
        }
        let lines = su_lines(shell, module_batch(&dir));
        let module = Module::parse(&dir, &lines);
        modules.insert(module.id.clone(), module);
    }
    modules
}

fn module_batch(dir: &Path) -> Vec<String> {
    let dir = dir.display();
    let mut lines = vec![format!("cat {}/module.prop", dir)];
    for flag in ["remove", "disable", "update"] {
        lines.push(format!("[ -f {}/{} ] && echo {}{}", dir, flag, FLAG_PREFIX, flag));
    }
    lines
}
