//! Online module repository listing.

use super::{Module, Ops};
use crate::events::Event;
use anyhow::{Context, Result};
use rootbox_workflow::{Submission, Task};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub version_code: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub zip_url: Option<String>,
    /// Set when an installed module with the same id is older.
    #[serde(skip)]
    pub update_available: bool,
}

/// Supplies repository entries.
pub trait RepoSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<Repo>>;
}

/// Repository listing read from a local JSON array.
pub struct JsonRepoSource {
    path: PathBuf,
}

impl JsonRepoSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RepoSource for JsonRepoSource {
    fn fetch(&self) -> Result<Vec<Repo>> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read repo list: {}", self.path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse repo list: {}", self.path.display()))
    }
}

impl Ops {
    /// Refresh repositories against installed modules, then fire
    /// [`Event::RepoLoadDone`]. A failed fetch keeps the previous listing.
    pub fn load_repos(&self, source: Arc<dyn RepoSource>) -> Submission {
        let state = self.state.clone();
        let events = self.events.clone();

        let task = Task::unprivileged("load repos", move |_| match source.fetch() {
            Ok(repos) => state.set_repos(mark_updates(repos, &state.modules())),
            Err(err) => log::warn!("repo refresh failed: {:#}", err),
        })
        .on_complete(move |()| events.trigger(Event::RepoLoadDone));
        self.scheduler.submit(task)
    }
}

fn mark_updates(repos: Vec<Repo>, installed: &BTreeMap<String, Module>) -> BTreeMap<String, Repo> {
    repos
        .into_iter()
        .map(|mut repo| {
            repo.update_available = installed
                .get(&repo.id)
                .is_some_and(|module| module.version_code < repo.version_code);
            (repo.id.clone(), repo)
        })
        .collect()
}
