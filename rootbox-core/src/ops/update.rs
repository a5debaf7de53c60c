//! Remote version check.

use super::Ops;
use crate::events::Event;
use anyhow::{Context, Result};
use rootbox_workflow::{Submission, Task};
use serde::Deserialize;
use std::sync::Arc;

/// Latest published release.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteInfo {
    #[serde(rename = "versionCode")]
    pub version_code: f64,
    pub link: String,
    pub note: String,
}

#[derive(Deserialize)]
struct UpdateDocument {
    magisk: RemoteInfo,
}

/// Fetches the raw update document, e.g. over HTTP.
pub trait UpdateSource: Send + Sync {
    fn fetch(&self) -> Result<String>;
}

impl RemoteInfo {
    /// Parse `{"magisk": {"versionCode": .., "link": .., "note": ..}}`.
    pub fn parse(json: &str) -> Result<Self> {
        let doc: UpdateDocument =
            serde_json::from_str(json).context("Failed to parse update document")?;
        Ok(doc.magisk)
    }
}

impl Ops {
    /// Fetch release info, then fire [`Event::UpdateCheckDone`] whether or
    /// not the check succeeded.
    pub fn check_updates(&self, source: Arc<dyn UpdateSource>) -> Submission {
        let state = self.state.clone();
        let events = self.events.clone();

        let task = Task::unprivileged("check updates", move |_| {
            match source.fetch().and_then(|json| RemoteInfo::parse(&json)) {
                Ok(info) => {
                    log::info!("latest release: {}", info.version_code);
                    state.set_remote(info);
                }
                Err(err) => log::warn!("update check failed: {:#}", err),
            }
        })
        .on_complete(move |()| events.trigger(Event::UpdateCheckDone));
        self.scheduler.submit(task)
    }
}
