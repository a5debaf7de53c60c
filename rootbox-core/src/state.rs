//! Shared device state written by background tasks and read by the UI.

use crate::ops::{AppInfo, FeatureFlags, Module, RemoteInfo, Repo};
use rootbox_workflow::Memo;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct DeviceState {
    block_list: Mutex<Vec<String>>,
    boot_block: Memo<String>,
    apps: Mutex<Vec<AppInfo>>,
    hide_list: Mutex<Vec<String>>,
    modules: Mutex<BTreeMap<String, Module>>,
    repos: Mutex<BTreeMap<String, Repo>>,
    remote: Mutex<Option<RemoteInfo>>,
    safety_result: Mutex<Option<i32>>,
    features: Mutex<Option<FeatureFlags>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl DeviceState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn block_list(&self) -> Vec<String> {
        lock(&self.block_list).clone()
    }

    pub fn set_block_list(&self, blocks: Vec<String>) {
        *lock(&self.block_list) = blocks;
    }

    /// Boot partition; detected once, then fixed for the life of the process.
    pub fn boot_block(&self) -> &Memo<String> {
        &self.boot_block
    }

    pub fn apps(&self) -> Vec<AppInfo> {
        lock(&self.apps).clone()
    }

    pub fn set_apps(&self, apps: Vec<AppInfo>) {
        *lock(&self.apps) = apps;
    }

    pub fn hide_list(&self) -> Vec<String> {
        lock(&self.hide_list).clone()
    }

    pub fn set_hide_list(&self, packages: Vec<String>) {
        *lock(&self.hide_list) = packages;
    }

    pub fn modules(&self) -> BTreeMap<String, Module> {
        lock(&self.modules).clone()
    }

    pub fn set_modules(&self, modules: BTreeMap<String, Module>) {
        *lock(&self.modules) = modules;
    }

    pub fn repos(&self) -> BTreeMap<String, Repo> {
        lock(&self.repos).clone()
    }

    pub fn set_repos(&self, repos: BTreeMap<String, Repo>) {
        *lock(&self.repos) = repos;
    }

    pub fn remote(&self) -> Option<RemoteInfo> {
        lock(&self.remote).clone()
    }

    pub fn set_remote(&self, info: RemoteInfo) {
        *lock(&self.remote) = Some(info);
    }

    pub fn safety_result(&self) -> Option<i32> {
        *lock(&self.safety_result)
    }

    pub fn set_safety_result(&self, code: i32) {
        *lock(&self.safety_result) = Some(code);
    }

    pub fn features(&self) -> Option<FeatureFlags> {
        *lock(&self.features)
    }

    pub fn set_features(&self, flags: FeatureFlags) {
        *lock(&self.features) = Some(flags);
    }
}
