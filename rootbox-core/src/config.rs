//! Runtime configuration.
//!
//! Defaults match a stock Magisk layout. Values can come from a TOML file,
//! then environment overrides (`ROOTBOX_CACHE_DIR`, `ROOTBOX_SU`), then CLI
//! flags applied by the binary.

use anyhow::{bail, Context, Result};
use rootbox_workflow::SchedulerConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CACHE_DIR_ENV: &str = "ROOTBOX_CACHE_DIR";
pub const SU_BINARY_ENV: &str = "ROOTBOX_SU";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Private cache directory holding the staged `install.zip`.
    pub cache_dir: PathBuf,
    /// Scratch path installers use; wiped after every install.
    pub tmp_work_dir: PathBuf,
    /// Root of installed modules.
    pub magisk_path: PathBuf,
    /// Directory of the MagiskHide control scripts (trailing slash kept).
    pub hide_path: String,
    pub disable_file: PathBuf,
    /// First line of `updater-script` must contain this.
    pub script_marker: String,
    /// `grep` pattern used when listing `/dev/block`.
    pub block_pattern: String,
    pub su_binary: String,
    pub sh_binary: String,
    pub unprivileged_workers: usize,
    /// Unset means sessions may block forever on the root broker.
    pub session_timeout_secs: Option<u64>,
    /// Packages never shown in the app list.
    pub app_denylist: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: env::temp_dir().join("rootbox"),
            tmp_work_dir: PathBuf::from("/dev/tmp"),
            magisk_path: PathBuf::from("/magisk"),
            hide_path: "/magisk/.core/magiskhide/".to_string(),
            disable_file: PathBuf::from("/cache/.disable_magisk"),
            script_marker: "#MAGISK".to_string(),
            block_pattern: "mmc".to_string(),
            su_binary: "su".to_string(),
            sh_binary: "sh".to_string(),
            unprivileged_workers: rootbox_workflow::scheduler::DEFAULT_UNPRIVILEGED_WORKERS,
            session_timeout_secs: None,
            app_denylist: vec![
                "android".to_string(),
                "com.android.systemui".to_string(),
                "com.google.android.gms".to_string(),
                "com.topjohnwu.magisk".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load from `path` (if any) and apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut cfg = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        cfg.apply_env();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_env(&mut self) {
        if let Some(dir) = env::var_os(CACHE_DIR_ENV) {
            self.cache_dir = PathBuf::from(dir);
        }
        if let Ok(su) = env::var(SU_BINARY_ENV) {
            if !su.trim().is_empty() {
                self.su_binary = su;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.script_marker.is_empty() {
            bail!("script_marker must not be empty");
        }
        if self.unprivileged_workers == 0 {
            bail!("unprivileged_workers must be at least 1");
        }
        if self.cache_dir.as_os_str().is_empty() {
            bail!("cache_dir must not be empty");
        }
        // Cleanup wipes everything inside the cache dir, from whatever cwd su starts in.
        if !self.cache_dir.is_absolute() {
            bail!("cache_dir must be an absolute path: {}", self.cache_dir.display());
        }
        if self.cache_dir.parent().is_none() {
            bail!("cache_dir must not be a filesystem root");
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> Option<Duration> {
        self.session_timeout_secs.map(Duration::from_secs)
    }

    pub fn scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            unprivileged_workers: self.unprivileged_workers,
        }
    }
}
