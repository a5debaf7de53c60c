//! Shell batches issued by a flash.

use crate::validator::{installer_path, UPDATE_BINARY};
use std::path::Path;

/// Echoes the installer's exit status as the final output line.
pub const EXIT_SENTINEL: &str = "if [ $? -eq 0 ]; then echo true; else echo false; fi";

pub fn install_batch(staged: &Path) -> Vec<String> {
    vec![
        format!(
            "BOOTMODE=true sh {} dummy 1 {}",
            installer_path(staged, UPDATE_BINARY).display(),
            staged.display()
        ),
        EXIT_SENTINEL.to_string(),
    ]
}

/// Wipes everything next to the staged archive plus the installer scratch dir.
pub fn cleanup_batch(extract_root: &Path, tmp_work_dir: &Path) -> Vec<String> {
    vec![
        format!("rm -rf {}/*", extract_root.display()),
        format!("rm -rf {}", tmp_work_dir.display()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_batch_runs_update_binary_then_sentinel() {
        let batch = install_batch(Path::new("/data/rootbox/cache/install.zip"));
        assert_eq!(
            batch,
            vec![
                "BOOTMODE=true sh /data/rootbox/cache/META-INF/com/google/android/update-binary dummy 1 /data/rootbox/cache/install.zip".to_string(),
                EXIT_SENTINEL.to_string(),
            ]
        );
    }

    #[test]
    fn cleanup_batch_targets_cache_and_tmp() {
        assert_eq!(
            cleanup_batch(Path::new("/data/rootbox/cache"), Path::new("/dev/tmp")),
            vec!["rm -rf /data/rootbox/cache/*", "rm -rf /dev/tmp"]
        );
    }
}
