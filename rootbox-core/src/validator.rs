//! Flashable zip validation.
//!
//! Only the installer subtree is unpacked next to the staged archive; the
//! package is accepted when the first line of `updater-script` carries the
//! marker. Anything that goes wrong here means "invalid package", never an
//! error.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub const INSTALLER_DIR: &str = "META-INF/com/google/android";
pub const UPDATER_SCRIPT: &str = "updater-script";
pub const UPDATE_BINARY: &str = "update-binary";

/// Directory the installer subtree is extracted into.
pub fn extract_root(staged: &Path) -> PathBuf {
    staged
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn installer_path(staged: &Path, file: &str) -> PathBuf {
    extract_root(staged).join(INSTALLER_DIR).join(file)
}

pub fn validate(staged: &Path, marker: &str) -> bool {
    let root = extract_root(staged);
    // A script left over from an earlier package must not vouch for this one.
    let stale = root.join(INSTALLER_DIR);
    if let Err(err) = fs::remove_dir_all(&stale) {
        if err.kind() != io::ErrorKind::NotFound {
            log::warn!("cannot clear {}: {}", stale.display(), err);
            return false;
        }
    }

    if let Err(err) = extract_installer(staged, &root) {
        log::warn!("failed to extract installer from {}: {:#}", staged.display(), err);
        return false;
    }

    let script = installer_path(staged, UPDATER_SCRIPT);
    let lines = match read_lines(&script) {
        Ok(lines) => lines,
        Err(err) => {
            log::warn!("cannot read {}: {}", script.display(), err);
            return false;
        }
    };

    match lines.first() {
        Some(first) if first.contains(marker) => true,
        Some(first) => {
            log::warn!("{} lacks {} marker (first line: {:?})", script.display(), marker, first);
            false
        }
        None => {
            log::warn!("{} is empty", script.display());
            false
        }
    }
}

/// Unpack entries under [`INSTALLER_DIR`] into `dest`. Returns the number of
/// files written.
pub fn extract_installer(archive_path: &Path, dest: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(file).context("failed to read zip")?;

    let mut written = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.name().starts_with(INSTALLER_DIR) {
            continue;
        }
        let outpath = match entry.enclosed_name() {
            Some(path) => dest.join(path),
            None => continue,
        };
        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&outpath)
            .with_context(|| format!("failed to create {}", outpath.display()))?;
        io::copy(&mut entry, &mut out)?;
        written += 1;
    }
    Ok(written)
}

fn read_lines(path: &Path) -> io::Result<Vec<String>> {
    BufReader::new(File::open(path)?).lines().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;
    use zip::write::{FileOptions, ZipWriter};

    fn write_zip(path: &Path, entries: &[(&str, &str)]) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, FileOptions::default()).unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[test]
    fn accepts_marker_on_first_line() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        write_zip(
            &staged,
            &[
                ("META-INF/com/google/android/updater-script", "#MAGISK\n"),
                ("META-INF/com/google/android/update-binary", "#!/sbin/sh\n"),
                ("system/bin/tool", "payload"),
            ],
        );

        assert!(validate(&staged, "#MAGISK"));
        assert!(installer_path(&staged, UPDATE_BINARY).exists());
        // Only the installer subtree is unpacked.
        assert!(!tmp.path().join("system").exists());
    }

    #[test]
    fn rejects_generic_zip() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        write_zip(
            &staged,
            &[(
                "META-INF/com/google/android/updater-script",
                "generic flashable zip\n#MAGISK\n",
            )],
        );
        assert!(!validate(&staged, "#MAGISK"));
    }

    #[test]
    fn rejects_zip_without_script() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        write_zip(&staged, &[("README.md", "hello")]);
        assert!(!validate(&staged, "#MAGISK"));
    }

    #[test]
    fn rejects_empty_script() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        write_zip(&staged, &[("META-INF/com/google/android/updater-script", "")]);
        assert!(!validate(&staged, "#MAGISK"));
    }

    #[test]
    fn stale_script_from_previous_package_is_ignored() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        write_zip(
            &staged,
            &[("META-INF/com/google/android/updater-script", "#MAGISK\n")],
        );
        assert!(validate(&staged, "#MAGISK"));

        write_zip(&staged, &[("README.md", "no installer here")]);
        assert!(!validate(&staged, "#MAGISK"));
    }

    #[test]
    fn rejects_non_zip() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        fs::write(&staged, b"not a zip").unwrap();
        assert!(!validate(&staged, "#MAGISK"));
    }

    #[test]
    fn marker_may_appear_anywhere_on_the_first_line() {
        let tmp = tempdir().unwrap();
        let staged = tmp.path().join("install.zip");
        write_zip(
            &staged,
            &[("META-INF/com/google/android/updater-script", "# built for #MAGISK v12\n")],
        );
        assert!(validate(&staged, "#MAGISK"));
    }
}
