//! Copies a source archive into the single cache slot.

use crate::source::{ContentResolver, SourceHandle};
use rootbox_error::{StagingError, StagingResult};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const STAGED_FILE_NAME: &str = "install.zip";

const COPY_BUFFER_SIZE: usize = 8 * 1024;

/// Owner of `<cache_dir>/install.zip`.
///
/// There is exactly one slot, so a flash must hold [`Stager::lock_slot`] from
/// staging until its cleanup has run; overlapping flashes queue on that lock.
#[derive(Debug)]
pub struct Stager {
    cache_dir: PathBuf,
    slot: Mutex<()>,
}

impl Stager {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            slot: Mutex::new(()),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    pub fn staged_path(&self) -> PathBuf {
        self.cache_dir.join(STAGED_FILE_NAME)
    }

    pub fn lock_slot(&self) -> MutexGuard<'_, ()> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the slot's contents with the bytes behind `handle`.
    pub fn stage(
        &self,
        handle: &SourceHandle,
        resolver: &dyn ContentResolver,
    ) -> StagingResult<PathBuf> {
        let target = self.staged_path();
        fs::create_dir_all(&self.cache_dir).map_err(|source| StagingError::Write {
            path: self.cache_dir.clone(),
            source,
        })?;

        match fs::remove_file(&target) {
            Ok(()) => log::debug!("removed previously staged {}", target.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(source) => {
                log::error!("failed to remove existing {}: {}", target.display(), source);
                return Err(StagingError::Cleanup {
                    path: target,
                    source,
                });
            }
        }

        let mut input = resolver.open(handle.uri()).map_err(|err| {
            log::error!("cannot open {}: {}", handle.uri(), err);
            match err.kind() {
                io::ErrorKind::NotFound => StagingError::NotFound(handle.uri().to_string()),
                io::ErrorKind::Unsupported => StagingError::Unsupported(err.to_string()),
                _ => StagingError::Open {
                    uri: handle.uri().to_string(),
                    source: err,
                },
            }
        })?;

        let output = File::create(&target).map_err(|source| StagingError::Write {
            path: target.clone(),
            source,
        })?;

        if let Err(err) = copy_stream(&mut input, output, &target) {
            let _ = fs::remove_file(&target);
            return Err(err);
        }

        log::debug!("staged {} at {}", handle.name(), target.display());
        Ok(target)
    }
}

fn copy_stream(input: &mut dyn Read, mut output: File, target: &Path) -> StagingResult<u64> {
    let write_err = |source| StagingError::Write {
        path: target.to_path_buf(),
        source,
    };
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    let mut total = 0u64;
    loop {
        let read = match input.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(StagingError::Read(err)),
        };
        output.write_all(&buffer[..read]).map_err(write_err)?;
        total += read as u64;
    }
    output.sync_all().map_err(write_err)?;
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FileResolver;
    use tempfile::tempdir;
    use url::Url;

    fn handle_for(path: &Path) -> SourceHandle {
        SourceHandle::resolve(Url::from_file_path(path).unwrap(), &FileResolver)
    }

    #[test]
    fn staged_copy_is_byte_identical() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("module.zip");
        // Larger than one buffer so the loop runs more than once.
        let payload: Vec<u8> = (0..(COPY_BUFFER_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &payload).unwrap();

        let stager = Stager::new(tmp.path().join("cache"));
        let staged = stager.stage(&handle_for(&src), &FileResolver).unwrap();

        assert_eq!(staged, tmp.path().join("cache").join(STAGED_FILE_NAME));
        assert_eq!(fs::read(&staged).unwrap(), payload);
    }

    #[test]
    fn restaging_leaves_one_file_with_latest_contents() {
        let tmp = tempdir().unwrap();
        let first = tmp.path().join("first.zip");
        let second = tmp.path().join("second.zip");
        fs::write(&first, b"first archive, longer than the second").unwrap();
        fs::write(&second, b"second").unwrap();

        let cache = tmp.path().join("cache");
        let stager = Stager::new(&cache);
        stager.stage(&handle_for(&first), &FileResolver).unwrap();
        let staged = stager.stage(&handle_for(&second), &FileResolver).unwrap();

        assert_eq!(fs::read(&staged).unwrap(), b"second");
        assert_eq!(fs::read_dir(&cache).unwrap().count(), 1);
    }

    #[test]
    fn missing_source_is_not_found() {
        let tmp = tempdir().unwrap();
        let stager = Stager::new(tmp.path().join("cache"));
        let err = stager
            .stage(&handle_for(&tmp.path().join("gone.zip")), &FileResolver)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn undeletable_slot_is_a_hard_failure() {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("a.zip");
        fs::write(&src, b"zip").unwrap();
        let cache = tmp.path().join("cache");
        // A directory squatting on the slot cannot be removed with remove_file.
        fs::create_dir_all(cache.join(STAGED_FILE_NAME)).unwrap();

        let stager = Stager::new(&cache);
        let err = stager.stage(&handle_for(&src), &FileResolver).unwrap_err();
        assert!(matches!(err, StagingError::Cleanup { .. }));
        assert!(cache.join(STAGED_FILE_NAME).is_dir());
    }

    #[test]
    fn read_failure_removes_partial_file() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::other("device went away"))
            }
        }
        struct BrokenResolver;
        impl ContentResolver for BrokenResolver {
            fn open(&self, _uri: &Url) -> io::Result<Box<dyn Read + Send>> {
                Ok(Box::new(Broken))
            }
            fn display_name(&self, _uri: &Url) -> Option<String> {
                None
            }
        }

        let tmp = tempdir().unwrap();
        let stager = Stager::new(tmp.path());
        let handle = SourceHandle::with_name(Url::parse("content://x/y").unwrap(), "y");
        let err = stager.stage(&handle, &BrokenResolver).unwrap_err();

        assert!(matches!(err, StagingError::Read(_)));
        assert!(!stager.staged_path().exists());
    }
}
