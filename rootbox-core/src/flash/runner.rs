//! The flash state machine and its post-processing.

use super::commands::{cleanup_batch, install_batch};
use super::outcome::{classify, FlashOutcome, Notice};
use crate::events::Event;
use crate::ops::Ops;
use crate::source::{ContentResolver, SourceHandle};
use crate::staging::Stager;
use crate::validator;
use anyhow::Result;
use rootbox_error::{FlashError, StagingError};
use rootbox_hal::Shell;
use rootbox_workflow::{Submission, Task};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

pub const COPYING_LABEL: &str = "Copying zip file to temporary folder";

/// User-facing side of a flash.
pub trait Notifier: Send + Sync {
    fn progress(&self, label: &str);
    fn notify(&self, notice: &Notice);
    /// Ask whether to reboot now. Returning false does nothing.
    fn offer_reboot(&self) -> bool;
}

/// Hook run before the archive is copied; an error aborts the flash.
pub trait PreStage: Send + Sync {
    fn run(&self, handle: &SourceHandle) -> Result<()>;
}

/// What to flash and how to read it.
#[derive(Clone)]
pub struct FlashRequest {
    handle: SourceHandle,
    resolver: Arc<dyn ContentResolver>,
    pre_stage: Option<Arc<dyn PreStage>>,
}

impl FlashRequest {
    /// Display name comes from the resolver, else the URI's last segment.
    pub fn new(uri: Url, resolver: Arc<dyn ContentResolver>) -> Self {
        let handle = SourceHandle::resolve(uri, resolver.as_ref());
        Self {
            handle,
            resolver,
            pre_stage: None,
        }
    }

    pub fn with_name(uri: Url, name: impl Into<String>, resolver: Arc<dyn ContentResolver>) -> Self {
        Self {
            handle: SourceHandle::with_name(uri, name),
            resolver,
            pre_stage: None,
        }
    }

    pub fn pre_stage(mut self, hook: Arc<dyn PreStage>) -> Self {
        self.pre_stage = Some(hook);
        self
    }

    pub fn handle(&self) -> &SourceHandle {
        &self.handle
    }
}

#[derive(Clone)]
pub struct Flasher {
    ops: Ops,
    stager: Arc<Stager>,
    notifier: Arc<dyn Notifier>,
}

impl Flasher {
    pub fn new(ops: Ops, stager: Arc<Stager>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ops,
            stager,
            notifier,
        }
    }

    /// Queue a flash on the privileged pool.
    pub fn submit(&self, request: FlashRequest) -> Submission {
        self.submit_with(request, |_| {})
    }

    /// Like [`Flasher::submit`], also handing the outcome to `on_done` on the
    /// main loop once post-processing has run.
    pub fn submit_with(
        &self,
        request: FlashRequest,
        on_done: impl FnOnce(&FlashOutcome) + Send + 'static,
    ) -> Submission {
        let name = format!("flash {}", request.handle().name());
        let handle = request.handle().clone();
        let runner = self.clone();
        let finisher = self.clone();
        let notifier = self.notifier.clone();

        let task = Task::privileged(name, move |progress| {
            runner.run(&request, &|label| progress.publish(label))
        })
        .on_progress(move |label| notifier.progress(&label))
        .on_complete(move |outcome| {
            finisher.finish(&outcome, &handle);
            on_done(&outcome);
        });
        self.ops.scheduler().submit(task)
    }

    /// Run one flash to completion on the calling thread. The staging slot is
    /// held throughout, so concurrent flashes queue here.
    pub fn run(&self, request: &FlashRequest, report: &dyn Fn(String)) -> FlashOutcome {
        let _slot = self.stager.lock_slot();
        let config = self.ops.config();
        let handle = request.handle();

        report(COPYING_LABEL.to_string());
        let staged = match self.stage(request) {
            Ok(path) => path,
            Err(err) => {
                log::error!("staging {} failed: {}", handle.name(), err);
                return FlashOutcome::ManualInstall(FlashError::Staging(err));
            }
        };

        if !validator::validate(&staged, &config.script_marker) {
            log::warn!("{} is not a valid package", handle.name());
            return FlashOutcome::InvalidPackage;
        }

        report(format!("Installing {}", handle.name()));
        let shell = self.ops.shell();
        let result = shell.su(&install_batch(&staged));
        if let Ok(lines) = &result {
            for line in lines {
                log::debug!("installer: {}", line);
            }
        }

        let root = validator::extract_root(&staged);
        if let Err(err) = shell.su(&cleanup_batch(&root, &config.tmp_work_dir)) {
            log::warn!("cleanup after installing {} failed: {}", handle.name(), err);
        }

        let outcome = classify(result);
        log::info!("flash of {}: {}", handle.name(), outcome);
        outcome
    }

    fn stage(&self, request: &FlashRequest) -> Result<PathBuf, StagingError> {
        if let Some(hook) = &request.pre_stage {
            hook.run(&request.handle)
                .map_err(|err| StagingError::PreStage(format!("{:#}", err)))?;
        }
        self.stager.stage(&request.handle, request.resolver.as_ref())
    }

    /// Post-processing on the main loop; exactly one branch per outcome.
    fn finish(&self, outcome: &FlashOutcome, handle: &SourceHandle) {
        match outcome {
            FlashOutcome::Success => {
                self.ops.events().trigger(Event::UpdateCheckDone);
                self.ops.load_modules();
                if self.notifier.offer_reboot() {
                    self.ops.reboot();
                }
            }
            FlashOutcome::InvalidPackage => self.notifier.notify(&Notice::InvalidPackage {
                name: handle.name().to_string(),
            }),
            FlashOutcome::ManualInstall(err) => self.notifier.notify(&Notice::ManualInstall {
                name: handle.name().to_string(),
                error: err.to_string(),
                source_path: handle.path().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::ops::testing::Harness;
    use crate::ops::REBOOT_COMMAND;
    use crate::source::FileResolver;
    use anyhow::bail;
    use rootbox_hal::batch;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::{tempdir, TempDir};
    use zip::write::{FileOptions, ZipWriter};

    #[derive(Default)]
    struct Recorder {
        accept_reboot: bool,
        progress: Mutex<Vec<String>>,
        notices: Mutex<Vec<Notice>>,
        offers: Mutex<usize>,
    }

    impl Notifier for Recorder {
        fn progress(&self, label: &str) {
            self.progress.lock().unwrap().push(label.to_string());
        }

        fn notify(&self, notice: &Notice) {
            self.notices.lock().unwrap().push(notice.clone());
        }

        fn offer_reboot(&self) -> bool {
            *self.offers.lock().unwrap() += 1;
            self.accept_reboot
        }
    }

    struct Fixture {
        _tmp: TempDir,
        h: Harness,
        flasher: Flasher,
        recorder: Arc<Recorder>,
        source_dir: PathBuf,
        cache_dir: PathBuf,
    }

    fn fixture(accept_reboot: bool) -> Fixture {
        let tmp = tempdir().unwrap();
        let cache_dir = tmp.path().join("cache");
        let source_dir = tmp.path().join("sdcard");
        fs::create_dir_all(&source_dir).unwrap();
        let config = Config {
            cache_dir: cache_dir.clone(),
            ..Config::default()
        };
        let h = Harness::with_config(true, config);
        let recorder = Arc::new(Recorder {
            accept_reboot,
            ..Recorder::default()
        });
        let flasher = Flasher::new(
            h.ops.clone(),
            Arc::new(Stager::new(&cache_dir)),
            recorder.clone(),
        );
        Fixture {
            _tmp: tmp,
            h,
            flasher,
            recorder,
            source_dir,
            cache_dir,
        }
    }

    fn write_zip(path: &Path, script: &str) {
        let mut zip = ZipWriter::new(File::create(path).unwrap());
        zip.start_file("META-INF/com/google/android/updater-script", FileOptions::default())
            .unwrap();
        zip.write_all(script.as_bytes()).unwrap();
        zip.start_file("META-INF/com/google/android/update-binary", FileOptions::default())
            .unwrap();
        zip.write_all(b"#!/sbin/sh\n").unwrap();
        zip.finish().unwrap();
    }

    fn request(path: &Path) -> FlashRequest {
        let uri = Url::from_file_path(path).unwrap();
        FlashRequest::new(uri, Arc::new(FileResolver))
    }

    fn capture() -> (Arc<Mutex<Option<String>>>, impl FnOnce(&FlashOutcome) + Send + 'static) {
        let slot = Arc::new(Mutex::new(None));
        let sink = slot.clone();
        (slot, move |outcome: &FlashOutcome| {
            *sink.lock().unwrap() = Some(outcome.to_string());
        })
    }

    #[test]
    fn missing_source_needs_manual_install_without_session() {
        let f = fixture(false);
        let missing = f.source_dir.join("missing.zip");

        let outcome = f.flasher.run(&request(&missing), &|_| {});

        match outcome {
            FlashOutcome::ManualInstall(FlashError::Staging(err)) => assert!(err.is_not_found()),
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(f.h.shell.su_batches().is_empty());
    }

    #[test]
    fn generic_zip_is_invalid_without_session() {
        let f = fixture(false);
        let zip = f.source_dir.join("generic.zip");
        write_zip(&zip, "generic flashable zip\n");

        let (seen, on_done) = capture();
        f.flasher.submit_with(request(&zip), on_done);
        f.h.settle();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("invalid package"));
        assert!(f.h.shell.su_batches().is_empty());
        assert_eq!(
            *f.recorder.notices.lock().unwrap(),
            vec![Notice::InvalidPackage {
                name: "generic.zip".to_string()
            }]
        );
    }

    #[test]
    fn successful_install_reloads_modules_and_offers_reboot() {
        let f = fixture(true);
        let zip = f.source_dir.join("magisk.zip");
        write_zip(&zip, "#MAGISK\n");
        f.h.shell.on("BOOTMODE=true", &["- Installing", "true"]);

        let (seen, on_done) = capture();
        f.flasher.submit_with(request(&zip), on_done);
        f.h.settle();

        assert_eq!(seen.lock().unwrap().as_deref(), Some("success"));
        let staged = f.cache_dir.join("install.zip");
        let batches = f.h.shell.su_batches();
        assert_eq!(batches[0], install_batch(&staged));
        assert_eq!(
            batches[1],
            batch([
                format!("rm -rf {}/*", f.cache_dir.display()),
                "rm -rf /dev/tmp".to_string(),
            ])
        );
        assert!(f.h.shell.ran("find /magisk"));
        assert_eq!(f.h.ops.events().fired(Event::UpdateCheckDone), 1);
        assert_eq!(f.h.ops.events().fired(Event::ModuleLoadDone), 1);
        assert_eq!(*f.recorder.offers.lock().unwrap(), 1);
        assert_eq!(f.h.shell.sh_batches(), vec![batch([REBOOT_COMMAND])]);
        assert!(f.recorder.notices.lock().unwrap().is_empty());
        assert_eq!(
            *f.recorder.progress.lock().unwrap(),
            vec![COPYING_LABEL.to_string(), "Installing magisk.zip".to_string()]
        );
    }

    #[test]
    fn declined_reboot_is_a_no_op() {
        let f = fixture(false);
        let zip = f.source_dir.join("magisk.zip");
        write_zip(&zip, "#MAGISK\n");
        f.h.shell.on("BOOTMODE=true", &["true"]);

        f.flasher.submit(request(&zip));
        f.h.settle();

        assert_eq!(*f.recorder.offers.lock().unwrap(), 1);
        assert!(f.h.shell.sh_batches().is_empty());
    }

    #[test]
    fn failed_install_needs_manual_install_and_still_cleans_up() {
        let f = fixture(false);
        let zip = f.source_dir.join("magisk.zip");
        write_zip(&zip, "#MAGISK\n");
        f.h.shell.on("BOOTMODE=true", &["! Unsupported device", "false"]);

        f.flasher.submit(request(&zip));
        f.h.settle();

        assert!(f.h.shell.ran("rm -rf /dev/tmp"));
        assert_eq!(f.h.ops.events().fired(Event::ModuleLoadDone), 0);
        let notices = f.recorder.notices.lock().unwrap();
        match notices.as_slice() {
            [Notice::ManualInstall { source_path, .. }] => {
                assert_eq!(Path::new(source_path), zip.as_path());
            }
            other => panic!("unexpected notices: {:?}", other),
        }
    }

    #[test]
    fn session_failure_still_cleans_up() {
        let f = fixture(false);
        let zip = f.source_dir.join("magisk.zip");
        write_zip(&zip, "#MAGISK\n");
        f.h.shell.fail_on("BOOTMODE=true");

        let outcome = f.flasher.run(&request(&zip), &|_| {});

        assert!(matches!(
            outcome,
            FlashOutcome::ManualInstall(FlashError::Session(_))
        ));
        assert!(f.h.shell.ran("rm -rf /dev/tmp"));
    }

    #[test]
    fn explicit_name_is_used_for_labels() {
        let f = fixture(false);
        let zip = f.source_dir.join("download-1234");
        write_zip(&zip, "#MAGISK\n");
        f.h.shell.on("BOOTMODE=true", &["true"]);
        let uri = Url::from_file_path(&zip).unwrap();
        let labels = Mutex::new(Vec::new());

        f.flasher.run(
            &FlashRequest::with_name(uri, "Magisk-v12.zip", Arc::new(FileResolver)),
            &|label| labels.lock().unwrap().push(label),
        );

        assert_eq!(labels.lock().unwrap()[1], "Installing Magisk-v12.zip");
    }

    #[test]
    fn failing_pre_stage_hook_aborts_before_copy() {
        struct Refuse;
        impl PreStage for Refuse {
            fn run(&self, _handle: &SourceHandle) -> Result<()> {
                bail!("storage not mounted")
            }
        }

        let f = fixture(false);
        let zip = f.source_dir.join("magisk.zip");
        write_zip(&zip, "#MAGISK\n");

        let outcome = f.flasher.run(&request(&zip).pre_stage(Arc::new(Refuse)), &|_| {});

        assert!(matches!(
            outcome,
            FlashOutcome::ManualInstall(FlashError::Staging(StagingError::PreStage(_)))
        ));
        assert!(!f.cache_dir.join("install.zip").exists());
        assert!(f.h.shell.su_batches().is_empty());
    }

    #[test]
    fn flash_is_skipped_without_root() {
        let f = fixture(false);
        f.h.shell.set_root(false);
        let zip = f.source_dir.join("magisk.zip");
        write_zip(&zip, "#MAGISK\n");

        assert_eq!(f.flasher.submit(request(&zip)), Submission::Skipped);
        f.h.settle();
        assert!(f.recorder.notices.lock().unwrap().is_empty());
    }
}
