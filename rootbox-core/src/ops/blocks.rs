//! Block device listing and boot partition detection.

use super::{su_lines, Ops};
use crate::events::Event;
use rootbox_hal::Shell;
use rootbox_workflow::{Submission, Task};

/// Resolves the first known boot partition name under `/dev/block`.
pub const BOOT_DETECT_SCRIPT: &str = "for BLOCK in boot_a kern-a android_boot kernel boot lnx bootimg; do \
DEV=$(find /dev/block -type l -iname $BLOCK 2>/dev/null | head -n 1); \
if [ -n \"$DEV\" ]; then readlink -f $DEV; break; fi; done";

impl Ops {
    /// List block devices and detect the boot partition, then fire
    /// [`Event::BlockDetectionDone`].
    pub fn scan_blocks(&self) -> Submission {
        let ops = self.clone();
        let events = self.events.clone();
        let task = Task::privileged("get boot blocks", move |_| {
            if !ops.shell.root_access() {
                return;
            }
            let listing = format!("ls /dev/block | grep {}", ops.config.block_pattern);
            ops.state
                .set_block_list(su_lines(ops.shell.as_ref(), vec![listing]));
            // Detected on first success, cached from then on.
            ops.state
                .boot_block()
                .get_or_compute(|| detect_boot_image(ops.shell.as_ref()));
        })
        .on_complete(move |()| events.trigger(Event::BlockDetectionDone));
        self.scheduler.submit(task)
    }
}

fn detect_boot_image(shell: &dyn Shell) -> Option<String> {
    let found = su_lines(shell, vec![BOOT_DETECT_SCRIPT.to_string()])
        .into_iter()
        .map(|line| line.trim().to_string())
        .find(|line| !line.is_empty());
    match &found {
        Some(block) => log::info!("boot image: {}", block),
        None => log::warn!("unable to detect boot image"),
    }
    found
}

#[cfg(test)]
mod tests {
    use crate::events::Event;
    use crate::ops::testing::Harness;
    use std::time::Duration;

    #[test]
    fn scan_lists_blocks_and_fires_signal() {
        let h = Harness::new(true);
        h.shell.on("ls /dev/block", &["mmcblk0", "mmcblk0p1", "mmcblk0p9"]);
        h.shell.on("readlink", &["/dev/block/mmcblk0p9"]);

        h.ops.scan_blocks();
        h.settle();

        assert_eq!(
            h.ops.state().block_list(),
            vec!["mmcblk0", "mmcblk0p1", "mmcblk0p9"]
        );
        assert_eq!(
            h.ops.state().boot_block().get().as_deref(),
            Some("/dev/block/mmcblk0p9")
        );
        assert_eq!(h.ops.events().fired(Event::BlockDetectionDone), 1);
    }

    #[test]
    fn boot_block_is_detected_once() {
        let h = Harness::new(true);
        h.shell.on("readlink", &["/dev/block/bootdevice/by-name/boot"]);

        h.ops.scan_blocks();
        h.ops.scan_blocks();
        h.settle();

        assert_eq!(
            h.ops.state().boot_block().get().as_deref(),
            Some("/dev/block/bootdevice/by-name/boot")
        );
        let detections = h
            .shell
            .su_batches()
            .iter()
            .filter(|lines| lines.iter().any(|l| l.contains("readlink")))
            .count();
        assert_eq!(detections, 1);
        assert_eq!(h.ops.events().fired(Event::BlockDetectionDone), 2);
    }

    #[test]
    fn failed_detection_is_retried() {
        let h = Harness::new(true);
        h.ops.scan_blocks();
        h.settle();
        assert_eq!(h.ops.state().boot_block().get(), None);

        h.shell.on("readlink", &["/dev/block/mmcblk0p9"]);
        h.ops.scan_blocks();
        h.settle();
        assert_eq!(
            h.ops.state().boot_block().get().as_deref(),
            Some("/dev/block/mmcblk0p9")
        );
    }

    #[test]
    fn detection_never_overlaps_other_privileged_work() {
        let h = Harness::new(true);
        h.shell.set_delay(Duration::from_millis(50));
        h.shell.on("readlink", &["/dev/block/mmcblk0p9"]);

        h.ops.hide_enable();
        h.ops.scan_blocks();
        h.ops.hide_disable();
        h.settle();

        assert_eq!(h.shell.max_concurrent_su(), 1);
        assert!(h.ops.state().boot_block().get().is_some());
    }

    #[test]
    fn no_signal_without_root() {
        let h = Harness::new(false);
        h.ops.scan_blocks();
        h.settle();
        assert_eq!(h.ops.events().fired(Event::BlockDetectionDone), 0);
        assert!(h.shell.su_batches().is_empty());
        assert_eq!(h.ops.state().boot_block().get(), None);
    }
}
