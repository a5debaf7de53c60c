//! rootbox workflow primitives.
//!
//! Background work is split across two pools owned by one [`Scheduler`]:
//! a single-worker privileged pool (root shell work, strictly one at a time)
//! and a fixed-size unprivileged pool. Results come back to the submitting
//! context through a [`MainLoop`].

pub mod main_loop;
pub mod memo;
pub mod scheduler;
pub mod task;

pub use main_loop::{MainHandle, MainLoop};
pub use memo::Memo;
pub use scheduler::{RootProbe, Scheduler, SchedulerConfig, Submission};
pub use task::{Pool, Progress, Task};
