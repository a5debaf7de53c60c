//! The submitting thread's callback queue.
//!
//! Completion and progress callbacks are posted here by worker threads and
//! run only when the owner pumps the loop, so they always execute on the
//! thread that owns the [`MainLoop`].

use crate::scheduler::Scheduler;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

type Callback = Box<dyn FnOnce() + Send>;

const IDLE_POLL: Duration = Duration::from_millis(10);

pub struct MainLoop {
    tx: Sender<Callback>,
    rx: Receiver<Callback>,
}

/// Cloneable sender side of a [`MainLoop`].
#[derive(Clone)]
pub struct MainHandle {
    tx: Sender<Callback>,
}

impl MainHandle {
    /// Queue `callback` for the main loop. Returns false once the loop is gone.
    pub fn post(&self, callback: impl FnOnce() + Send + 'static) -> bool {
        self.tx.send(Box::new(callback)).is_ok()
    }
}

impl Default for MainLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl MainLoop {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel();
        Self { tx, rx }
    }

    pub fn handle(&self) -> MainHandle {
        MainHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every callback queued so far without blocking.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(callback) = self.rx.try_recv() {
            callback();
            ran += 1;
        }
        ran
    }

    /// Wait up to `timeout` for one callback, then drain the rest.
    pub fn run_for(&self, timeout: Duration) -> usize {
        match self.rx.recv_timeout(timeout) {
            Ok(callback) => {
                callback();
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }

    /// Pump callbacks until `scheduler` has nothing in flight and nothing is
    /// left to deliver. Callbacks that submit follow-up tasks keep the loop
    /// alive until those finish too.
    pub fn run_until_idle(&self, scheduler: &Scheduler) {
        loop {
            self.run_pending();
            if scheduler.is_idle() {
                if self.run_pending() == 0 {
                    return;
                }
                continue;
            }
            self.run_for(IDLE_POLL);
        }
    }
}
