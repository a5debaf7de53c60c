//! A single unit of background work.

use crate::main_loop::MainHandle;
use std::fmt;
use std::sync::{Arc, Mutex};

/// Which pool a task runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pool {
    /// Single worker, FIFO, gated by root capability.
    Privileged,
    /// Fixed-size concurrent pool, always accepted.
    Unprivileged,
}

impl fmt::Display for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pool::Privileged => write!(f, "privileged"),
            Pool::Unprivileged => write!(f, "unprivileged"),
        }
    }
}

type Body<T> = Box<dyn FnOnce(&Progress) -> T + Send>;
type ProgressFn = Box<dyn FnMut(String) + Send>;
type CompleteFn<T> = Box<dyn FnOnce(T) + Send>;

pub(crate) type Job = Box<dyn FnOnce() + Send>;

/// Progress reporter handed to a running task body.
///
/// Labels are forwarded to the task's progress callback on the main loop.
pub struct Progress {
    main: MainHandle,
    sink: Option<Arc<Mutex<ProgressFn>>>,
}

impl Progress {
    pub fn publish(&self, label: impl Into<String>) {
        let label = label.into();
        log::debug!("progress: {}", label);
        if let Some(sink) = &self.sink {
            let sink = Arc::clone(sink);
            self.main.post(move || {
                if let Ok(mut on_progress) = sink.lock() {
                    on_progress(label);
                }
            });
        }
    }
}

/// Background work with optional progress and completion callbacks.
///
/// The body runs on a pool worker. Both callbacks run on the main loop,
/// progress first, completion after the body has returned. A task runs at
/// most once.
pub struct Task<T> {
    name: String,
    pool: Pool,
    body: Body<T>,
    on_progress: Option<ProgressFn>,
    on_complete: Option<CompleteFn<T>>,
}

impl<T: Send + 'static> Task<T> {
    pub fn new(
        name: impl Into<String>,
        pool: Pool,
        body: impl FnOnce(&Progress) -> T + Send + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            pool,
            body: Box::new(body),
            on_progress: None,
            on_complete: None,
        }
    }

    pub fn privileged(
        name: impl Into<String>,
        body: impl FnOnce(&Progress) -> T + Send + 'static,
    ) -> Self {
        Self::new(name, Pool::Privileged, body)
    }

    pub fn unprivileged(
        name: impl Into<String>,
        body: impl FnOnce(&Progress) -> T + Send + 'static,
    ) -> Self {
        Self::new(name, Pool::Unprivileged, body)
    }

    pub fn on_progress(mut self, callback: impl FnMut(String) + Send + 'static) -> Self {
        self.on_progress = Some(Box::new(callback));
        self
    }

    pub fn on_complete(mut self, callback: impl FnOnce(T) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pool(&self) -> Pool {
        self.pool
    }

    pub(crate) fn into_job(self, main: MainHandle) -> Job {
        let Task {
            name,
            pool,
            body,
            on_progress,
            on_complete,
        } = self;
        Box::new(move || {
            log::debug!("[{}] {} started", pool, name);
            let progress = Progress {
                main: main.clone(),
                sink: on_progress.map(|f| Arc::new(Mutex::new(f))),
            };
            let output = body(&progress);
            log::debug!("[{}] {} finished", pool, name);
            if let Some(on_complete) = on_complete {
                if !main.post(move || on_complete(output)) {
                    log::warn!("main loop gone; dropping completion of {}", name);
                }
            }
        })
    }
}
