//! Dual-pool scheduler.

use crate::main_loop::MainHandle;
use crate::task::{Job, Pool, Task};
use anyhow::{Context, Result};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

pub const DEFAULT_UNPRIVILEGED_WORKERS: usize = 4;

/// Capability check consulted for every privileged submission.
pub trait RootProbe: Send + Sync {
    fn root_access(&self) -> bool;
}

impl<F> RootProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn root_access(&self) -> bool {
        self()
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub unprivileged_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            unprivileged_workers: DEFAULT_UNPRIVILEGED_WORKERS,
        }
    }
}

/// What happened to a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Queued,
    /// Privileged task dropped because root is unavailable. Nothing runs and
    /// no callback fires.
    Skipped,
    /// The scheduler has been shut down.
    Rejected,
}

impl Submission {
    pub fn is_queued(self) -> bool {
        self == Submission::Queued
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts tasks between submission and completion delivery.
#[derive(Default)]
struct InFlight {
    count: Mutex<usize>,
    idle: Condvar,
}

impl InFlight {
    fn begin(&self) {
        *lock(&self.count) += 1;
    }

    fn end(&self) {
        let mut count = lock(&self.count);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }

    fn is_idle(&self) -> bool {
        *lock(&self.count) == 0
    }

    fn wait_idle(&self) {
        let mut count = lock(&self.count);
        while *count > 0 {
            count = self
                .idle
                .wait(count)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}

struct WorkerPool {
    pool: Pool,
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    fn spawn(pool: Pool, size: usize) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        let mut workers = Vec::with_capacity(size);
        for i in 0..size.max(1) {
            let rx = Arc::clone(&rx);
            let handle = thread::Builder::new()
                .name(format!("rootbox-{}-{}", pool, i))
                .spawn(move || worker_loop(&rx))
                .with_context(|| format!("failed to spawn {} worker {}", pool, i))?;
            workers.push(handle);
        }
        Ok(Self {
            pool,
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
        })
    }

    fn send(&self, job: Job) -> bool {
        match lock(&self.tx).as_ref() {
            Some(tx) => tx.send(job).is_ok(),
            None => false,
        }
    }

    fn shutdown(&self) {
        drop(lock(&self.tx).take());
        let workers: Vec<_> = lock(&self.workers).drain(..).collect();
        for worker in workers {
            if worker.join().is_err() {
                log::error!("{} worker exited abnormally", self.pool);
            }
        }
    }
}

fn worker_loop(rx: &Mutex<Receiver<Job>>) {
    loop {
        // Hold the receiver lock only while waiting, never while running a job.
        let job = lock(rx).recv();
        match job {
            Ok(job) => job(),
            Err(_) => break,
        }
    }
}

struct Inner {
    privileged: WorkerPool,
    unprivileged: WorkerPool,
    probe: Arc<dyn RootProbe>,
    main: MainHandle,
    in_flight: InFlight,
}

/// Owner of both worker pools.
///
/// Cloning yields another handle to the same pools. Create one at startup,
/// hand clones to whatever needs to submit work, and call
/// [`Scheduler::shutdown`] from the main thread to drain and join.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        probe: Arc<dyn RootProbe>,
        main: MainHandle,
    ) -> Result<Self> {
        let privileged = WorkerPool::spawn(Pool::Privileged, 1)?;
        let unprivileged = WorkerPool::spawn(Pool::Unprivileged, config.unprivileged_workers)?;
        log::debug!(
            "scheduler started: 1 privileged worker, {} unprivileged workers",
            config.unprivileged_workers.max(1)
        );
        Ok(Self {
            inner: Arc::new(Inner {
                privileged,
                unprivileged,
                probe,
                main,
                in_flight: InFlight::default(),
            }),
        })
    }

    /// Queue `task` on its pool.
    ///
    /// Privileged tasks are checked against the root probe first, on the
    /// calling thread; without root they are skipped.
    pub fn submit<T: Send + 'static>(&self, task: Task<T>) -> Submission {
        let pool = task.pool();
        if pool == Pool::Privileged && !self.inner.probe.root_access() {
            log::debug!("skipping {}: root access unavailable", task.name());
            return Submission::Skipped;
        }

        let name = task.name().to_string();
        let job = task.into_job(self.inner.main.clone());
        let inner = Arc::clone(&self.inner);
        let job: Job = Box::new(move || {
            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                log::error!("[{}] {} panicked", pool, name);
            }
            inner.in_flight.end();
        });

        self.inner.in_flight.begin();
        let target = match pool {
            Pool::Privileged => &self.inner.privileged,
            Pool::Unprivileged => &self.inner.unprivileged,
        };
        if !target.send(job) {
            self.inner.in_flight.end();
            log::warn!("{} pool is shut down; task rejected", pool);
            return Submission::Rejected;
        }
        Submission::Queued
    }

    /// True when no submitted task is still running or waiting to run.
    pub fn is_idle(&self) -> bool {
        self.inner.in_flight.is_idle()
    }

    /// Block until every submitted task body has finished.
    pub fn wait_idle(&self) {
        self.inner.in_flight.wait_idle();
    }

    /// Stop accepting work, let queued tasks finish, and join the workers.
    ///
    /// Must not be called from inside a task.
    pub fn shutdown(&self) {
        self.inner.privileged.shutdown();
        self.inner.unprivileged.shutdown();
        log::debug!("scheduler stopped");
    }
}
