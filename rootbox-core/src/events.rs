//! Completion signals observed by the UI layer.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Zero-payload "done" notifications fired after background work completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    UpdateCheckDone,
    ModuleLoadDone,
    RepoLoadDone,
    PackageLoadDone,
    BlockDetectionDone,
    SafetyCheckDone,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Event::UpdateCheckDone => "update-check-done",
            Event::ModuleLoadDone => "module-load-done",
            Event::RepoLoadDone => "repo-load-done",
            Event::PackageLoadDone => "package-load-done",
            Event::BlockDetectionDone => "block-detection-done",
            Event::SafetyCheckDone => "safety-check-done",
        };
        write!(f, "{}", name)
    }
}

type Listener = Arc<dyn Fn(Event) + Send + Sync>;

/// Listener registry plus a per-event trigger count.
#[derive(Default)]
pub struct Events {
    listeners: Mutex<HashMap<Event, Vec<Listener>>>,
    fired: Mutex<HashMap<Event, usize>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event: Event, listener: impl Fn(Event) + Send + Sync + 'static) {
        lock(&self.listeners)
            .entry(event)
            .or_default()
            .push(Arc::new(listener));
    }

    pub fn trigger(&self, event: Event) {
        log::debug!("event: {}", event);
        *lock(&self.fired).entry(event).or_insert(0) += 1;
        // Listeners may subscribe or trigger in turn; call them unlocked.
        let listeners: Vec<Listener> = lock(&self.listeners)
            .get(&event)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(event);
        }
    }

    /// How many times `event` has fired.
    pub fn fired(&self, event: Event) -> usize {
        lock(&self.fired).get(&event).copied().unwrap_or(0)
    }
}
