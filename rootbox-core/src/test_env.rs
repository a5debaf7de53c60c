//! Serializes tests that mutate process-wide environment variables.

use once_cell::sync::Lazy;
use std::sync::{Mutex, MutexGuard, PoisonError};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(Mutex::default);

pub fn lock() -> MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}
