use once_cell::sync::OnceCell;

/// A value computed at most once successfully, then shared.
///
/// Racing computations are allowed; the first one to store a value wins and
/// every caller sees that value from then on. A computation that yields
/// `None` stores nothing, so the next caller tries again.
#[derive(Debug)]
pub struct Memo<T> {
    cell: OnceCell<T>,
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<T> {
        self.cell.get().cloned()
    }

    pub fn get_or_compute(&self, compute: impl FnOnce() -> Option<T>) -> Option<T> {
        if let Some(value) = self.cell.get() {
            return Some(value.clone());
        }
        let value = compute()?;
        // Losing the race is fine: the stored value is what everyone reads.
        let _ = self.cell.set(value);
        self.cell.get().cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn computes_once_after_success() {
        let memo = Memo::new();
        let calls = AtomicUsize::new(0);
        let detect = || {
            calls.fetch_add(1, Ordering::SeqCst);
            Some("/dev/block/mmcblk0p9".to_string())
        };

        let first = memo.get_or_compute(detect);
        let second = memo.get_or_compute(detect);

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_computation_is_retried() {
        let memo: Memo<String> = Memo::new();
        assert_eq!(memo.get_or_compute(|| None), None);
        assert_eq!(memo.get(), None);
        assert_eq!(
            memo.get_or_compute(|| Some("boot".to_string())).as_deref(),
            Some("boot")
        );
    }

    #[test]
    fn first_writer_wins() {
        let memo = Memo::new();
        memo.get_or_compute(|| Some(1));
        // Once stored, the value is never replaced.
        let value = memo.get_or_compute(|| Some(2));
        assert_eq!(value, Some(1));
    }
}
