//! Compute-once cells for lazily resolved values

use std::fmt;
use std::sync::OnceLock;

/// A value computed on first access and cached forever
///
/// Concurrent first accesses block until one initializer finishes, so the
/// closure runs at most once per cell.
pub struct Memo<T> {
    cell: OnceLock<T>,
}

impl<T> Memo<T> {
    pub const fn new() -> Self {
        Self {
            cell: OnceLock::new(),
        }
    }

    pub fn get_or_init(&self, compute: impl FnOnce() -> T) -> &T {
        self.cell.get_or_init(compute)
    }

    pub fn get(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_computed(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> Default for Memo<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones carry the computed value, if any
impl<T: Clone> Clone for Memo<T> {
    fn clone(&self) -> Self {
        let memo = Self::new();
        if let Some(value) = self.cell.get() {
            let _ = memo.cell.set(value.clone());
        }
        memo
    }
}

impl<T: fmt::Debug> fmt::Debug for Memo<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.get() {
            Some(value) => f.debug_tuple("Memo").field(value).finish(),
            None => f.write_str("Memo(<pending>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_computes_once() {
        let calls = AtomicUsize::new(0);
        let memo = Memo::new();
        for _ in 0..3 {
            let value = memo.get_or_init(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                42
            });
            assert_eq!(*value, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_first_access() {
        let calls = Arc::new(AtomicUsize::new(0));
        let memo = Arc::new(Memo::<String>::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let calls = Arc::clone(&calls);
                let memo = Arc::clone(&memo);
                thread::spawn(move || {
                    memo.get_or_init(|| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        "resolved".to_string()
                    })
                    .clone()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), "resolved");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clone_keeps_value() {
        let memo = Memo::new();
        assert!(!memo.is_computed());
        memo.get_or_init(|| vec![1, 2]);
        let copy = memo.clone();
        assert_eq!(copy.get(), Some(&vec![1, 2]));
    }
}
