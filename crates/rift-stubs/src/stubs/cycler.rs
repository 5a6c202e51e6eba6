//! Response sequence cursor.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A lock-free cursor into a stub's response sequence.
///
/// Every call to [`SequenceCursor::advance`] hands out the current position
/// and moves to the next one, wrapping at the sequence length, in a single
/// atomic step. Concurrent callers therefore never observe the same position
/// twice within one cycle.
#[derive(Default)]
pub struct SequenceCursor(AtomicUsize);

impl SequenceCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Position the next call to `advance` will return.
    #[must_use]
    pub fn peek(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        self.0.load(Ordering::Relaxed) % len
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Relaxed);
    }

    /// Return the current position and advance to the next one.
    #[must_use]
    pub fn advance(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        let old_value = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| {
                Some((v % len + 1) % len)
            })
            .unwrap_or_else(|e| {
                debug_assert!(false, "we never return None from fetch_update");
                e
            });
        old_value % len
    }
}

impl fmt::Debug for SequenceCursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("SequenceCursor")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cursor_cycles() {
        let cursor = SequenceCursor::new();
        let seen: Vec<usize> = (0..7).map(|_| cursor.advance(3)).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
    }

    #[test]
    fn test_cursor_single_response() {
        let cursor = SequenceCursor::new();
        assert_eq!(cursor.advance(1), 0);
        assert_eq!(cursor.advance(1), 0);
        assert_eq!(cursor.peek(1), 0);
    }

    #[test]
    fn test_cursor_peek_and_reset() {
        let cursor = SequenceCursor::new();
        let _ = cursor.advance(4);
        let _ = cursor.advance(4);
        assert_eq!(cursor.peek(4), 2);

        cursor.reset();
        assert_eq!(cursor.peek(4), 0);
        assert_eq!(cursor.advance(4), 0);
    }

    #[test]
    fn test_cursor_concurrent_cycle_is_a_permutation() {
        const THREADS: usize = 16;
        let cursor = Arc::new(SequenceCursor::new());

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let cursor = Arc::clone(&cursor);
                std::thread::spawn(move || cursor.advance(THREADS))
            })
            .collect();

        let mut seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..THREADS).collect::<Vec<_>>());
        assert_eq!(cursor.peek(THREADS), 0);
    }
}
