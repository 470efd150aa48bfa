//! Injectable randomness
//!
//! Emoji variants, orbit orientations and random picks all draw from a
//! [`RandomSource`] so tests can script the outcome.

use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub trait RandomSource: Send + Sync {
    /// Uniform integer in `0..upper`. `upper` is never zero.
    fn below(&self, upper: usize) -> usize;
}

/// Pick one element, `None` for an empty slice
pub fn choose<'a, T>(rng: &dyn RandomSource, items: &'a [T]) -> Option<&'a T> {
    if items.is_empty() {
        None
    } else {
        items.get(rng.below(items.len()))
    }
}

/// Thread-local RNG from the `rand` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn below(&self, upper: usize) -> usize {
        rand::thread_rng().gen_range(0..upper)
    }
}

/// Replays a fixed sequence, cycling when it runs out. Values are reduced
/// modulo `upper`.
#[derive(Debug)]
pub struct ScriptedRandom {
    values: Vec<usize>,
    cursor: AtomicUsize,
}

impl ScriptedRandom {
    pub fn new(values: Vec<usize>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Always the same value
    pub fn constant(value: usize) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for ScriptedRandom {
    fn below(&self, upper: usize) -> usize {
        if self.values.is_empty() {
            return 0;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % self.values.len();
        self.values[idx] % upper
    }
}

/// Shared process-wide source
pub type SharedRandom = Arc<dyn RandomSource>;

pub fn thread_random() -> SharedRandom {
    Arc::new(ThreadRandom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_random_in_range() {
        let rng = ThreadRandom;
        for _ in 0..100 {
            assert!(rng.below(3) < 3);
        }
    }

    #[test]
    fn test_scripted_cycles_and_wraps() {
        let rng = ScriptedRandom::new(vec![0, 4, 9]);
        assert_eq!(rng.below(5), 0);
        assert_eq!(rng.below(5), 4);
        assert_eq!(rng.below(5), 4);
        assert_eq!(rng.below(5), 0);
    }

    #[test]
    fn test_choose_empty() {
        let rng = ScriptedRandom::constant(1);
        let empty: [u8; 0] = [];
        assert!(choose(&rng, &empty).is_none());
        assert_eq!(choose(&rng, &["a", "b"]), Some(&"b"));
    }
}
