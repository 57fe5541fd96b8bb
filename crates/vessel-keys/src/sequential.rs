use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{KeyError, KeyResult};
use crate::generator::KeyGenerator;

/// Strictly increasing numeric keys.
///
/// Each call claims the current counter value and advances it by `step` in a
/// single atomic operation, so concurrent callers never observe the same
/// value and no value in the sequence is skipped. Keys are left-padded with
/// zeros to `width` digits so lexical order matches numeric order.
#[derive(Debug)]
pub struct SequentialKeyGenerator {
    next: AtomicU64,
    step: u64,
    width: usize,
}

impl SequentialKeyGenerator {
    /// Start at `start`, advancing by `step` (a zero step is treated as 1).
    pub fn new(start: u64, step: u64) -> Self {
        Self {
            next: AtomicU64::new(start),
            step: step.max(1),
            width: 0,
        }
    }

    /// Pad keys with leading zeros to at least `width` digits.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    /// Claim the next value in the sequence.
    pub fn next_value(&self) -> KeyResult<u64> {
        let step = self.step;
        self.next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(step)
            })
            .map_err(|_| KeyError::Exhausted)
    }

    /// The value the next call would return, without claiming it.
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Acquire)
    }

    /// The configured increment.
    pub fn step(&self) -> u64 {
        self.step
    }
}

impl Default for SequentialKeyGenerator {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl KeyGenerator for SequentialKeyGenerator {
    fn name(&self) -> &str {
        "sequential"
    }

    fn create_key(&self, _original_name: Option<&str>) -> KeyResult<String> {
        let value = self.next_value()?;
        Ok(format!("{value:0width$}", width = self.width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::thread;

    #[test]
    fn starts_at_start_and_advances_by_step() {
        let g = SequentialKeyGenerator::new(10, 5);
        assert_eq!(g.create_key(None).unwrap(), "10");
        assert_eq!(g.create_key(None).unwrap(), "15");
        assert_eq!(g.peek(), 20);
    }

    #[test]
    fn zero_step_is_clamped() {
        let g = SequentialKeyGenerator::new(0, 0);
        assert_eq!(g.step(), 1);
        assert_eq!(g.next_value().unwrap(), 0);
        assert_eq!(g.next_value().unwrap(), 1);
    }

    #[test]
    fn width_pads_with_zeros() {
        let g = SequentialKeyGenerator::new(7, 1).with_width(6);
        assert_eq!(g.create_key(None).unwrap(), "000007");
    }

    #[test]
    fn overflow_is_reported() {
        let g = SequentialKeyGenerator::new(u64::MAX - 1, 1);
        assert_eq!(g.next_value().unwrap(), u64::MAX - 1);
        assert_eq!(g.next_value(), Err(KeyError::Exhausted));
        assert_eq!(g.peek(), u64::MAX);
    }

    #[test]
    fn concurrent_callers_get_the_exact_sequence() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 1_000;
        let g = SequentialKeyGenerator::new(100, 3);

        let values: Vec<u64> = thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    s.spawn(|| {
                        (0..PER_THREAD)
                            .map(|_| g.next_value().unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let distinct: BTreeSet<u64> = values.iter().copied().collect();
        let expected: BTreeSet<u64> = (0..THREADS * PER_THREAD).map(|i| 100 + i * 3).collect();
        assert_eq!(values.len() as u64, THREADS * PER_THREAD);
        assert_eq!(distinct, expected);
    }

    proptest! {
        #[test]
        fn sequence_is_arithmetic(start in 0u64..1_000_000, step in 1u64..1_000, n in 1usize..64) {
            let g = SequentialKeyGenerator::new(start, step);
            for i in 0..n {
                prop_assert_eq!(g.next_value().unwrap(), start + i as u64 * step);
            }
        }
    }
}
