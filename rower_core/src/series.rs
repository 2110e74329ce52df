//! Bounded rolling sample window with incrementally maintained sum.

use std::collections::VecDeque;
use std::ops::Index;

use crate::types::Precision;

/// Initial storage for unbounded (`max_length == 0`) series.
pub const DEFAULT_ALLOCATION_CAPACITY: usize = 64;

/// Absolute ceiling on series storage regardless of configuration.
const ALLOCATION_HARD_CAP: usize = 1_000;

/// Rolling FIFO of precision values.
///
/// With `max_length > 0` the window evicts its oldest value once full.
/// With `max_length == 0` the series grows: storage doubles until
/// min(`max_allocation_capacity`, 1000), then grows by +10 per overflow.
/// The bound protects against runaway allocation when a stroke never
/// terminates.
#[derive(Debug, Clone)]
pub struct Series {
    max_length: usize,
    max_allocation_capacity: usize,
    capacity: usize,
    sum: Precision,
    values: VecDeque<Precision>,
}

impl Series {
    pub fn new(max_length: usize) -> Self {
        Self::with_capacity(max_length, DEFAULT_ALLOCATION_CAPACITY, ALLOCATION_HARD_CAP)
    }

    pub fn with_capacity(
        max_length: usize,
        initial_capacity: usize,
        max_allocation_capacity: usize,
    ) -> Self {
        let capacity = if max_length > 0 {
            max_length
        } else {
            initial_capacity.max(1)
        };
        Self {
            max_length,
            max_allocation_capacity,
            capacity,
            sum: 0.0,
            values: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, value: Precision) {
        if self.max_length > 0 && self.values.len() == self.max_length {
            if let Some(evicted) = self.values.pop_front() {
                self.sum -= evicted;
            }
        }
        if self.values.len() == self.capacity {
            self.grow();
        }
        self.values.push_back(value);
        self.sum += value;
    }

    fn grow(&mut self) {
        let ceiling = self.max_allocation_capacity.min(ALLOCATION_HARD_CAP);
        let next = if self.capacity >= ceiling {
            self.capacity + 10
        } else {
            (self.capacity * 2).min(ceiling)
        };
        self.values.reserve(next - self.values.len());
        self.capacity = next;
    }

    pub fn front(&self) -> Precision {
        self.values.front().copied().unwrap_or(0.0)
    }

    pub fn back(&self) -> Precision {
        self.values.back().copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Storage capacity as managed by the growth policy.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn sum(&self) -> Precision {
        self.sum
    }

    pub fn average(&self) -> Precision {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum / self.values.len() as Precision
    }

    pub fn median(&self) -> Precision {
        if self.values.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<Precision> = self.values.iter().copied().collect();
        sorted.sort_unstable_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 1 {
            sorted[mid]
        } else {
            (sorted[mid - 1] + sorted[mid]) / 2.0
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = Precision> + '_ {
        self.values.iter().copied()
    }

    pub fn reset(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

impl Index<usize> for Series {
    type Output = Precision;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}
