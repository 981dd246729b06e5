//! Fixed-depth moving average for measurement streams

use std::collections::VecDeque;

/// Moving-average filter over the last `capacity` values.
///
/// Each measurement stream owns its own instance.
#[derive(Debug, Clone)]
pub struct Smoother {
    capacity: usize,
    history: VecDeque<f32>,
}

impl Smoother {
    /// Create a smoother averaging at most `capacity` values (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            history: VecDeque::with_capacity(capacity),
        }
    }

    /// Record `value` and return the mean of the retained history
    pub fn push(&mut self, value: f32) -> f32 {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(value);

        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}
