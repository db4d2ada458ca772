use std::collections::VecDeque;

/// Fixed-capacity FIFO of the most recent pulse samples.
///
/// Once full it stays full: every push evicts the oldest sample.
#[derive(Clone, Debug)]
pub struct SignalBuffer {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl SignalBuffer {
    pub fn new(capacity: usize) -> Self {
        debug_assert!(capacity > 0, "signal buffer capacity must be positive");
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, sample: f64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Samples in arrival order, oldest first.
    pub fn snapshot(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }
}
