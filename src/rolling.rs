use std::collections::VecDeque;
use tracing::trace;

/// Fixed-capacity moving average over the most recent samples
///
/// Once the window is full, every new sample evicts the oldest one. The
/// running sum is kept alongside the samples so `average` does not rescan.
#[derive(Debug, Clone)]
pub struct RollingSample<T> {
    samples: VecDeque<T>,
    capacity: usize,
    sum: i128,
}

impl<T> RollingSample<T>
where
    T: Copy + Into<i128>,
{
    /// Create an empty window holding at most `capacity` samples
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        if capacity == 0 {
            panic!("Rolling sample capacity must be greater than 0");
        }

        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0,
        }
    }

    pub fn add_sample(&mut self, sample: T) {
        if self.samples.len() == self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                self.sum -= evicted.into();
            }
        }
        self.samples.push_back(sample);
        self.sum += sample.into();

        trace!(
            "Rolling window {}/{} samples, sum {}",
            self.samples.len(),
            self.capacity,
            self.sum
        );
    }

    /// Arithmetic mean of the samples in the window, truncated toward zero
    /// and saturated to the `i64` range
    pub fn average(&self) -> Option<i64> {
        if self.samples.is_empty() {
            return None;
        }
        let mean = self.sum / self.samples.len() as i128;
        Some(mean.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }

    pub fn reset(&mut self) {
        self.samples.clear();
        self.sum = 0;
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }
}
