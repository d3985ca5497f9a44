//! Ordered sample storage for the active session

use crate::types::Sample;

/// Append-only ordered store of samples
///
/// Mutated only by [`append`](Self::append) or a full [`clear`](Self::clear).
/// Samples are kept in arrival order.
#[derive(Debug, Clone, Default)]
pub struct SampleBuffer {
    samples: Vec<Sample>,
}

impl SampleBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty buffer with room for `capacity` samples
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Append a sample
    pub fn append(&mut self, sample: Sample) {
        self.samples.push(sample);
    }

    /// Replace the storage with a fresh one, releasing prior samples
    pub fn clear(&mut self) {
        self.samples = Vec::new();
    }

    /// Copy of all samples
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.clone()
    }

    /// Borrow the samples in arrival order
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<&Sample> {
        self.samples.last()
    }

    /// Elapsed-time series in seconds
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.elapsed_seconds).collect()
    }

    /// Flow-rate series in mL/s
    pub fn flow_series(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.flow_rate).collect()
    }

    /// Volume series in mL
    pub fn volume_series(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.volume).collect()
    }
}
