//! Display collaborators
//!
//! Chart and label widgets are not part of this crate. They plug in through
//! [`DisplaySink`], which the acquisition worker calls on its own thread after
//! every accepted sample. [`DisplaySeries`] is the default chart model: it
//! mirrors the three series and computes the auto-scrolling time window.

use crate::session::SampleBuffer;
use crate::types::{DisplayValues, Sample};

/// Receiver of live session updates
#[cfg_attr(test, mockall::automock)]
pub trait DisplaySink: Send {
    /// A sample was appended; `buffer` holds the whole session so far
    fn on_sample(&mut self, latest: &Sample, buffer: &SampleBuffer);

    /// The session buffer was emptied by Start or Clear
    fn on_clear(&mut self);
}

/// Chart model for the flow and volume plots
#[derive(Debug, Clone, Default)]
pub struct DisplaySeries {
    times: Vec<f64>,
    flow: Vec<f64>,
    volume: Vec<f64>,
    values: DisplayValues,
}

impl DisplaySeries {
    /// Create an empty series
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one sample
    pub fn push(&mut self, sample: &Sample) {
        self.times.push(sample.elapsed_seconds);
        self.flow.push(sample.flow_rate);
        self.volume.push(sample.volume);
        self.values.update(sample);
    }

    /// Drop all points and reset the labels
    pub fn clear(&mut self) {
        self.times.clear();
        self.flow.clear();
        self.volume.clear();
        self.values.reset();
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether there are no points
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Elapsed-time axis
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Flow-rate points
    pub fn flow(&self) -> &[f64] {
        &self.flow
    }

    /// Volume points
    pub fn volume(&self) -> &[f64] {
        &self.volume
    }

    /// Latest label values
    pub fn values(&self) -> &DisplayValues {
        &self.values
    }

    /// X-axis range for a window of `window_seconds`
    ///
    /// Starts at `[0, window]` and scrolls so the newest point stays at the
    /// right edge once the session outgrows the window.
    pub fn visible_range(&self, window_seconds: f64) -> (f64, f64) {
        let window = window_seconds.max(0.0);
        match self.times.last() {
            Some(&last) if last > window => (last - window, last),
            _ => (0.0, window),
        }
    }
}

impl DisplaySink for DisplaySeries {
    fn on_sample(&mut self, latest: &Sample, _buffer: &SampleBuffer) {
        self.push(latest);
    }

    fn on_clear(&mut self) {
        self.clear();
    }
}
