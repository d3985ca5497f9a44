//! Core data types for Uroflow-RS
//!
//! # Main Types
//!
//! - [`Sample`] - One decoded (flow, volume) reading with its session time
//! - [`SessionStatus`] - Lifecycle state of the measurement session
//! - [`ConnectionStatus`] - State of the serial device link
//! - [`DisplayValues`] - Derived values shown next to the live chart

use serde::{Deserialize, Serialize};

/// One decoded reading from the device stream
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Seconds since the session was started
    pub elapsed_seconds: f64,
    /// Flow rate in mL/s
    pub flow_rate: f64,
    /// Voided volume in mL
    pub volume: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(elapsed_seconds: f64, flow_rate: f64, volume: f64) -> Self {
        Self {
            elapsed_seconds,
            flow_rate,
            volume,
        }
    }
}

/// Lifecycle state of the measurement session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No acquisition; the buffer may still hold the last session
    #[default]
    Idle,
    /// Acquisition loop is polling and appending
    Running,
    /// Acquisition halted, last session still available
    Stopped,
}

impl SessionStatus {
    /// Check if samples are being collected
    pub fn is_running(&self) -> bool {
        matches!(self, SessionStatus::Running)
    }

    /// Display name for the state
    pub fn display_name(&self) -> &'static str {
        match self {
            SessionStatus::Idle => "Idle",
            SessionStatus::Running => "Running",
            SessionStatus::Stopped => "Stopped",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Connection status of the device link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionStatus {
    /// Port is closed
    #[default]
    Disconnected,
    /// Port is open
    Connected,
    /// Last open attempt failed
    Error,
}

impl ConnectionStatus {
    /// Display name for the status
    pub fn display_name(&self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// Values shown in the flow/volume labels beside the chart
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DisplayValues {
    /// Latest flow rate in mL/s
    pub flow_rate: f64,
    /// Latest volume in mL
    pub volume: f64,
}

impl DisplayValues {
    /// Update from the most recent sample
    pub fn update(&mut self, sample: &Sample) {
        self.flow_rate = sample.flow_rate;
        self.volume = sample.volume;
    }

    /// Reset both values to zero
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Flow rate label text
    pub fn flow_label(&self) -> String {
        format!("Flowrate: {:.2} mL/s", self.flow_rate)
    }

    /// Volume label text
    pub fn volume_label(&self) -> String {
        format!("Volume: {:.2} mL", self.volume)
    }
}
