//! Device link to the uroflowmetry sensor
//!
//! The sensor streams newline-terminated ASCII lines of the form
//! `"<flow>,<volume>"` and accepts single-byte control commands. This module
//! provides a common trait for the serial implementation and for the
//! in-memory mock used in tests and demos.
//!
//! # Components
//!
//! - [`DeviceLink`] - Unified link interface used by the acquisition worker
//! - [`SerialLink`] - Real hardware over `serialport`
//! - [`MockLink`] - In-memory link with injectable lines and faults
//! - [`LineFramer`] - Splits the raw byte stream into lines

pub mod framing;
pub mod mock;
pub mod serial;

pub use framing::LineFramer;
pub use mock::{MockFlowPattern, MockLink, MockLinkHandle};
pub use serial::SerialLink;

use crate::error::LinkError;

/// Control byte that begins a measurement
pub const START_COMMAND: u8 = b'A';

/// Control byte that ends a measurement (opt-in, see `LinkConfig::send_stop_byte`)
pub const STOP_COMMAND: u8 = b'S';

/// Traffic counters for a device link
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Bytes received from the device
    pub bytes_read: u64,
    /// Complete lines handed out by `poll_line`
    pub lines_read: u64,
    /// Control bytes written to the device
    pub commands_sent: u64,
    /// Partial lines dropped for exceeding the framing limit
    pub overflows: u64,
}

/// Unified interface for device links
///
/// Implementations must be `Send` so the link can be moved into the
/// acquisition worker thread. Every method is non-blocking apart from the
/// OS-level write of a single control byte.
pub trait DeviceLink: Send {
    /// Identifier of the underlying port
    fn port_name(&self) -> &str;

    /// (Re)open the link using its stored parameters
    fn open(&mut self) -> Result<(), LinkError>;

    /// Check if the link is open
    fn is_open(&self) -> bool;

    /// Write a single control byte; no acknowledgment is awaited
    fn send_command(&mut self, command: u8) -> Result<(), LinkError>;

    /// Ask the device to begin a measurement
    fn send_start_command(&mut self) -> Result<(), LinkError> {
        self.send_command(START_COMMAND)
    }

    /// Ask the device to stop streaming
    fn send_stop_command(&mut self) -> Result<(), LinkError> {
        self.send_command(STOP_COMMAND)
    }

    /// Return the next complete line if one is available, without blocking
    ///
    /// The line terminator and surrounding whitespace are stripped.
    fn poll_line(&mut self) -> Result<Option<String>, LinkError>;

    /// Close the link; safe to call when already closed or never opened
    fn close(&mut self);

    /// Get link traffic statistics
    fn stats(&self) -> &LinkStats;
}
