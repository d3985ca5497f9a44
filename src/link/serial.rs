//! Serial port link to the flow sensor
//!
//! Wraps a `serialport` handle. Reads never block: `poll_line` first asks the
//! driver how many bytes are queued and only reads that many, so the shared
//! acquisition tick is never stalled by a quiet device.
//!
//! # Example
//!
//! ```ignore
//! use uroflow_rs::config::LinkConfig;
//! use uroflow_rs::link::{DeviceLink, SerialLink};
//!
//! let mut link = SerialLink::connect(LinkConfig::default())?;
//! link.send_start_command()?;
//! while let Some(line) = link.poll_line()? {
//!     println!("{}", line);
//! }
//! ```

use super::framing::LineFramer;
use super::{DeviceLink, LinkStats};
use crate::config::LinkConfig;
use crate::error::LinkError;
use serialport::{ClearBuffer, SerialPort};
use std::io::{Read, Write};

/// Upper bound on bytes pulled from the driver in one read
const MAX_READ_CHUNK: usize = 4096;

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g. "COM3", "/dev/ttyUSB0")
    pub name: String,
    /// Human-readable description of the port type
    pub description: String,
}

impl std::fmt::Display for PortInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.description)
    }
}

/// Link to the sensor over a serial port
pub struct SerialLink {
    /// Open port handle
    port: Option<Box<dyn SerialPort>>,
    /// Connection parameters
    config: LinkConfig,
    /// Line framing state
    framer: LineFramer,
    /// Statistics
    stats: LinkStats,
}

impl SerialLink {
    /// Create a closed link that remembers its connection parameters
    pub fn disconnected(config: LinkConfig) -> Self {
        Self {
            port: None,
            config,
            framer: LineFramer::new(),
            stats: LinkStats::default(),
        }
    }

    /// Open a link with the given parameters
    pub fn connect(config: LinkConfig) -> Result<Self, LinkError> {
        let mut link = Self::disconnected(config);
        link.open()?;
        Ok(link)
    }

    /// Connection parameters
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// List serial ports present on this machine
    pub fn list_ports() -> Vec<PortInfo> {
        match serialport::available_ports() {
            Ok(ports) => ports
                .into_iter()
                .map(|p| PortInfo {
                    description: describe_port_type(&p.port_type),
                    name: p.port_name,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("Failed to enumerate serial ports: {}", e);
                Vec::new()
            }
        }
    }

    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, LinkError> {
        self.port.as_mut().ok_or(LinkError::NotOpen)
    }

    /// Drop the handle after a fault so the link reports closed until reopened
    fn fault(&mut self, err: LinkError) -> LinkError {
        if self.port.take().is_some() {
            tracing::error!("Serial port {} failed: {}", self.config.port, err);
        }
        self.framer.clear();
        err
    }
}

fn describe_port_type(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => match &usb.product {
            Some(product) => format!("USB {:04x}:{:04x} {}", usb.vid, usb.pid, product),
            None => format!("USB {:04x}:{:04x}", usb.vid, usb.pid),
        },
        serialport::SerialPortType::PciPort => "PCI".to_string(),
        serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        serialport::SerialPortType::Unknown => "Unknown".to_string(),
    }
}

impl DeviceLink for SerialLink {
    fn port_name(&self) -> &str {
        &self.config.port
    }

    fn open(&mut self) -> Result<(), LinkError> {
        self.close();

        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.timeout())
            .open()
            .map_err(|e| LinkError::from_open_error(&self.config.port, e))?;

        tracing::info!(
            "Connected to {} at {} baud",
            self.config.port,
            self.config.baud_rate
        );

        // The sensor board resets when the port opens; give it time to boot
        // and drop whatever it printed while starting.
        if !self.config.settle().is_zero() {
            std::thread::sleep(self.config.settle());
        }
        if let Err(e) = port.clear(ClearBuffer::Input) {
            tracing::warn!("Failed to clear input buffer on {}: {}", self.config.port, e);
        }

        self.port = Some(port);
        self.framer.clear();
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn send_command(&mut self, command: u8) -> Result<(), LinkError> {
        let port = self.port_mut()?;
        let written = port.write_all(&[command]).and_then(|()| port.flush());
        match written {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => return Err(LinkError::Io(e)),
            Err(e) => return Err(self.fault(LinkError::Io(e))),
        }
        self.stats.commands_sent += 1;
        tracing::debug!("Sent command {:?} to {}", command as char, self.config.port);
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>, LinkError> {
        if let Some(line) = self.framer.next_line() {
            self.stats.lines_read += 1;
            return Ok(Some(line));
        }

        let available = match self.port_mut()?.bytes_to_read() {
            Ok(n) => n as usize,
            Err(e) => return Err(self.fault(e.into())),
        };
        if available == 0 {
            return Ok(None);
        }

        let mut buf = vec![0u8; available.min(MAX_READ_CHUNK)];
        let n = match self.port_mut()?.read(&mut buf) {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => return Err(self.fault(LinkError::Io(e))),
        };

        self.stats.bytes_read += n as u64;
        self.framer.push(&buf[..n]);
        self.stats.overflows = self.framer.overflows();

        let line = self.framer.next_line();
        if line.is_some() {
            self.stats.lines_read += 1;
        }
        Ok(line)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::info!("Serial port {} closed", self.config.port);
        }
        self.framer.clear();
    }

    fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.close();
    }
}
