//! Mock Device Link for Testing
//!
//! This module provides an in-memory link that behaves like the sensor
//! without real hardware. The link itself is moved into the acquisition
//! worker; a cloneable [`MockLinkHandle`] stays with the test (or demo) to
//! inject input and inspect what the worker wrote.
//!
//! # Features
//!
//! - **Scripted input**: queue raw bytes or whole lines
//! - **Fault injection**: make the next poll fail or panic
//! - **Command capture**: inspect control bytes sent by the worker
//! - **Synthetic flow curve**: [`MockFlowPattern`] emits a plausible voiding
//!   curve after the start byte is received
//!
//! # Example
//!
//! ```ignore
//! use uroflow_rs::link::{DeviceLink, MockLink};
//!
//! let (mut link, handle) = MockLink::new();
//! handle.push_line("12.50,48.30");
//! assert_eq!(link.poll_line()?, Some("12.50,48.30".to_string()));
//! ```

use super::framing::LineFramer;
use super::{DeviceLink, LinkStats, START_COMMAND, STOP_COMMAND};
use crate::error::LinkError;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Synthetic voiding curve emitted by the mock after a start command
///
/// Flow follows a half sine over `duration_seconds`; volume is its integral.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockFlowPattern {
    /// Peak flow rate in mL/s
    pub peak_flow: f64,
    /// Length of the void in seconds
    pub duration_seconds: f64,
    /// Interval between emitted lines
    pub interval: Duration,
}

impl Default for MockFlowPattern {
    fn default() -> Self {
        Self {
            peak_flow: 25.0,
            duration_seconds: 30.0,
            interval: Duration::from_millis(100),
        }
    }
}

impl MockFlowPattern {
    /// Flow rate and volume at time `t` seconds after start
    pub fn values_at(&self, t: f64) -> (f64, f64) {
        let d = self.duration_seconds.max(f64::EPSILON);
        let t = t.clamp(0.0, d);
        let phase = std::f64::consts::PI * t / d;
        let flow = self.peak_flow * phase.sin();
        let volume = self.peak_flow * d / std::f64::consts::PI * (1.0 - phase.cos());
        (flow, volume)
    }
}

#[derive(Debug, Default)]
struct MockState {
    /// Whether open() should fail, and with what reason
    fail_open: Option<String>,
    /// Bytes waiting to be framed
    inbound: VecDeque<u8>,
    /// Control bytes written by the link owner
    written: Vec<u8>,
    /// Error returned by the next poll
    fail_next_poll: Option<String>,
    /// Panic on the next poll
    panic_next_poll: bool,
    /// Fail the next poll with an I/O error and close, like a pulled cable
    unplugged: bool,
    /// Whether the link is open
    open: bool,
    /// Pattern generator state
    pattern: Option<MockFlowPattern>,
    pattern_started: Option<Instant>,
    pattern_last_emit: Option<Instant>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory device link
#[derive(Debug)]
pub struct MockLink {
    state: Arc<Mutex<MockState>>,
    framer: LineFramer,
    stats: LinkStats,
    port_name: String,
}

/// Test-side handle to a [`MockLink`]
#[derive(Debug, Clone)]
pub struct MockLinkHandle {
    state: Arc<Mutex<MockState>>,
}

impl MockLink {
    /// Create an open mock link and its control handle
    pub fn new() -> (Self, MockLinkHandle) {
        let state = Arc::new(Mutex::new(MockState {
            open: true,
            ..Default::default()
        }));
        let link = Self {
            state: state.clone(),
            framer: LineFramer::new(),
            stats: LinkStats::default(),
            port_name: "mock".to_string(),
        };
        (link, MockLinkHandle { state })
    }

    /// Create a mock link that is closed until `open()` succeeds
    pub fn closed() -> (Self, MockLinkHandle) {
        let (link, handle) = Self::new();
        lock(&link.state).open = false;
        (link, handle)
    }

    /// Emit a synthetic flow curve once the start byte is received
    pub fn with_pattern(self, pattern: MockFlowPattern) -> Self {
        lock(&self.state).pattern = Some(pattern);
        self
    }

    fn generate_pattern_line(state: &mut MockState) {
        let (Some(pattern), Some(started)) = (state.pattern, state.pattern_started) else {
            return;
        };
        let now = Instant::now();
        let due = state
            .pattern_last_emit
            .map(|last| now.duration_since(last) >= pattern.interval)
            .unwrap_or(true);
        if !due {
            return;
        }
        let (flow, volume) = pattern.values_at(now.duration_since(started).as_secs_f64());
        state
            .inbound
            .extend(format!("{:.2},{:.2}\n", flow, volume).bytes());
        state.pattern_last_emit = Some(now);
    }
}

impl DeviceLink for MockLink {
    fn port_name(&self) -> &str {
        &self.port_name
    }

    fn open(&mut self) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        if let Some(reason) = state.fail_open.clone() {
            state.open = false;
            return Err(LinkError::ConnectFailed {
                port: self.port_name.clone(),
                reason,
            });
        }
        state.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    fn send_command(&mut self, command: u8) -> Result<(), LinkError> {
        let mut state = lock(&self.state);
        if !state.open {
            return Err(LinkError::NotOpen);
        }
        state.written.push(command);
        match command {
            START_COMMAND => {
                state.pattern_started = Some(Instant::now());
                state.pattern_last_emit = None;
            }
            STOP_COMMAND => state.pattern_started = None,
            _ => {}
        }
        self.stats.commands_sent += 1;
        Ok(())
    }

    fn poll_line(&mut self) -> Result<Option<String>, LinkError> {
        let should_panic = {
            let mut state = lock(&self.state);
            if !state.open {
                return Err(LinkError::NotOpen);
            }
            if std::mem::take(&mut state.unplugged) {
                state.open = false;
                drop(state);
                self.framer.clear();
                return Err(LinkError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "device unplugged",
                )));
            }
            if let Some(reason) = state.fail_next_poll.take() {
                return Err(LinkError::Unexpected(reason));
            }
            std::mem::take(&mut state.panic_next_poll)
        };
        if should_panic {
            panic!("mock link: injected poll panic");
        }

        if !self.framer.has_line() {
            let mut state = lock(&self.state);
            Self::generate_pattern_line(&mut state);
            let bytes: Vec<u8> = state.inbound.drain(..).collect();
            drop(state);
            self.stats.bytes_read += bytes.len() as u64;
            self.framer.push(&bytes);
        }

        let line = self.framer.next_line();
        if line.is_some() {
            self.stats.lines_read += 1;
        }
        Ok(line)
    }

    fn close(&mut self) {
        lock(&self.state).open = false;
        self.framer.clear();
    }

    fn stats(&self) -> &LinkStats {
        &self.stats
    }
}

impl MockLinkHandle {
    /// Queue raw bytes as if received from the device
    pub fn push_bytes(&self, bytes: &[u8]) {
        lock(&self.state).inbound.extend(bytes.iter().copied());
    }

    /// Queue one line; the terminator is appended
    pub fn push_line(&self, line: &str) {
        let mut state = lock(&self.state);
        state.inbound.extend(line.bytes());
        state.inbound.push_back(b'\n');
    }

    /// Control bytes written so far
    pub fn written(&self) -> Vec<u8> {
        lock(&self.state).written.clone()
    }

    /// Whether the link is currently open
    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Make subsequent `open()` calls fail (`None` to succeed again)
    pub fn set_fail_open(&self, reason: Option<&str>) {
        lock(&self.state).fail_open = reason.map(str::to_string);
    }

    /// Make the next `poll_line()` return an error
    pub fn fail_next_poll(&self, reason: &str) {
        lock(&self.state).fail_next_poll = Some(reason.to_string());
    }

    /// Make the next `poll_line()` panic
    pub fn panic_next_poll(&self) {
        lock(&self.state).panic_next_poll = true;
    }

    /// Close the link without the owner noticing a failed read
    pub fn disconnect(&self) {
        lock(&self.state).open = false;
    }

    /// Simulate a pulled cable: the next poll fails and the link closes
    pub fn unplug(&self) {
        lock(&self.state).unplugged = true;
    }
}
