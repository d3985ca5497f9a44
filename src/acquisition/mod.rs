//! Acquisition module
//!
//! The acquisition loop runs on its own thread and owns the device link and
//! the single [`Session`](crate::session::Session). Operator commands and
//! acquisition ticks execute on that same thread, so the sample buffer is
//! never touched concurrently. The operator side talks to it through
//! crossbeam channels.
//!
//! # Architecture
//!
//! - [`AcquisitionCommand`] - Messages sent from the operator to the worker
//! - [`AcquisitionMessage`] - Messages sent from the worker to the operator
//! - [`OperatorHandle`] - Operator-side handle for commands and messages
//! - [`AcquisitionBackend`] - Entry point that builds and runs the worker
//! - [`AcquisitionWorker`] - The periodic tick loop
//! - [`DisplaySink`] - Hook for chart/label collaborators
//!
//! # Example
//!
//! ```ignore
//! use uroflow_rs::acquisition::{AcquisitionBackend, AcquisitionMessage};
//! use uroflow_rs::config::AppConfig;
//! use uroflow_rs::link::MockLink;
//!
//! let (link, device) = MockLink::new();
//! let (backend, operator) = AcquisitionBackend::new(AppConfig::default(), Box::new(link));
//! let worker = backend.spawn()?;
//!
//! operator.start()?;
//! device.push_line("12.50,48.30");
//! for msg in operator.drain() {
//!     if let AcquisitionMessage::SampleAccepted(sample) = msg {
//!         println!("{:?}", sample);
//!     }
//! }
//! operator.shutdown();
//! worker.join().ok();
//! ```

pub mod display;
pub mod worker;

pub use display::{DisplaySeries, DisplaySink};
pub use worker::AcquisitionWorker;

use crate::config::AppConfig;
use crate::error::{ExportError, LinkError, Result, SessionError, UroflowError};
use crate::link::DeviceLink;
use crate::session::{PatientMetadata, SessionSnapshot};
use crate::types::{ConnectionStatus, DisplayValues, Sample, SessionStatus};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Command sent from the operator to the acquisition worker
#[derive(Debug)]
pub enum AcquisitionCommand {
    /// Start (or restart) a session
    Start {
        reply: Sender<std::result::Result<(), SessionError>>,
    },
    /// Stop the running session
    Stop,
    /// Empty the session buffer
    Clear,
    /// Export the session with patient details
    Export {
        metadata: PatientMetadata,
        reply: Sender<std::result::Result<SessionSnapshot, ExportError>>,
    },
    /// Close and reopen the device link
    Reconnect {
        reply: Sender<std::result::Result<(), LinkError>>,
    },
    /// Request a status report
    RequestStatus { reply: Sender<StatusReport> },
    /// Shutdown the worker
    Shutdown,
}

/// Message sent from the acquisition worker to the operator
#[derive(Debug, Clone)]
pub enum AcquisitionMessage {
    /// Device link status changed
    LinkStatus(ConnectionStatus),
    /// Device link fault
    LinkError(String),
    /// A sample was appended to the session
    SampleAccepted(Sample),
    /// The session buffer was emptied
    Cleared,
    /// Session lifecycle state changed
    StatusChanged(SessionStatus),
    /// Worker is shutting down
    Shutdown,
}

/// Counters kept by the acquisition worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Ticks executed
    pub ticks: u64,
    /// Lines taken from the link
    pub lines_read: u64,
    /// Lines decoded into samples
    pub samples_accepted: u64,
    /// Lines discarded by the decoder
    pub lines_skipped: u64,
    /// Ticks that ended with a link error
    pub tick_errors: u64,
    /// Ticks that panicked
    pub tick_panics: u64,
    /// Messages dropped because the operator queue was full
    pub dropped_messages: u64,
}

/// Snapshot of the worker state for the operator
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: SessionStatus,
    pub connection: ConnectionStatus,
    pub port: String,
    pub sample_count: usize,
    pub display: DisplayValues,
    pub stats: AcquisitionStats,
}

/// Operator-side handle to the acquisition worker
#[derive(Clone)]
pub struct OperatorHandle {
    command_tx: Sender<AcquisitionCommand>,
    message_rx: Receiver<AcquisitionMessage>,
    reply_timeout: Duration,
}

impl OperatorHandle {
    /// Try to receive a message without blocking
    pub fn try_recv(&self) -> Option<AcquisitionMessage> {
        self.message_rx.try_recv().ok()
    }

    /// Receive all pending messages
    pub fn drain(&self) -> Vec<AcquisitionMessage> {
        self.message_rx.try_iter().collect()
    }

    /// Receiver for worker messages, for use on another thread
    pub fn messages(&self) -> Receiver<AcquisitionMessage> {
        self.message_rx.clone()
    }

    /// Send a raw command
    pub fn send_command(&self, cmd: AcquisitionCommand) -> bool {
        self.command_tx.send(cmd).is_ok()
    }

    /// Start (or restart) a session and wait for the outcome
    pub fn start(&self) -> Result<()> {
        self.request(|reply| AcquisitionCommand::Start { reply })?
            .map_err(UroflowError::from)
    }

    /// Stop the running session
    pub fn stop(&self) -> Result<()> {
        self.post(AcquisitionCommand::Stop)
    }

    /// Empty the session buffer
    pub fn clear(&self) -> Result<()> {
        self.post(AcquisitionCommand::Clear)
    }

    /// Export the current session
    pub fn export(&self, metadata: PatientMetadata) -> Result<SessionSnapshot> {
        self.request(|reply| AcquisitionCommand::Export { metadata, reply })?
            .map_err(UroflowError::from)
    }

    /// Close and reopen the device link
    pub fn reconnect(&self) -> Result<()> {
        self.request(|reply| AcquisitionCommand::Reconnect { reply })?
            .map_err(UroflowError::from)
    }

    /// Current worker state
    pub fn status(&self) -> Result<StatusReport> {
        self.request(|reply| AcquisitionCommand::RequestStatus { reply })
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(AcquisitionCommand::Shutdown);
    }

    fn post(&self, cmd: AcquisitionCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|_| UroflowError::Channel("acquisition worker is not running".into()))
    }

    fn request<T>(&self, make: impl FnOnce(Sender<T>) -> AcquisitionCommand) -> Result<T> {
        let (reply_tx, reply_rx) = bounded(1);
        self.post(make(reply_tx))?;
        reply_rx
            .recv_timeout(self.reply_timeout)
            .map_err(|e| match e {
                RecvTimeoutError::Timeout => UroflowError::Channel(format!(
                    "no reply from acquisition worker within {:?}",
                    self.reply_timeout
                )),
                RecvTimeoutError::Disconnected => {
                    UroflowError::Channel("acquisition worker dropped the request".into())
                }
            })
    }
}

/// The acquisition backend that runs in a separate thread
pub struct AcquisitionBackend {
    config: AppConfig,
    link: Box<dyn DeviceLink>,
    display: Option<Box<dyn DisplaySink>>,
    command_rx: Receiver<AcquisitionCommand>,
    message_tx: Sender<AcquisitionMessage>,
    running: Arc<AtomicBool>,
}

impl AcquisitionBackend {
    /// Create a backend around `link` with its communication channels
    pub fn new(config: AppConfig, link: Box<dyn DeviceLink>) -> (Self, OperatorHandle) {
        let (cmd_tx, cmd_rx) = bounded(256);
        // Bounded for backpressure; the worker drops messages rather than block.
        let (msg_tx, msg_rx) = bounded(config.acquisition.channel_buffer_size.max(1));

        let handle = OperatorHandle {
            command_tx: cmd_tx,
            message_rx: msg_rx,
            reply_timeout: config.acquisition.command_timeout(),
        };

        let backend = Self {
            config,
            link,
            display: None,
            command_rx: cmd_rx,
            message_tx: msg_tx,
            running: Arc::new(AtomicBool::new(true)),
        };

        (backend, handle)
    }

    /// Attach a display collaborator
    pub fn with_display_sink(mut self, sink: Box<dyn DisplaySink>) -> Self {
        self.display = Some(sink);
        self
    }

    /// Get a handle to stop the backend
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Run the worker loop on the current thread
    pub fn run(self) {
        let mut worker = AcquisitionWorker::new(
            self.config,
            self.link,
            self.display,
            self.command_rx,
            self.message_tx,
            self.running,
        );
        worker.run();
    }

    /// Run the worker loop on a new named thread
    pub fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("uroflow-acquisition".into())
            .spawn(move || self.run())
    }
}
