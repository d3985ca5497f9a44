//! Acquisition worker thread
//!
//! This module contains the main worker loop that runs in a separate thread.
//! Each iteration drains pending operator commands, runs one supervised
//! acquisition tick and then sleeps out the rest of the tick period.
//!
//! A tick polls the device link only while the session is running and the
//! link is open. Link errors and panics raised inside a tick are caught and
//! logged; the loop always goes on to the next tick.

use super::{
    AcquisitionCommand, AcquisitionMessage, AcquisitionStats, DisplaySink, StatusReport,
};
use crate::config::{AcquisitionConfig, AppConfig};
use crate::error::{LinkError, SessionError};
use crate::link::DeviceLink;
use crate::session::Session;
use crate::types::{ConnectionStatus, SessionStatus};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// The acquisition worker that runs the polling loop
pub struct AcquisitionWorker {
    /// Loop timing
    config: AcquisitionConfig,
    /// Send the stop byte when a session is stopped
    send_stop_byte: bool,
    /// Command receiver from the operator
    command_rx: Receiver<AcquisitionCommand>,
    /// Message sender to the operator
    message_tx: Sender<AcquisitionMessage>,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Device link
    link: Box<dyn DeviceLink>,
    /// The measurement session
    session: Session,
    /// Optional chart collaborator
    display: Option<Box<dyn DisplaySink>>,
    /// Current connection status
    connection_status: ConnectionStatus,
    /// Statistics
    stats: AcquisitionStats,
    /// Start of the last tick for rate limiting
    last_tick_time: Instant,
}

impl AcquisitionWorker {
    /// Create a new acquisition worker
    pub fn new(
        config: AppConfig,
        link: Box<dyn DeviceLink>,
        display: Option<Box<dyn DisplaySink>>,
        command_rx: Receiver<AcquisitionCommand>,
        message_tx: Sender<AcquisitionMessage>,
        running: Arc<AtomicBool>,
    ) -> Self {
        let connection_status = if link.is_open() {
            ConnectionStatus::Connected
        } else {
            ConnectionStatus::Disconnected
        };

        Self {
            config: config.acquisition,
            send_stop_byte: config.link.send_stop_byte,
            command_rx,
            message_tx,
            running,
            link,
            session: Session::new(),
            display,
            connection_status,
            stats: AcquisitionStats::default(),
            last_tick_time: Instant::now(),
        }
    }

    /// Run the main worker loop
    pub fn run(&mut self) {
        tracing::info!(
            "Acquisition worker started on {} ({})",
            self.link.port_name(),
            self.connection_status.display_name()
        );
        self.try_send_message(AcquisitionMessage::LinkStatus(self.connection_status));

        while self.running.load(Ordering::SeqCst) {
            self.process_commands();
            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            self.supervised_tick();
            self.rate_limit();
        }

        // Cleanup
        if self.session.status().is_running() {
            self.send_stop_byte_if_enabled();
        }
        self.link.close();

        self.try_send_message(AcquisitionMessage::Shutdown);
        tracing::info!("Acquisition worker stopped");
    }

    /// Process pending commands from the operator
    fn process_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(cmd) => self.handle_command(cmd),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::debug!("Operator handle dropped, shutting down");
                    self.running.store(false, Ordering::SeqCst);
                    break;
                }
            }
        }
    }

    /// Handle a single command
    fn handle_command(&mut self, cmd: AcquisitionCommand) {
        match cmd {
            AcquisitionCommand::Start { reply } => {
                let result = self.start_session();
                let _ = reply.send(result);
            }
            AcquisitionCommand::Stop => self.stop_session(),
            AcquisitionCommand::Clear => self.clear_session(),
            AcquisitionCommand::Export { metadata, reply } => {
                let result = self.session.export(metadata);
                match &result {
                    Ok(snapshot) => {
                        tracing::info!("Exported session with {} samples", snapshot.len())
                    }
                    Err(e) => tracing::warn!("Export refused: {}", e),
                }
                let _ = reply.send(result);
            }
            AcquisitionCommand::Reconnect { reply } => {
                let result = self.reconnect();
                let _ = reply.send(result);
            }
            AcquisitionCommand::RequestStatus { reply } => {
                let _ = reply.send(self.status_report());
            }
            AcquisitionCommand::Shutdown => {
                tracing::info!("Shutdown requested");
                self.running.store(false, Ordering::SeqCst);
            }
        }
    }

    fn start_session(&mut self) -> Result<(), SessionError> {
        self.session.start(&mut *self.link)?;
        if let Some(display) = self.display.as_mut() {
            display.on_clear();
        }
        self.try_send_message(AcquisitionMessage::Cleared);
        self.try_send_message(AcquisitionMessage::StatusChanged(SessionStatus::Running));
        Ok(())
    }

    fn stop_session(&mut self) {
        if self.session.stop() {
            self.send_stop_byte_if_enabled();
            self.try_send_message(AcquisitionMessage::StatusChanged(SessionStatus::Stopped));
        }
    }

    fn clear_session(&mut self) {
        let before = self.session.status();
        self.session.clear();
        if let Some(display) = self.display.as_mut() {
            display.on_clear();
        }
        self.try_send_message(AcquisitionMessage::Cleared);

        let after = self.session.status();
        if after != before {
            self.try_send_message(AcquisitionMessage::StatusChanged(after));
        }
    }

    fn send_stop_byte_if_enabled(&mut self) {
        if !self.send_stop_byte || !self.link.is_open() {
            return;
        }
        if let Err(e) = self.link.send_stop_command() {
            tracing::warn!("Failed to send stop command: {}", e);
        }
    }

    fn reconnect(&mut self) -> Result<(), LinkError> {
        if self.session.stop() {
            tracing::info!("Session stopped for reconnect");
            self.try_send_message(AcquisitionMessage::StatusChanged(SessionStatus::Stopped));
        }

        self.link.close();
        match self.link.open() {
            Ok(()) => {
                self.update_connection_status(ConnectionStatus::Connected);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Reconnect to {} failed: {}", self.link.port_name(), e);
                self.update_connection_status(ConnectionStatus::Error);
                self.try_send_message(AcquisitionMessage::LinkError(e.to_string()));
                Err(e)
            }
        }
    }

    /// Run one tick, containing any error or panic it raises
    fn supervised_tick(&mut self) {
        self.stats.ticks += 1;
        match panic::catch_unwind(AssertUnwindSafe(|| self.tick())) {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                self.stats.tick_errors += 1;
                tracing::warn!("Acquisition tick failed: {}", e);
                self.try_send_message(AcquisitionMessage::LinkError(e.to_string()));
                self.check_link();
            }
            Err(payload) => {
                self.stats.tick_panics += 1;
                tracing::error!("Acquisition tick panicked: {}", panic_message(&*payload));
            }
        }
    }

    /// Drain available lines into the session; returns the number accepted
    fn tick(&mut self) -> Result<usize, LinkError> {
        if !self.session.status().is_running() {
            return Ok(0);
        }
        if !self.link.is_open() {
            self.check_link();
            return Ok(0);
        }

        let mut accepted = 0;
        for _ in 0..self.config.max_lines_per_tick.max(1) {
            let Some(line) = self.link.poll_line()? else {
                break;
            };
            self.stats.lines_read += 1;

            match self.session.ingest_line(&line) {
                Some(sample) => {
                    accepted += 1;
                    self.stats.samples_accepted += 1;
                    if let Some(display) = self.display.as_mut() {
                        display.on_sample(&sample, self.session.buffer());
                    }
                    self.try_send_message(AcquisitionMessage::SampleAccepted(sample));
                }
                None => self.stats.lines_skipped += 1,
            }
        }
        Ok(accepted)
    }

    /// Notice a link that closed underneath us
    fn check_link(&mut self) {
        if !self.link.is_open() && self.connection_status == ConnectionStatus::Connected {
            tracing::error!("Device link {} closed unexpectedly", self.link.port_name());
            self.update_connection_status(ConnectionStatus::Disconnected);
            self.try_send_message(AcquisitionMessage::LinkError(format!(
                "device link {} closed",
                self.link.port_name()
            )));
        }
    }

    /// Rate limit the polling loop
    fn rate_limit(&mut self) {
        let target_interval = self.config.tick_period();
        let elapsed = self.last_tick_time.elapsed();

        if elapsed < target_interval {
            std::thread::sleep(target_interval - elapsed);
        }

        self.last_tick_time = Instant::now();
    }

    fn status_report(&self) -> StatusReport {
        StatusReport {
            status: self.session.status(),
            connection: self.connection_status,
            port: self.link.port_name().to_string(),
            sample_count: self.session.buffer().len(),
            display: *self.session.display(),
            stats: self.stats.clone(),
        }
    }

    /// Update connection status and notify the operator
    fn update_connection_status(&mut self, status: ConnectionStatus) {
        self.connection_status = status;
        self.try_send_message(AcquisitionMessage::LinkStatus(status));
    }

    /// Try to send a message, tracking dropped messages if queue is full
    fn try_send_message(&mut self, msg: AcquisitionMessage) {
        if self.message_tx.try_send(msg).is_err() {
            self.stats.dropped_messages += 1;
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic payload"
    }
}
