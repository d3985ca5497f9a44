//! Session state machine
//!
//! ```text
//!            Start (link open)
//!   Idle ───────────────────────► Running ◄──┐
//!    ▲                             │   │     │ Start (restart)
//!    │ Clear                  Stop │   └─────┘ Clear keeps Running
//!    │                             ▼
//!    └──────────────────────── Stopped
//! ```
//!
//! The session owns the clock, the sample buffer and the derived display
//! values. Transitions are the only mutators of the status and clock. Every
//! time-dependent operation has an `_at` variant taking an explicit
//! [`Instant`] so tests can drive the clock.

use super::buffer::SampleBuffer;
use super::decode::{decode_line, Decoded};
use super::export::{PatientMetadata, SessionSnapshot};
use crate::error::{ExportError, SessionError};
use crate::link::DeviceLink;
use crate::types::{DisplayValues, Sample, SessionStatus};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// The single measurement session
#[derive(Debug)]
pub struct Session {
    status: SessionStatus,
    start_time: Instant,
    started_at: Option<DateTime<Utc>>,
    buffer: SampleBuffer,
    display: DisplayValues,
    skipped_lines: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Create an idle session with an empty buffer
    pub fn new() -> Self {
        Self {
            status: SessionStatus::Idle,
            start_time: Instant::now(),
            started_at: None,
            buffer: SampleBuffer::new(),
            display: DisplayValues::default(),
            skipped_lines: 0,
        }
    }

    /// Current lifecycle state
    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Samples of the current (or last) session
    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Latest flow rate and volume
    pub fn display(&self) -> &DisplayValues {
        &self.display
    }

    /// Monotonic instant the session was started
    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Wall-clock time the session was started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Number of lines discarded by the decoder since the last start
    pub fn skipped_lines(&self) -> u64 {
        self.skipped_lines
    }

    /// Start (or restart) a session
    pub fn start(&mut self, link: &mut dyn DeviceLink) -> Result<(), SessionError> {
        self.start_at(link, Instant::now())
    }

    /// Start (or restart) a session with `now` as its zero point
    ///
    /// Requires an open link. The start byte is written before any state
    /// changes, so a failed write leaves the session as it was.
    pub fn start_at(
        &mut self,
        link: &mut dyn DeviceLink,
        now: Instant,
    ) -> Result<(), SessionError> {
        if !link.is_open() {
            tracing::warn!("Start refused: device link {} is not open", link.port_name());
            return Err(SessionError::LinkUnavailable);
        }

        link.send_start_command()
            .map_err(SessionError::StartCommand)?;

        if self.status.is_running() {
            tracing::info!(
                "Restarting session, discarding {} samples",
                self.buffer.len()
            );
        }

        self.status = SessionStatus::Running;
        self.start_time = now;
        self.started_at = Some(Utc::now());
        self.buffer.clear();
        self.display.reset();
        self.skipped_lines = 0;

        tracing::info!("Session started");
        Ok(())
    }

    /// Stop the running session, keeping its samples
    ///
    /// Returns `false` (and changes nothing) outside `Running`.
    pub fn stop(&mut self) -> bool {
        if !self.status.is_running() {
            tracing::debug!("Stop ignored in state {}", self.status);
            return false;
        }
        self.status = SessionStatus::Stopped;
        tracing::info!("Session stopped with {} samples", self.buffer.len());
        true
    }

    /// Empty the buffer and reset the display values
    ///
    /// A running session keeps running into the fresh buffer; a stopped one
    /// returns to `Idle`.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.display.reset();
        if self.status == SessionStatus::Stopped {
            self.status = SessionStatus::Idle;
        }
        tracing::debug!("Session cleared, state {}", self.status);
    }

    /// Decode a device line and append it if valid
    pub fn ingest_line(&mut self, line: &str) -> Option<Sample> {
        self.ingest_line_at(line, Instant::now())
    }

    /// Decode a device line received at `now` and append it if valid
    ///
    /// Lines are ignored outside `Running`. Malformed lines are logged and
    /// counted but never reach the buffer.
    pub fn ingest_line_at(&mut self, line: &str, now: Instant) -> Option<Sample> {
        if !self.status.is_running() {
            return None;
        }

        match decode_line(line) {
            Decoded::Sample { flow_rate, volume } => {
                let mut elapsed = now.saturating_duration_since(self.start_time).as_secs_f64();
                if let Some(last) = self.buffer.latest() {
                    elapsed = elapsed.max(last.elapsed_seconds);
                }
                let sample = Sample::new(elapsed, flow_rate, volume);
                self.buffer.append(sample);
                self.display.update(&sample);
                Some(sample)
            }
            Decoded::Skip(reason) => {
                self.skipped_lines += 1;
                tracing::warn!("Discarding line {:?}: {}", line, reason);
                None
            }
        }
    }

    /// Copy the session out together with the patient details
    pub fn export(&self, metadata: PatientMetadata) -> Result<SessionSnapshot, ExportError> {
        if self.buffer.is_empty() {
            return Err(ExportError::EmptySession);
        }
        metadata.validate()?;

        Ok(SessionSnapshot {
            metadata,
            samples: self.buffer.snapshot(),
            started_at: self.started_at,
            exported_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::MockLink;
    use crate::session::Gender;
    use std::time::Duration;

    fn metadata() -> PatientMetadata {
        PatientMetadata {
            first_name: "Ani".into(),
            last_name: "Lestari".into(),
            age: 41,
            patient_id: "P-42".into(),
            gender: Gender::Female,
            doctor_first_name: "Rudi".into(),
            doctor_last_name: "Hartono".into(),
            hospital_name: "RSU Sehat".into(),
            hospital_address: "Jl. Sudirman 5".into(),
        }
    }

    fn running_session() -> (Session, Instant) {
        let (mut link, _handle) = MockLink::new();
        let mut session = Session::new();
        let t0 = Instant::now();
        session.start_at(&mut link, t0).unwrap();
        (session, t0)
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.buffer().is_empty());
        assert!(session.started_at().is_none());
    }

    #[test]
    fn test_start_sends_start_byte() {
        let (mut link, handle) = MockLink::new();
        let mut session = Session::new();
        session.start(&mut link).unwrap();
        assert_eq!(session.status(), SessionStatus::Running);
        assert_eq!(handle.written(), vec![b'A']);
    }

    #[test]
    fn test_start_requires_open_link() {
        let (mut link, handle) = MockLink::closed();
        let mut session = Session::new();
        assert!(matches!(
            session.start(&mut link),
            Err(SessionError::LinkUnavailable)
        ));
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(handle.written().is_empty());
    }

    #[test]
    fn test_start_refused_keeps_stopped_data() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("10.0,5.0", t0 + Duration::from_millis(100));
        session.stop();

        let (mut closed, _) = MockLink::closed();
        assert!(session.start(&mut closed).is_err());
        assert_eq!(session.status(), SessionStatus::Stopped);
        assert_eq!(session.buffer().len(), 1);
    }

    #[test]
    fn test_scenario_two_lines_in_order() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("10.0,5.0", t0 + Duration::from_millis(100));
        session.ingest_line_at("20.0,15.0", t0 + Duration::from_millis(200));

        let buffer = session.buffer();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.volume_series(), vec![5.0, 15.0]);
        let times = buffer.times();
        assert!(times[0] < times[1]);
        assert_eq!(session.display().volume_label(), "Volume: 15.00 mL");
    }

    #[test]
    fn test_stop_halts_appends() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("10.0,5.0", t0);
        assert!(session.stop());
        assert!(session.ingest_line("20.0,15.0").is_none());
        assert_eq!(session.buffer().len(), 1);
        assert_eq!(session.status(), SessionStatus::Stopped);
    }

    #[test]
    fn test_stop_outside_running_is_noop() {
        let mut session = Session::new();
        assert!(!session.stop());
        assert_eq!(session.status(), SessionStatus::Idle);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let (mut session, t0) = running_session();
        assert!(session.ingest_line_at("abc", t0).is_none());
        assert_eq!(session.buffer().len(), 0);
        assert_eq!(session.skipped_lines(), 1);

        assert!(session.ingest_line_at("1.0,2.0", t0).is_some());
        assert_eq!(session.buffer().len(), 1);
    }

    #[test]
    fn test_start_resets_buffer() {
        let (mut link, _handle) = MockLink::new();
        let mut session = Session::new();
        let t0 = Instant::now();
        session.start_at(&mut link, t0).unwrap();
        session.ingest_line_at("1.0,1.0", t0 + Duration::from_secs(5));

        let t1 = t0 + Duration::from_secs(10);
        session.start_at(&mut link, t1).unwrap();
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(session.buffer().is_empty());
        assert_eq!(session.display(), &DisplayValues::default());

        let sample = session
            .ingest_line_at("2.0,2.0", t1 + Duration::from_millis(500))
            .unwrap();
        assert!((sample.elapsed_seconds - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_clear_while_running_keeps_running() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("1.0,1.0", t0);
        session.clear();
        assert_eq!(session.status(), SessionStatus::Running);
        assert!(session.buffer().is_empty());

        session.ingest_line_at("2.0,2.0", t0 + Duration::from_millis(50));
        assert_eq!(session.buffer().len(), 1);
    }

    #[test]
    fn test_clear_from_stopped_goes_idle() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("1.0,1.0", t0);
        session.stop();
        session.clear();
        assert_eq!(session.status(), SessionStatus::Idle);
        assert!(session.buffer().is_empty());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("1.0,1.0", t0);
        session.stop();

        session.clear();
        let status = session.status();
        let display = *session.display();
        session.clear();
        assert_eq!(session.status(), status);
        assert_eq!(session.display(), &display);
        assert!(session.buffer().is_empty());
    }

    #[test]
    fn test_elapsed_never_decreases() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("1.0,1.0", t0 + Duration::from_millis(300));
        let sample = session
            .ingest_line_at("2.0,2.0", t0 + Duration::from_millis(100))
            .unwrap();
        assert!(sample.elapsed_seconds >= 0.3);
    }

    #[test]
    fn test_export_empty_session() {
        let session = Session::new();
        assert_eq!(
            session.export(metadata()).unwrap_err(),
            ExportError::EmptySession
        );
    }

    #[test]
    fn test_export_missing_field() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("1.0,1.0", t0);
        let mut m = metadata();
        m.patient_id.clear();
        assert_eq!(
            session.export(m).unwrap_err(),
            ExportError::MissingField("patient_id")
        );
    }

    #[test]
    fn test_export_snapshot_is_independent() {
        let (mut session, t0) = running_session();
        session.ingest_line_at("10.0,5.0", t0);
        session.ingest_line_at("20.0,15.0", t0 + Duration::from_millis(100));

        let snapshot = session.export(metadata()).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.started_at.is_some());

        session.clear();
        session.ingest_line_at("99.0,99.0", t0 + Duration::from_millis(200));
        assert_eq!(snapshot.volume_series(), vec![5.0, 15.0]);
    }
}
