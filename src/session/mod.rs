//! Measurement session module
//!
//! This module owns everything about one uroflowmetry measurement: turning
//! device lines into samples, keeping them in order, the
//! Idle/Running/Stopped lifecycle and the snapshot handed out when the
//! operator saves the measurement.
//!
//! # Components
//!
//! - [`SampleBuffer`] - Append-only ordered store of samples
//! - [`decode_line`] - Line decoder yielding [`Decoded::Sample`] or [`Decoded::Skip`]
//! - [`Session`] - State machine owning the clock, buffer and display values
//! - [`SessionSnapshot`] / [`PatientMetadata`] - Export contract

pub mod buffer;
pub mod decode;
pub mod export;
pub mod machine;

pub use buffer::SampleBuffer;
pub use decode::{decode_line, Decoded, SkipReason};
pub use export::{Gender, PatientMetadata, SessionSnapshot};
pub use machine::Session;
