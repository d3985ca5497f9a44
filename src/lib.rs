//! # Uroflow-RS: Uroflowmetry Acquisition Engine
//!
//! Acquires flow-rate and volume readings from a uroflowmetry sensor over a
//! serial link, captures them into a timed measurement session and hands
//! finished sessions to persistence and reporting collaborators.
//!
//! ## Architecture
//!
//! - **Link**: serial connection to the sensor, line framing, control bytes
//! - **Session**: decode step, sample buffer and the Idle/Running/Stopped
//!   state machine
//! - **Acquisition**: periodic worker thread that owns the link and session;
//!   operator commands and ticks run on that one thread
//! - **Storage / Report**: JSON measurement history and CSV reports
//! - **Communication**: Crossbeam channels between operator and worker
//!
//! ## Configuration
//!
//! Configuration, history, reports and logs live in the platform data
//! directory under `id.edisonmedika.uroflow-rs` (see [`config`]).
//!
//! ## Example
//!
//! ```ignore
//! use uroflow_rs::{
//!     acquisition::AcquisitionBackend,
//!     config::AppConfig,
//!     link::SerialLink,
//! };
//!
//! let config = AppConfig::load_or_default(None);
//! let link = SerialLink::connect(config.link.clone())?;
//! let (backend, operator) = AcquisitionBackend::new(config, Box::new(link));
//! let worker = backend.spawn()?;
//!
//! operator.start()?;
//! // ... patient voids ...
//! operator.stop()?;
//! let snapshot = operator.export(metadata)?;
//! ```

pub mod acquisition;
pub mod config;
pub mod console;
pub mod error;
pub mod link;
pub mod report;
pub mod session;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use acquisition::{AcquisitionBackend, AcquisitionMessage, OperatorHandle};
pub use config::AppConfig;
pub use error::{Result, UroflowError};
pub use session::{PatientMetadata, Session, SessionSnapshot};
pub use types::{Sample, SessionStatus};
