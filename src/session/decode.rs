//! Decoding of device lines into readings
//!
//! A line is accepted only when it has exactly two comma-separated fields
//! that each parse as a finite number. Anything else is protocol noise: it is
//! reported as [`Decoded::Skip`] with a reason rather than as an error, so the
//! acquisition loop can log it and move on.

use thiserror::Error;

/// Why a line was discarded
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The line was blank
    #[error("empty line")]
    Empty,

    /// Wrong number of comma-separated fields
    #[error("expected 2 fields, found {0}")]
    FieldCount(usize),

    /// A field is not a number
    #[error("{field} is not a number: {text:?}")]
    InvalidNumber { field: &'static str, text: String },

    /// A field parsed to NaN or infinity
    #[error("{field} is not finite")]
    NonFinite { field: &'static str },
}

/// Result of decoding one line
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A valid (flow rate, volume) reading
    Sample { flow_rate: f64, volume: f64 },
    /// The line was discarded
    Skip(SkipReason),
}

/// Decode a `"<flow>,<volume>"` line
pub fn decode_line(line: &str) -> Decoded {
    let line = line.trim();
    if line.is_empty() {
        return Decoded::Skip(SkipReason::Empty);
    }

    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() != 2 {
        return Decoded::Skip(SkipReason::FieldCount(fields.len()));
    }

    let flow_rate = match parse_field("flow rate", fields[0]) {
        Ok(v) => v,
        Err(reason) => return Decoded::Skip(reason),
    };
    let volume = match parse_field("volume", fields[1]) {
        Ok(v) => v,
        Err(reason) => return Decoded::Skip(reason),
    };

    Decoded::Sample { flow_rate, volume }
}

fn parse_field(field: &'static str, text: &str) -> Result<f64, SkipReason> {
    let text = text.trim();
    let value: f64 = text.parse().map_err(|_| SkipReason::InvalidNumber {
        field,
        text: text.to_string(),
    })?;
    if !value.is_finite() {
        return Err(SkipReason::NonFinite { field });
    }
    Ok(value)
}
