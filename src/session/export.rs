//! Session export: patient metadata and the immutable session snapshot
//!
//! A [`SessionSnapshot`] is what persistence and reporting collaborators
//! receive when the operator saves a measurement. It owns a copy of every
//! sample, so later changes to the live buffer never reach it.

use crate::error::ExportError;
use crate::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oldest accepted patient age
pub const MAX_AGE: u32 = 150;

/// Patient gender as recorded on the report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
}

impl Gender {
    /// Display name
    pub fn display_name(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for Gender {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "male" | "m" => Ok(Gender::Male),
            "female" | "f" => Ok(Gender::Female),
            other => Err(ExportError::InvalidField {
                field: "gender",
                message: format!("expected Male or Female, got {:?}", other),
            }),
        }
    }
}

/// Patient and encounter details supplied by the operator at save time
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PatientMetadata {
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub patient_id: String,
    pub gender: Gender,
    pub doctor_first_name: String,
    pub doctor_last_name: String,
    pub hospital_name: String,
    pub hospital_address: String,
}

impl PatientMetadata {
    /// Check that every field is filled in
    ///
    /// Text fields must be non-blank and the age must lie in `0..=150`.
    pub fn validate(&self) -> Result<(), ExportError> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("patient_id", &self.patient_id),
            ("doctor_first_name", &self.doctor_first_name),
            ("doctor_last_name", &self.doctor_last_name),
            ("hospital_name", &self.hospital_name),
            ("hospital_address", &self.hospital_address),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ExportError::MissingField(field));
            }
        }

        if self.age > MAX_AGE {
            return Err(ExportError::InvalidField {
                field: "age",
                message: format!("{} is outside 0-{}", self.age, MAX_AGE),
            });
        }

        Ok(())
    }

    /// Patient full name
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Referring doctor as printed on the report
    pub fn doctor_display(&self) -> String {
        format!("Dr. {} {} Sp. U", self.doctor_first_name, self.doctor_last_name)
    }
}

/// Immutable copy of a finished session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Patient and encounter details
    pub metadata: PatientMetadata,
    /// All samples in arrival order
    pub samples: Vec<Sample>,
    /// Wall-clock time the session was started
    pub started_at: Option<DateTime<Utc>>,
    /// Wall-clock time of the export
    pub exported_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the snapshot holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Elapsed-time series in seconds
    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.elapsed_seconds).collect()
    }

    /// Flow-rate series in mL/s
    pub fn flow_series(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.flow_rate).collect()
    }

    /// Volume series in mL
    pub fn volume_series(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.volume).collect()
    }

    /// Volume of the last sample, in mL
    pub fn final_volume(&self) -> f64 {
        self.samples.last().map(|s| s.volume).unwrap_or(0.0)
    }

    /// Highest flow rate seen, in mL/s
    pub fn peak_flow_rate(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.flow_rate)
            .fold(0.0, f64::max)
    }

    /// Elapsed time of the last sample, in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.last().map(|s| s.elapsed_seconds).unwrap_or(0.0)
    }
}
