//! Test data builders for creating test objects

use uroflow_rs::session::{Gender, PatientMetadata, SessionSnapshot};
use uroflow_rs::Sample;

/// Builder for creating test patient details
pub struct PatientMetadataBuilder {
    metadata: PatientMetadata,
}

impl PatientMetadataBuilder {
    pub fn new(patient_id: &str) -> Self {
        Self {
            metadata: PatientMetadata {
                first_name: "Budi".to_string(),
                last_name: "Santoso".to_string(),
                age: 54,
                patient_id: patient_id.to_string(),
                gender: Gender::Male,
                doctor_first_name: "Sari".to_string(),
                doctor_last_name: "Wijaya".to_string(),
                hospital_name: "RS Harapan".to_string(),
                hospital_address: "Jl. Merdeka 1".to_string(),
            },
        }
    }

    pub fn name(mut self, first: &str, last: &str) -> Self {
        self.metadata.first_name = first.to_string();
        self.metadata.last_name = last.to_string();
        self
    }

    pub fn gender(mut self, gender: Gender) -> Self {
        self.metadata.gender = gender;
        self
    }

    pub fn hospital(mut self, name: &str) -> Self {
        self.metadata.hospital_name = name.to_string();
        self
    }

    pub fn build(self) -> PatientMetadata {
        self.metadata
    }
}

/// Build a snapshot from `(flow, volume)` pairs spaced 100 ms apart
pub fn snapshot_from_pairs(metadata: PatientMetadata, pairs: &[(f64, f64)]) -> SessionSnapshot {
    SessionSnapshot {
        metadata,
        samples: pairs
            .iter()
            .enumerate()
            .map(|(i, &(flow, volume))| Sample::new((i + 1) as f64 * 0.1, flow, volume))
            .collect(),
        started_at: Some(chrono::Utc::now()),
        exported_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patient_builder() {
        let metadata = PatientMetadataBuilder::new("P-9")
            .name("Ani", "Lestari")
            .gender(Gender::Female)
            .build();

        assert_eq!(metadata.patient_id, "P-9");
        assert_eq!(metadata.full_name(), "Ani Lestari");
        assert!(metadata.validate().is_ok());
    }
}
