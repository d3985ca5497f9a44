//! Measurement history
//!
//! Saved measurements are kept in a single pretty-printed JSON file. Each
//! save appends a [`StoredMeasurement`] with an auto-incremented record
//! number. The file is rewritten through a temporary sibling and a rename, so
//! a crash mid-write leaves the previous history intact.
//!
//! # Example
//!
//! ```ignore
//! use uroflow_rs::storage::{JsonSessionStore, SessionStore};
//!
//! let mut store = JsonSessionStore::open("history.json")?;
//! let record_no = store.save(&snapshot)?;
//! for record in store.list()? {
//!     println!("{} {}", record.record_no, record.metadata.full_name());
//! }
//! ```

use crate::error::{Result, UroflowError};
use crate::report::ReportRenderer;
use crate::session::{PatientMetadata, SessionSnapshot};
use crate::types::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Persistence collaborator for exported sessions
pub trait SessionStore {
    /// Persist a snapshot and return its record number
    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<u64>;

    /// All records, newest first
    fn list(&self) -> Result<Vec<StoredMeasurement>>;

    /// Records of one patient, newest first
    fn find_by_patient(&self, patient_id: &str) -> Result<Vec<StoredMeasurement>>;

    /// Remove every record of one patient; returns how many were removed
    fn delete_by_patient(&mut self, patient_id: &str) -> Result<usize>;
}

/// One saved measurement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMeasurement {
    /// Auto-incremented record number
    pub record_no: u64,
    /// When the record was saved
    pub created_at: DateTime<Utc>,
    /// When the session was started
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    /// Patient and encounter details
    pub metadata: PatientMetadata,
    /// Captured samples
    pub samples: Vec<Sample>,
}

impl StoredMeasurement {
    /// Volume of the last sample, or zero for an empty record
    pub fn final_volume(&self) -> f64 {
        self.samples.last().map_or(0.0, |s| s.volume)
    }

    /// Rebuild the snapshot this record was saved from
    pub fn to_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            metadata: self.metadata.clone(),
            samples: self.samples.clone(),
            started_at: self.started_at,
            exported_at: self.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct HistoryFile {
    next_record_no: u64,
    records: Vec<StoredMeasurement>,
}

/// History kept in a JSON file
#[derive(Debug)]
pub struct JsonSessionStore {
    path: PathBuf,
    history: HistoryFile,
}

impl JsonSessionStore {
    /// Open the history at `path`, starting empty if the file does not exist
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let history = if path.exists() {
            let json = std::fs::read_to_string(&path).map_err(|e| {
                UroflowError::Storage(format!("Failed to read history {:?}: {}", path, e))
            })?;
            serde_json::from_str(&json).map_err(|e| {
                UroflowError::Storage(format!("Corrupt history file {:?}: {}", path, e))
            })?
        } else {
            tracing::debug!("No history at {:?}, starting empty", path);
            HistoryFile {
                next_record_no: 1,
                records: Vec::new(),
            }
        };

        Ok(Self { path, history })
    }

    /// Location of the history file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.history.records.len()
    }

    /// Whether the history holds no records
    pub fn is_empty(&self) -> bool {
        self.history.records.is_empty()
    }

    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            crate::config::ensure_dir(parent)?;
        }

        let json = serde_json::to_string_pretty(&self.history)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| {
            UroflowError::Storage(format!("Failed to write history {:?}: {}", tmp, e))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            UroflowError::Storage(format!("Failed to replace history {:?}: {}", self.path, e))
        })
    }

    fn newest_first<'a>(records: impl Iterator<Item = &'a StoredMeasurement>) -> Vec<StoredMeasurement> {
        let mut out: Vec<StoredMeasurement> = records.cloned().collect();
        out.sort_by(|a, b| b.record_no.cmp(&a.record_no));
        out
    }
}

impl SessionStore for JsonSessionStore {
    fn save(&mut self, snapshot: &SessionSnapshot) -> Result<u64> {
        let record_no = self.history.next_record_no.max(1);
        self.history.records.push(StoredMeasurement {
            record_no,
            created_at: Utc::now(),
            started_at: snapshot.started_at,
            metadata: snapshot.metadata.clone(),
            samples: snapshot.samples.clone(),
        });
        self.history.next_record_no = record_no + 1;

        if let Err(e) = self.persist() {
            self.history.records.pop();
            self.history.next_record_no = record_no;
            return Err(e);
        }

        tracing::info!(
            "Saved measurement #{} for patient {}",
            record_no,
            snapshot.metadata.patient_id
        );
        Ok(record_no)
    }

    fn list(&self) -> Result<Vec<StoredMeasurement>> {
        Ok(Self::newest_first(self.history.records.iter()))
    }

    fn find_by_patient(&self, patient_id: &str) -> Result<Vec<StoredMeasurement>> {
        Ok(Self::newest_first(
            self.history
                .records
                .iter()
                .filter(|r| r.metadata.patient_id == patient_id),
        ))
    }

    fn delete_by_patient(&mut self, patient_id: &str) -> Result<usize> {
        let before = self.history.records.len();
        let kept: Vec<StoredMeasurement> = self
            .history
            .records
            .iter()
            .filter(|r| r.metadata.patient_id != patient_id)
            .cloned()
            .collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let previous = std::mem::replace(&mut self.history.records, kept);
        if let Err(e) = self.persist() {
            self.history.records = previous;
            return Err(e);
        }

        tracing::info!("Deleted {} record(s) of patient {}", removed, patient_id);
        Ok(removed)
    }
}

/// Save a snapshot to the history, then render its report
///
/// The record is kept even when rendering fails; the report path is `None`
/// in that case and the report can be rendered again from the history.
pub fn save_measurement(
    store: &mut dyn SessionStore,
    renderer: &dyn ReportRenderer,
    snapshot: &SessionSnapshot,
) -> Result<(u64, Option<PathBuf>)> {
    let record_no = store.save(snapshot)?;
    match renderer.render(snapshot) {
        Ok(path) => Ok((record_no, Some(path))),
        Err(e) => {
            tracing::warn!(
                "Measurement #{} saved but its report failed: {}",
                record_no,
                e
            );
            Ok((record_no, None))
        }
    }
}

/// Delete a patient's records together with their rendered reports
pub fn delete_patient(
    store: &mut dyn SessionStore,
    renderer: &dyn ReportRenderer,
    patient_id: &str,
) -> Result<usize> {
    let records = store.find_by_patient(patient_id)?;
    let removed = store.delete_by_patient(patient_id)?;

    for record in &records {
        if let Err(e) = renderer.remove_report(&record.metadata) {
            tracing::warn!(
                "Failed to remove report of patient {}: {}",
                patient_id,
                e
            );
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::CsvReportRenderer;
    use crate::session::Gender;

    fn snapshot(patient_id: &str, volume: f64) -> SessionSnapshot {
        SessionSnapshot {
            metadata: PatientMetadata {
                first_name: "Dewi".into(),
                last_name: "Putri".into(),
                age: 33,
                patient_id: patient_id.into(),
                gender: Gender::Female,
                doctor_first_name: "Agus".into(),
                doctor_last_name: "Salim".into(),
                hospital_name: "RS Medika".into(),
                hospital_address: "Jl. Diponegoro 9".into(),
            },
            samples: vec![Sample::new(0.1, 10.0, volume)],
            started_at: Some(Utc::now()),
            exported_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonSessionStore::open(dir.path().join("history.json")).unwrap();
        assert!(store.is_empty());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_record_numbers_increment() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonSessionStore::open(dir.path().join("history.json")).unwrap();
        assert_eq!(store.save(&snapshot("P1", 5.0)).unwrap(), 1);
        assert_eq!(store.save(&snapshot("P2", 6.0)).unwrap(), 2);

        let list = store.list().unwrap();
        assert_eq!(list[0].record_no, 2);
        assert_eq!(list[1].record_no, 1);
    }

    #[test]
    fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("history.json");
        {
            let mut store = JsonSessionStore::open(&path).unwrap();
            store.save(&snapshot("P1", 5.0)).unwrap();
        }

        let mut store = JsonSessionStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.save(&snapshot("P1", 7.0)).unwrap(), 2);
        let found = store.find_by_patient("P1").unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].to_snapshot().final_volume(), 7.0);
        assert_eq!(found[0].final_volume(), 7.0);
    }

    #[test]
    fn test_save_measurement_renders_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonSessionStore::open(dir.path().join("history.json")).unwrap();
        let renderer = CsvReportRenderer::new(dir.path().join("reports"));

        let (record_no, report) =
            save_measurement(&mut store, &renderer, &snapshot("P1", 4.0)).unwrap();
        assert_eq!(record_no, 1);
        assert!(report.expect("report path").exists());
    }

    #[test]
    fn test_save_measurement_keeps_record_when_report_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonSessionStore::open(dir.path().join("history.json")).unwrap();
        // A plain file where the reports directory should be
        let blocked = dir.path().join("reports");
        std::fs::write(&blocked, "").unwrap();
        let renderer = CsvReportRenderer::new(&blocked);

        let (record_no, report) =
            save_measurement(&mut store, &renderer, &snapshot("P1", 4.0)).unwrap();
        assert_eq!(record_no, 1);
        assert!(report.is_none());
        assert_eq!(store.find_by_patient("P1").unwrap().len(), 1);
    }

    #[test]
    fn test_delete_by_patient() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonSessionStore::open(dir.path().join("history.json")).unwrap();
        store.save(&snapshot("P1", 1.0)).unwrap();
        store.save(&snapshot("P2", 2.0)).unwrap();
        store.save(&snapshot("P1", 3.0)).unwrap();

        assert_eq!(store.delete_by_patient("P1").unwrap(), 2);
        assert_eq!(store.delete_by_patient("P1").unwrap(), 0);
        let list = store.list().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].metadata.patient_id, "P2");
    }

    #[test]
    fn test_corrupt_history_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonSessionStore::open(&path),
            Err(UroflowError::Storage(_))
        ));
    }
}
