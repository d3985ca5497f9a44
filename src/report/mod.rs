//! Measurement reports
//!
//! A report is rendered from a [`SessionSnapshot`] when the operator saves a
//! measurement. Its file stem is `{patient_id}_{first}_{last}`, which is also
//! how the history finds (and deletes) a patient's report later.
//!
//! The default [`CsvReportRenderer`] writes a metadata block followed by the
//! time/flow/volume series:
//!
//! ```text
//! Hospital,RS Harapan
//! Address,"Jl. Merdeka 1, Jakarta"
//! Date,2024-05-01 09:30
//! Patient ID,P-001
//! Name,Budi Santoso
//! Gender,Male
//! Doctor,Dr. Sari Wijaya Sp. U
//! Final volume (mL),312.40
//!
//! time_s,flow_rate_ml_s,volume_ml
//! 0.100,0.00,0.00
//! ```

use crate::config::ensure_dir;
use crate::error::{Result, ResultExt};
use crate::session::{PatientMetadata, SessionSnapshot};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Report collaborator for exported sessions
pub trait ReportRenderer {
    /// Render the report and return where it was written
    fn render(&self, snapshot: &SessionSnapshot) -> Result<PathBuf>;

    /// Where the report of this patient lives (whether or not it exists)
    fn report_path(&self, metadata: &PatientMetadata) -> PathBuf;

    /// Delete the report of this patient; returns whether a file was removed
    fn remove_report(&self, metadata: &PatientMetadata) -> Result<bool>;
}

/// File stem shared by every report format
///
/// Path separators and characters Windows reserves in file names are
/// replaced so a patient field can never escape the reports directory or
/// make the file uncreatable.
pub fn report_file_stem(metadata: &PatientMetadata) -> String {
    format!(
        "{}_{}_{}",
        metadata.patient_id.trim(),
        metadata.first_name.trim(),
        metadata.last_name.trim()
    )
    .chars()
    .map(|c| match c {
        '/' | '\\' | ':' | '"' | '?' | '*' | '<' | '>' | '|' => '_',
        c if c.is_control() => '_',
        c => c,
    })
    .collect()
}

/// Renders reports as CSV files
#[derive(Debug, Clone)]
pub struct CsvReportRenderer {
    reports_dir: PathBuf,
}

impl CsvReportRenderer {
    /// Create a renderer writing into `reports_dir`
    pub fn new(reports_dir: impl Into<PathBuf>) -> Self {
        Self {
            reports_dir: reports_dir.into(),
        }
    }

    /// Directory reports are written to
    pub fn reports_dir(&self) -> &std::path::Path {
        &self.reports_dir
    }

    fn write_report(&self, path: &std::path::Path, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        let m = &snapshot.metadata;
        let date = snapshot
            .exported_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M");

        let mut out = BufWriter::new(std::fs::File::create(path)?);
        writeln!(out, "Hospital,{}", csv_field(&m.hospital_name))?;
        writeln!(out, "Address,{}", csv_field(&m.hospital_address))?;
        writeln!(out, "Date,{}", date)?;
        writeln!(out, "Patient ID,{}", csv_field(&m.patient_id))?;
        writeln!(out, "Name,{}", csv_field(&m.full_name()))?;
        writeln!(out, "Gender,{}", m.gender)?;
        writeln!(out, "Doctor,{}", csv_field(&m.doctor_display()))?;
        writeln!(out, "Final volume (mL),{:.2}", snapshot.final_volume())?;
        writeln!(out)?;
        writeln!(out, "time_s,flow_rate_ml_s,volume_ml")?;
        for s in &snapshot.samples {
            writeln!(out, "{:.3},{:.2},{:.2}", s.elapsed_seconds, s.flow_rate, s.volume)?;
        }
        out.flush()
    }
}

impl ReportRenderer for CsvReportRenderer {
    fn render(&self, snapshot: &SessionSnapshot) -> Result<PathBuf> {
        ensure_dir(&self.reports_dir)?;

        let path = self.report_path(&snapshot.metadata);
        if path.exists() {
            tracing::warn!("Overwriting existing report {:?}", path);
        }

        self.write_report(&path, snapshot)
            .with_context(|| format!("Failed to write report {:?}", path))?;

        tracing::info!("Report written to {:?}", path);
        Ok(path)
    }

    fn report_path(&self, metadata: &PatientMetadata) -> PathBuf {
        self.reports_dir
            .join(format!("{}.csv", report_file_stem(metadata)))
    }

    fn remove_report(&self, metadata: &PatientMetadata) -> Result<bool> {
        let path = self.report_path(metadata);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).with_context(|| format!("Failed to remove report {:?}", path))?;
        tracing::info!("Report {:?} removed", path);
        Ok(true)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
