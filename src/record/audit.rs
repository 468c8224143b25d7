//! Append-only audit log for recording lifecycle events.
//!
//! Fixed 4-column CSV schema: `Timestamp,Event,Threat Type,Confidence`.
//! Every row carries all four fields; absent values are empty strings.
//! The header row is written on the first append to an empty file.

use crate::record::RecordError;
use crate::types::Detection;
use std::io::Write;
use std::path::{Path, PathBuf};

const HEADER: &str = "Timestamp,Event,Threat Type,Confidence";

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    /// Open (or create) the audit log at `path`.
    pub fn open(path: &Path) -> Result<Self, RecordError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| RecordError::io(parent, e))?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Append one lifecycle event row.
    ///
    /// Threat fields are written as empty strings when no threat context
    /// accompanies the event — the schema is fixed-width, never sparse.
    pub fn append(&self, event: &str, threat: Option<&Detection>) -> Result<(), RecordError> {
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| RecordError::io(&self.path, e))?;

        let empty = file
            .metadata()
            .map_err(|e| RecordError::io(&self.path, e))?
            .len()
            == 0;
        if empty {
            writeln!(file, "{}", HEADER).map_err(|e| RecordError::io(&self.path, e))?;
        }

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
        let (threat_type, confidence) = match threat {
            Some(t) => (t.label.as_str(), format!("{:.1}", t.confidence)),
            None => ("", String::new()),
        };
        writeln!(file, "{},{},{},{}", timestamp, event, threat_type, confidence)
            .map_err(|e| RecordError::io(&self.path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_rows(log: &AuditLog) -> Vec<String> {
        std::fs::read_to_string(log.path())
            .expect("log readable")
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn header_written_once_on_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = AuditLog::open(&dir.path().join("audit.csv")).expect("open");

        log.append("Recording Started", None).expect("append");
        log.append("Recording Stopped", None).expect("append");

        let rows = read_rows(&log);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], "Timestamp,Event,Threat Type,Confidence");
        assert!(rows[1].contains("Recording Started"));
        assert!(rows[2].contains("Recording Stopped"));
    }

    #[test]
    fn rows_are_fixed_width_with_empty_threat_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = AuditLog::open(&dir.path().join("audit.csv")).expect("open");

        log.append("Recording Started", None).expect("append");
        let rows = read_rows(&log);
        // Three commas → four fields, trailing ones empty
        assert_eq!(rows[1].matches(',').count(), 3);
        assert!(rows[1].ends_with(",,"));
    }

    #[test]
    fn threat_fields_populated_when_present() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = AuditLog::open(&dir.path().join("audit.csv")).expect("open");

        let threat = Detection {
            label: "Gun".to_string(),
            confidence: 91.25,
        };
        log.append("Recording Started", Some(&threat)).expect("append");
        let rows = read_rows(&log);
        assert!(rows[1].ends_with(",Recording Started,Gun,91.2") || rows[1].contains(",Gun,91.2"));
    }
}
