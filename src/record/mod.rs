//! Evidence recording module
//!
//! Owns the {Idle, Recording} state machine, the active segment file, and
//! the audit log. Transitions are only ever invoked from the coordinator
//! tick task, so no internal locking is needed.
//!
//! ## State Machine
//!
//! ```text
//! Idle --start_recording--> Recording
//! Recording --append--> Recording            (self-loop; rollover inside)
//! Recording --stop_recording--> Idle
//! ```
//!
//! Invariant: a segment file handle is open if and only if the state is
//! Recording. `append` while Idle is a no-op. Re-entrant `start_recording`
//! is NOT suppressed here — the caller checks state first (policy lives in
//! the coordinator).

mod audit;
mod segment;

pub use audit::AuditLog;
pub use segment::SegmentWriter;

use crate::config::RecordingConfig;
use crate::types::{Detection, Frame};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("frame encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl RecordError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ============================================================================
// Recording Session
// ============================================================================

/// Exists only while the recorder state is Recording.
struct RecordingSession {
    writer: SegmentWriter,
    started_at: Instant,
}

// ============================================================================
// Evidence Recorder
// ============================================================================

pub struct EvidenceRecorder {
    dir: PathBuf,
    max_segment: Duration,
    jpeg_quality: u8,
    audit: AuditLog,
    session: Option<RecordingSession>,
    segments_written: u64,
}

impl EvidenceRecorder {
    pub fn new(cfg: &RecordingConfig) -> Result<Self, RecordError> {
        std::fs::create_dir_all(&cfg.dir).map_err(|e| RecordError::io(&cfg.dir, e))?;
        let audit = AuditLog::open(&cfg.log_file)?;
        Ok(Self {
            dir: cfg.dir.clone(),
            max_segment: Duration::from_secs(cfg.max_segment_secs),
            jpeg_quality: cfg.jpeg_quality,
            audit,
            session: None,
            segments_written: 0,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Path of the currently open segment, if any.
    pub fn active_segment(&self) -> Option<&Path> {
        self.session.as_ref().map(|s| s.writer.path())
    }

    /// Total segments finalized over the recorder's lifetime.
    pub fn segments_written(&self) -> u64 {
        self.segments_written
    }

    /// Idle → Recording: open a new timestamp-keyed segment and log the
    /// lifecycle event (with threat context when the start was triggered by
    /// a detection).
    ///
    /// Calling this while already Recording rolls a new session on top of
    /// the old one's handle; callers are expected to check
    /// [`is_recording`](Self::is_recording) first.
    pub fn start_recording(&mut self, threat: Option<&Detection>) -> Result<(), RecordError> {
        // Millisecond precision: a rollover landing in the same wall-clock
        // second must not reuse the previous segment's name.
        let key = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let path = self.dir.join(format!("recording_{}.mjpeg", key));
        let writer = SegmentWriter::create(path)?;
        info!(
            segment = %writer.path().display(),
            threat = %threat.map(ToString::to_string).unwrap_or_default(),
            "Recording started"
        );

        self.session = Some(RecordingSession {
            writer,
            started_at: Instant::now(),
        });
        self.audit.append("Recording Started", threat)
    }

    /// Recording → Idle: close the segment handle and log the event.
    /// No-op while Idle.
    pub fn stop_recording(&mut self) -> Result<(), RecordError> {
        let Some(session) = self.session.take() else {
            return Ok(());
        };
        let path = session.writer.path().to_path_buf();
        let frames = session.writer.finalize()?;
        self.segments_written += 1;
        info!(segment = %path.display(), frames, "Recording stopped");
        self.audit.append("Recording Stopped", None)
    }

    /// Write a frame to the open segment; no-op while Idle.
    ///
    /// When the session has outlived the maximum segment duration, the
    /// segment is rolled over first (stop, then start a fresh one) and the
    /// triggering frame goes to the NEW segment — rollover never drops it.
    pub fn append(&mut self, frame: &Frame) -> Result<(), RecordError> {
        if self.session.is_none() {
            return Ok(());
        }

        let jpeg = frame.encode_jpeg(self.jpeg_quality)?;

        let rollover_due = self
            .session
            .as_ref()
            .is_some_and(|s| s.started_at.elapsed() > self.max_segment);
        if rollover_due {
            debug!(seq = frame.seq, "Segment duration exceeded — rolling over");
            self.stop_recording()?;
            self.start_recording(None)?;
        }

        if let Some(session) = self.session.as_mut() {
            session.writer.append(&jpeg)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(dir: &Path, max_segment_secs: u64) -> RecordingConfig {
        RecordingConfig {
            enabled: true,
            threat_only: true,
            dir: dir.join("segments"),
            max_segment_secs,
            jpeg_quality: 80,
            log_file: dir.join("audit.csv"),
        }
    }

    fn frame(seq: u64) -> Frame {
        Frame::new(seq, 8, 8, vec![seq as u8; 8 * 8 * 3])
    }

    #[test]
    fn handle_open_iff_recording() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut recorder =
            EvidenceRecorder::new(&test_config(tmp.path(), 300)).expect("recorder");

        assert!(!recorder.is_recording());
        assert!(recorder.active_segment().is_none());

        recorder.start_recording(None).expect("start");
        assert!(recorder.is_recording());
        assert!(recorder.active_segment().is_some());

        recorder.stop_recording().expect("stop");
        assert!(!recorder.is_recording());
        assert!(recorder.active_segment().is_none());
    }

    #[test]
    fn append_while_idle_is_noop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut recorder =
            EvidenceRecorder::new(&test_config(tmp.path(), 300)).expect("recorder");

        recorder.append(&frame(0)).expect("append");
        assert_eq!(recorder.segments_written(), 0);
        // No segment file materialised
        let entries: Vec<_> = std::fs::read_dir(tmp.path().join("segments"))
            .expect("dir")
            .collect();
        assert!(entries.is_empty());
    }

    #[test]
    fn stop_while_idle_is_noop() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut recorder =
            EvidenceRecorder::new(&test_config(tmp.path(), 300)).expect("recorder");
        recorder.stop_recording().expect("stop");
        assert_eq!(recorder.segments_written(), 0);
    }

    #[test]
    fn start_logs_threat_context() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let mut recorder =
            EvidenceRecorder::new(&test_config(tmp.path(), 300)).expect("recorder");

        let threat = Detection {
            label: "Gun".to_string(),
            confidence: 92.0,
        };
        recorder.start_recording(Some(&threat)).expect("start");
        recorder.stop_recording().expect("stop");

        let log = std::fs::read_to_string(tmp.path().join("audit.csv")).expect("log");
        assert!(log.contains("Recording Started,Gun,92.0"));
        assert!(log.contains("Recording Stopped,,"));
    }
}
