//! Pipeline regression tests
//!
//! Exercises the full tick loop end to end with the synthetic feed, a
//! scripted detection backend and a counting alert channel. Asserts on
//! alert debouncing, evidence capture and clean shutdown accounting.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use watchpost::alert::{AlertContext, AlertError, Alerter};
use watchpost::capture::SyntheticSource;
use watchpost::config::{AlertConfig, DetectionConfig, RecordingConfig};
use watchpost::detect::backend::{DetectError, DetectionBackend};
use watchpost::display::NullDisplay;
use watchpost::types::Detection;
use watchpost::{EvidenceRecorder, FrameSource, PipelineCoordinator, ThreatDetector};

// ============================================================================
// Test Doubles
// ============================================================================

/// Backend that always reports a high-confidence weapon plus a benign label.
struct AlwaysGunBackend;

#[async_trait]
impl DetectionBackend for AlwaysGunBackend {
    async fn detect(
        &self,
        _jpeg: &[u8],
        _min_confidence: f64,
    ) -> Result<Vec<Detection>, DetectError> {
        Ok(vec![
            Detection {
                label: "Gun".to_string(),
                confidence: 92.0,
            },
            Detection {
                label: "Person".to_string(),
                confidence: 99.0,
            },
        ])
    }

    fn backend_name(&self) -> &'static str {
        "always-gun"
    }
}

/// Backend that never finds anything.
struct QuietBackend;

#[async_trait]
impl DetectionBackend for QuietBackend {
    async fn detect(
        &self,
        _jpeg: &[u8],
        _min_confidence: f64,
    ) -> Result<Vec<Detection>, DetectError> {
        Ok(Vec::new())
    }

    fn backend_name(&self) -> &'static str {
        "quiet"
    }
}

struct CountingAlerter {
    attempts: AtomicU64,
}

impl CountingAlerter {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicU64::new(0),
        })
    }
}

#[async_trait]
impl Alerter for CountingAlerter {
    async fn send_alert(&self, _ctx: &AlertContext) -> Result<String, AlertError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok("TEST-CONFIRMATION".to_string())
    }

    fn channel_name(&self) -> &'static str {
        "counting"
    }
}

// ============================================================================
// Wiring Helpers
// ============================================================================

fn detection_config() -> DetectionConfig {
    DetectionConfig {
        interval_ms: 50,
        ..DetectionConfig::default()
    }
}

fn alert_config() -> AlertConfig {
    AlertConfig {
        cooldown_secs: 30,
        ..AlertConfig::default()
    }
}

fn recording_config(root: &Path) -> RecordingConfig {
    RecordingConfig {
        enabled: true,
        threat_only: true,
        dir: root.join("segments"),
        max_segment_secs: 300,
        jpeg_quality: 80,
        log_file: root.join("audit.csv"),
    }
}

fn build_pipeline(
    backend: Arc<dyn DetectionBackend>,
    alerter: Arc<dyn Alerter>,
    recording: &RecordingConfig,
    cancel: &CancellationToken,
) -> PipelineCoordinator {
    let source = FrameSource::start(Box::new(SyntheticSource::new(32, 24, 60)), cancel);
    let detector = ThreatDetector::new(&detection_config(), &alert_config(), backend, alerter);
    let recorder = EvidenceRecorder::new(recording).expect("recorder");
    PipelineCoordinator::new(
        source,
        detector,
        recorder,
        Box::new(NullDisplay),
        recording.enabled,
        recording.threat_only,
        60,
        cancel.clone(),
    )
}

fn cancel_after(cancel: &CancellationToken, after: Duration) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        cancel.cancel();
    });
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn threat_run_fires_one_alert_and_records_evidence() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let recording = recording_config(tmp.path());
    let alerter = CountingAlerter::new();
    let cancel = CancellationToken::new();

    let pipeline = build_pipeline(
        Arc::new(AlwaysGunBackend),
        alerter.clone(),
        &recording,
        &cancel,
    );
    cancel_after(&cancel, Duration::from_millis(500));
    let stats = pipeline.run().await;

    // Many threat-positive detection cycles, exactly one alert (cooldown)
    assert!(stats.cycles_dispatched > 1, "stats: {}", stats);
    assert_eq!(stats.alerts_fired, 1, "stats: {}", stats);
    assert_eq!(alerter.attempts.load(Ordering::SeqCst), 1);

    // Threat-only capture started once and finalized at shutdown
    assert_eq!(stats.segments_written, 1, "stats: {}", stats);
    let segments: Vec<_> = std::fs::read_dir(&recording.dir)
        .expect("segment dir")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(segments.len(), 1);
    let segment_len = segments[0].metadata().expect("metadata").len();
    assert!(segment_len > 0, "segment must contain frames");

    let audit = std::fs::read_to_string(&recording.log_file).expect("audit log");
    assert!(audit.contains("Recording Started,Gun,92.0"));
    assert!(audit.contains("Recording Stopped,,"));
}

#[tokio::test]
async fn quiet_run_records_nothing_and_never_alerts() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let recording = recording_config(tmp.path());
    let alerter = CountingAlerter::new();
    let cancel = CancellationToken::new();

    let pipeline = build_pipeline(Arc::new(QuietBackend), alerter.clone(), &recording, &cancel);
    cancel_after(&cancel, Duration::from_millis(400));
    let stats = pipeline.run().await;

    assert!(stats.ticks > 5, "stats: {}", stats);
    assert_eq!(stats.alerts_fired, 0);
    assert_eq!(stats.threat_ticks, 0);
    assert_eq!(stats.segments_written, 0);
    assert_eq!(alerter.attempts.load(Ordering::SeqCst), 0);

    let segments: Vec<_> = std::fs::read_dir(&recording.dir)
        .expect("segment dir")
        .filter_map(|e| e.ok())
        .collect();
    assert!(segments.is_empty(), "threat-only capture must stay idle");
}

#[tokio::test]
async fn feed_exhaustion_shuts_the_pipeline_down() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let recording = recording_config(tmp.path());
    let alerter = CountingAlerter::new();
    let cancel = CancellationToken::new();

    // Bounded feed: ~30 frames at 100 fps, then EOF clears the frame slot.
    let source = FrameSource::start(
        Box::new(SyntheticSource::new(32, 24, 100).with_frame_limit(30)),
        &cancel,
    );
    let detector = ThreatDetector::new(
        &detection_config(),
        &alert_config(),
        Arc::new(QuietBackend),
        alerter,
    );
    let recorder = EvidenceRecorder::new(&recording).expect("recorder");
    let pipeline = PipelineCoordinator::new(
        source,
        detector,
        recorder,
        Box::new(NullDisplay),
        true,
        true,
        100,
        cancel.clone(),
    );

    // Safety net so a regression cannot hang the test suite.
    cancel_after(&cancel, Duration::from_secs(5));
    let stats = pipeline.run().await;

    assert!(stats.ticks > 0, "stats: {}", stats);
    assert!(!cancel.is_cancelled(), "pipeline should stop on EOF, not the safety net");
}
