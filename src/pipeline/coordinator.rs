//! Pipeline Coordinator - the synchronous tick loop driving the feed.
//!
//! The coordinator is the only component that touches every collaborator:
//! it pulls frames from the acquisition slot, offers them to the detector,
//! applies the recording policy, and renders the overlay. Failures inside
//! the asynchronous detection/alert paths never reach this loop; failures
//! in the loop's own path (display, recorder I/O) are reported and
//! swallowed. Only acquisition failure is terminal.

use crate::capture::FrameSource;
use crate::config::defaults::{TICK_OVERRUN_FACTOR, WARMUP_POLL_MS, WARMUP_TIMEOUT_SECS};
use crate::detect::ThreatDetector;
use crate::display::FeedDisplay;
use crate::record::EvidenceRecorder;
use crate::types::StatusOverlay;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::PipelineStats;

/// Recording policy applied on step 6 of each tick.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordPolicy {
    pub enabled: bool,
    pub threat_only: bool,
}

impl RecordPolicy {
    fn should_persist(self, threats_present: bool) -> bool {
        self.enabled && (!self.threat_only || threats_present)
    }
}

pub struct PipelineCoordinator {
    source: FrameSource,
    detector: ThreatDetector,
    recorder: EvidenceRecorder,
    display: Box<dyn FeedDisplay>,
    policy: RecordPolicy,
    target_fps: u32,
    warmup_timeout: Duration,
    cancel: CancellationToken,
    stats: PipelineStats,
}

impl PipelineCoordinator {
    pub fn new(
        source: FrameSource,
        detector: ThreatDetector,
        recorder: EvidenceRecorder,
        display: Box<dyn FeedDisplay>,
        record_enabled: bool,
        threat_only: bool,
        target_fps: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            detector,
            recorder,
            display,
            policy: RecordPolicy {
                enabled: record_enabled,
                threat_only,
            },
            target_fps: target_fps.max(1),
            warmup_timeout: Duration::from_secs(WARMUP_TIMEOUT_SECS),
            cancel,
            stats: PipelineStats::default(),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_warmup_timeout(mut self, timeout: Duration) -> Self {
        self.warmup_timeout = timeout;
        self
    }

    /// Run the tick loop until the feed ends or cancellation.
    ///
    /// The shutdown sequence always executes, whatever path exits the loop.
    /// Returns final pipeline statistics.
    pub async fn run(mut self) -> PipelineStats {
        info!(
            source = self.source.source_name(),
            display = self.display.display_name(),
            fps = self.target_fps,
            "Pipeline starting"
        );

        if self.wait_for_first_frame().await {
            self.tick_loop().await;
        } else {
            warn!(
                timeout_secs = self.warmup_timeout.as_secs(),
                "No frame arrived during warm-up — treating capture as dead"
            );
        }

        self.shutdown().await
    }

    /// Warm-up: the capture device needs a moment before the first decode.
    /// Expiry is an acquisition failure, not a reason to spin forever.
    async fn wait_for_first_frame(&self) -> bool {
        let deadline = Instant::now() + self.warmup_timeout;
        loop {
            if self.source.latest().is_some() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => return false,
                _ = tokio::time::sleep(Duration::from_millis(WARMUP_POLL_MS)) => {}
            }
        }
    }

    async fn tick_loop(&mut self) {
        let frame_interval = Duration::from_secs_f64(1.0 / f64::from(self.target_fps));
        let overrun = frame_interval * TICK_OVERRUN_FACTOR;
        let mut ticker = tokio::time::interval(frame_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {}
            }
            let tick_start = Instant::now();

            // 1. Frame readout. None means the device failed or the feed
            //    ended — terminal either way.
            let Some(frame) = self.source.latest() else {
                info!(ticks = self.stats.ticks, "Frame source exhausted — shutting down");
                break;
            };

            // 2. Detection dispatch (non-blocking, internally gated).
            self.detector.observe(&frame);

            // 3. Instantaneous FPS from the gap between tick starts.
            let fps = last_tick.map_or(f64::from(self.target_fps), |prev| {
                1.0 / tick_start.duration_since(prev).as_secs_f64().max(1e-9)
            });
            last_tick = Some(tick_start);

            // 4. Threat policy: start evidence capture on the first
            //    threat-positive tick. Guarded here — the recorder does not
            //    suppress re-entrant starts itself.
            let threats = self.detector.threats();
            let threats_present = !threats.is_empty();
            if threats_present {
                self.stats.threat_ticks += 1;
                if self.policy.enabled && !self.recorder.is_recording() {
                    if let Err(e) = self.recorder.start_recording(threats.first()) {
                        warn!(error = %e, "Failed to start evidence recording");
                    }
                }
            }

            // 5. Display (best-effort; never fatal).
            let overlay = StatusOverlay {
                fps,
                threat: threats.first().cloned(),
                recording: self.recorder.is_recording(),
            };
            if let Err(e) = self.display.show(&frame, &overlay) {
                debug!(error = %e, "Display failure swallowed");
            }

            // 6. Evidence append per policy.
            if self.policy.should_persist(threats_present) {
                if let Err(e) = self.recorder.append(&frame) {
                    warn!(error = %e, "Evidence append failed — continuing");
                }
            }

            self.stats.ticks += 1;

            let elapsed = tick_start.elapsed();
            if elapsed > overrun {
                warn!(
                    elapsed_ms = elapsed.as_millis(),
                    budget_ms = frame_interval.as_millis(),
                    "Tick exceeded frame budget"
                );
            }
        }
    }

    /// Teardown in dependency order: acquisition first (no new frames mid
    /// teardown), then the display, then the open recording session.
    async fn shutdown(mut self) -> PipelineStats {
        self.source.stop().await;
        self.display.close();
        if let Err(e) = self.recorder.stop_recording() {
            warn!(error = %e, "Failed to finalize recording during shutdown");
        }

        self.stats.cycles_dispatched = self.detector.cycles_dispatched();
        self.stats.cycles_dropped = self.detector.cycles_dropped();
        self.stats.alerts_fired = self.detector.alerts_fired();
        self.stats.segments_written = self.recorder.segments_written();

        info!(stats = %self.stats, "Pipeline stopped");
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertContext, AlertError, Alerter};
    use crate::capture::sources::{CaptureError, FrameCapture, FrameEvent};
    use crate::config::{AlertConfig, DetectionConfig, RecordingConfig};
    use crate::detect::backend::{DetectError, DetectionBackend};
    use crate::display::NullDisplay;
    use crate::types::Detection;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Never produces a frame; the device just stays silent.
    struct SilentSource;

    #[async_trait]
    impl FrameCapture for SilentSource {
        async fn next_frame(&mut self) -> Result<FrameEvent, CaptureError> {
            std::future::pending::<()>().await;
            unreachable!()
        }

        fn source_name(&self) -> &str {
            "silent"
        }
    }

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

    struct NoAlerter;

    #[async_trait]
    impl Alerter for NoAlerter {
        async fn send_alert(&self, _ctx: &AlertContext) -> Result<String, AlertError> {
            Ok(String::new())
        }

        fn channel_name(&self) -> &'static str {
            "none"
        }
    }

    #[tokio::test]
    async fn dead_capture_device_ends_the_run_after_warmup() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let cancel = CancellationToken::new();
        let source = crate::capture::FrameSource::start(Box::new(SilentSource), &cancel);
        let detector = ThreatDetector::new(
            &DetectionConfig::default(),
            &AlertConfig::default(),
            Arc::new(QuietBackend),
            Arc::new(NoAlerter),
        );
        let recorder = EvidenceRecorder::new(&RecordingConfig {
            dir: tmp.path().join("segments"),
            log_file: tmp.path().join("audit.csv"),
            ..RecordingConfig::default()
        })
        .expect("recorder");

        let coordinator = PipelineCoordinator::new(
            source,
            detector,
            recorder,
            Box::new(NullDisplay),
            true,
            true,
            30,
            cancel,
        )
        .with_warmup_timeout(Duration::from_millis(150));

        let stats = coordinator.run().await;
        // The loop never started; shutdown still ran cleanly.
        assert_eq!(stats.ticks, 0);
        assert_eq!(stats.segments_written, 0);
    }

    #[test]
    fn record_policy_gates_persistence() {
        let always = RecordPolicy {
            enabled: true,
            threat_only: false,
        };
        assert!(always.should_persist(false));
        assert!(always.should_persist(true));

        let threat_only = RecordPolicy {
            enabled: true,
            threat_only: true,
        };
        assert!(!threat_only.should_persist(false));
        assert!(threat_only.should_persist(true));

        let disabled = RecordPolicy {
            enabled: false,
            threat_only: false,
        };
        assert!(!disabled.should_persist(true));
    }
}
