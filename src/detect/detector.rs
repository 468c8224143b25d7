//! Threat detector: interval-gated, single-in-flight detection cycles.

use crate::alert::{AlertContext, Alerter};
use crate::config::{AlertConfig, DetectionConfig};
use crate::detect::backend::DetectionBackend;
use crate::detect::gate::DetectionGate;
use crate::types::{Detection, Frame, ThreatSnapshot};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

// ============================================================================
// Shared State
// ============================================================================

/// The only cross-task mutable state in the pipeline: the live threat
/// snapshot and the alert cooldown bookkeeping, guarded together so the
/// cooldown check-then-claim and the snapshot replacement share one
/// critical section.
struct DetectionShared {
    snapshot: ThreatSnapshot,
    last_alert: Option<Instant>,
    alerts_claimed: u64,
}

/// A poisoned lock means a cycle task panicked mid-update; the state it
/// wrote is still a whole snapshot, so recover rather than propagate.
fn lock_shared(shared: &Mutex<DetectionShared>) -> MutexGuard<'_, DetectionShared> {
    match shared.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

// ============================================================================
// Cycle Runner
// ============================================================================

/// Immutable per-cycle context, shared by `Arc` into each spawned cycle.
struct CycleRunner {
    backend: Arc<dyn DetectionBackend>,
    alerter: Arc<dyn Alerter>,
    labels: Vec<String>,
    min_confidence: f64,
    cooldown: Duration,
    jpeg_quality: u8,
    alert_to: String,
    alert_from: String,
    alert_payload_url: String,
    shared: Arc<Mutex<DetectionShared>>,
}

impl CycleRunner {
    /// One full detection cycle. Runs on its own task; every failure path
    /// is confined here and reported through logging only.
    async fn run(&self, frame: Arc<Frame>) {
        let cycle_start = Instant::now();

        let jpeg = match frame.encode_jpeg(self.jpeg_quality) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(seq = frame.seq, error = %e, "Frame encode failed — cycle abandoned");
                return;
            }
        };

        let detections = match self.backend.detect(&jpeg, self.min_confidence).await {
            Ok(d) => d,
            Err(e) => {
                // Stale snapshot persists; alert state untouched.
                warn!(
                    seq = frame.seq,
                    backend = self.backend.backend_name(),
                    error = %e,
                    "Detection capability failed — cycle abandoned"
                );
                return;
            }
        };

        let threats = filter_threats(detections, &self.labels, self.min_confidence);

        // Single critical section: replace the snapshot and, if threats are
        // present, check-then-claim the alert cooldown. Two concurrent
        // cycles can never both claim.
        let claimed = {
            let mut shared = lock_shared(&self.shared);
            shared.snapshot = ThreatSnapshot {
                detections: threats.clone(),
                computed_at: Instant::now(),
            };
            if threats.is_empty() {
                false
            } else {
                let now = Instant::now();
                let due = shared
                    .last_alert
                    .map_or(true, |at| now.duration_since(at) > self.cooldown);
                if due {
                    shared.last_alert = Some(now);
                    shared.alerts_claimed += 1;
                }
                due
            }
        };

        if claimed {
            if let Some(threat) = threats.first() {
                let ctx = AlertContext {
                    to: self.alert_to.clone(),
                    from: self.alert_from.clone(),
                    payload_url: self.alert_payload_url.clone(),
                    threat: threat.clone(),
                };
                match self.alerter.send_alert(&ctx).await {
                    Ok(confirmation) => {
                        info!(
                            channel = self.alerter.channel_name(),
                            confirmation = %confirmation,
                            threat = %threat,
                            "Threat alert delivered"
                        );
                    }
                    Err(e) => {
                        // The claim stands: a failed alert still consumes the
                        // cooldown window, so a broken channel cannot storm.
                        error!(
                            channel = self.alerter.channel_name(),
                            error = %e,
                            "Alert delivery failed"
                        );
                    }
                }
            }
        }

        debug!(
            seq = frame.seq,
            threats = threats.len(),
            cycle_ms = cycle_start.elapsed().as_millis(),
            "Detection cycle complete"
        );
    }
}

/// Keep only detections in the configured weapon label set, re-applying the
/// confidence floor the backend was already asked to honour.
fn filter_threats(
    detections: Vec<Detection>,
    labels: &[String],
    min_confidence: f64,
) -> Vec<Detection> {
    detections
        .into_iter()
        .filter(|d| labels.iter().any(|l| l == &d.label))
        .filter(|d| d.confidence >= min_confidence)
        .collect()
}

// ============================================================================
// Threat Detector
// ============================================================================

/// Owns the dispatch gates and the shared detection/alert state.
///
/// `observe` is called once per coordinator tick and never blocks: accepted
/// frames are handed to a spawned cycle, everything else is a no-op.
pub struct ThreatDetector {
    runner: Arc<CycleRunner>,
    gate: DetectionGate,
    in_flight: Arc<Semaphore>,
    shared: Arc<Mutex<DetectionShared>>,
    cycles_dispatched: u64,
    cycles_dropped_busy: u64,
}

impl ThreatDetector {
    pub fn new(
        detection: &DetectionConfig,
        alert: &AlertConfig,
        backend: Arc<dyn DetectionBackend>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        let shared = Arc::new(Mutex::new(DetectionShared {
            snapshot: ThreatSnapshot::empty(),
            last_alert: None,
            alerts_claimed: 0,
        }));
        let runner = Arc::new(CycleRunner {
            backend,
            alerter,
            labels: detection.labels.clone(),
            min_confidence: detection.min_confidence,
            cooldown: Duration::from_secs(alert.cooldown_secs),
            jpeg_quality: crate::config::defaults::DEFAULT_JPEG_QUALITY,
            alert_to: alert.to_number.clone(),
            alert_from: alert.from_number.clone(),
            alert_payload_url: alert.payload_url.clone(),
            shared: Arc::clone(&shared),
        });
        Self {
            runner,
            gate: DetectionGate::new(Duration::from_millis(detection.interval_ms)),
            in_flight: Arc::new(Semaphore::new(1)),
            shared,
            cycles_dispatched: 0,
            cycles_dropped_busy: 0,
        }
    }

    /// Offer a frame for detection. Non-blocking; internally rate-limited.
    ///
    /// A frame is dispatched only when the detection interval has elapsed
    /// AND no cycle is in flight. The in-flight gate bounds concurrency at
    /// one cycle regardless of how fast frames arrive; a frame that loses
    /// the slot is dropped, not queued — by the time the slot frees up a
    /// newer frame exists.
    pub fn observe(&mut self, frame: &Arc<Frame>) {
        if !self.gate.ready() {
            return;
        }
        let Ok(permit) = Arc::clone(&self.in_flight).try_acquire_owned() else {
            self.cycles_dropped_busy += 1;
            debug!(seq = frame.seq, "Detection cycle in flight — frame skipped");
            return;
        };
        self.gate.record_dispatch();
        self.cycles_dispatched += 1;

        let runner = Arc::clone(&self.runner);
        let frame = Arc::clone(frame);
        tokio::spawn(async move {
            let _permit = permit;
            runner.run(frame).await;
        });
    }

    /// Snapshot copy of the current threat set. Never a live reference.
    pub fn threats(&self) -> Vec<Detection> {
        lock_shared(&self.shared).snapshot.detections.clone()
    }

    /// Total alerts claimed against the cooldown (including failed deliveries).
    pub fn alerts_fired(&self) -> u64 {
        lock_shared(&self.shared).alerts_claimed
    }

    pub fn cycles_dispatched(&self) -> u64 {
        self.cycles_dispatched
    }

    pub fn cycles_dropped(&self) -> u64 {
        self.cycles_dropped_busy
    }
}
