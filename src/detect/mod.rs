//! Threat detection module
//!
//! Submits frames to the external detection capability at a bounded rate
//! and maintains the latest threat snapshot for the pipeline.
//!
//! ## Cycle Lifecycle
//!
//! ```text
//! observe(frame)           (once per coordinator tick, never blocks)
//!   ├─ interval gate       (no-op unless detection_interval elapsed)
//!   ├─ in-flight gate      (at most one cycle in flight)
//!   └─ spawn cycle:        encode → detect → filter → atomic snapshot
//!                          replace → cooldown check-then-claim → alert
//! ```
//!
//! The snapshot replacement and the alert cooldown check-then-claim happen
//! under one critical section, so two cycles can never both pass the
//! cooldown check (double-alert race).

pub mod backend;
mod detector;
mod gate;

pub use backend::{DetectError, DetectionBackend, HttpDetector};
pub use detector::ThreatDetector;
pub use gate::DetectionGate;
