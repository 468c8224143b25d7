//! Pipeline Coordination Module
//!
//! ## Per-Tick Sequence
//!
//! ```text
//! TICK 1: Frame readout        (non-blocking; None ⇒ terminal shutdown)
//! TICK 2: Detection dispatch   (rate-limited, async, never blocks)
//! TICK 3: FPS overlay          (instantaneous, reciprocal of tick gap)
//! TICK 4: Threat policy        (start recording on Idle→threat transition)
//! TICK 5: Display              (best-effort, failures swallowed)
//! TICK 6: Evidence append      (always-record, or threat-only with threats)
//! TICK 7: Stop-signal check    (cancellation token)
//! ```
//!
//! Shutdown always runs, in order: acquisition stops first so no new
//! frames arrive mid-teardown, then the display closes, then any open
//! recording session is finalized.

mod coordinator;
mod state;

pub use coordinator::PipelineCoordinator;
pub use state::PipelineStats;
