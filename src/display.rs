//! Live feed display abstraction.
//!
//! Rendering is an external collaborator: best-effort, never fatal to the
//! pipeline. The trait keeps the coordinator independent of any windowing
//! stack; the shipped implementations render the status line through the
//! log output or nothing at all (headless deployments).

use crate::config::{DisplayConfig, DisplayMode};
use crate::types::{Frame, StatusOverlay};
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("render failed: {0}")]
    Render(String),
}

/// Trait abstracting where the live feed goes.
pub trait FeedDisplay: Send {
    /// Render one frame with its status overlay. Best-effort.
    fn show(&mut self, frame: &Frame, overlay: &StatusOverlay) -> Result<(), DisplayError>;

    /// Release display resources. Idempotent.
    fn close(&mut self);

    /// Display name for logging.
    fn display_name(&self) -> &'static str;
}

/// Build the display the configuration asks for.
pub fn from_config(cfg: &DisplayConfig) -> Box<dyn FeedDisplay> {
    match cfg.mode {
        DisplayMode::Console => Box::new(ConsoleDisplay::new(cfg.status_every_n_ticks)),
        DisplayMode::None => Box::new(NullDisplay),
    }
}

// ============================================================================
// Console Display
// ============================================================================

/// Renders the feed status through the log output.
///
/// Threat transitions are logged immediately; the routine status line is
/// throttled to every N ticks to keep the log readable at 30 fps.
pub struct ConsoleDisplay {
    every_n: u64,
    ticks: u64,
    threat_visible: bool,
}

impl ConsoleDisplay {
    pub fn new(every_n: u64) -> Self {
        Self {
            every_n: every_n.max(1),
            ticks: 0,
            threat_visible: false,
        }
    }
}

impl FeedDisplay for ConsoleDisplay {
    fn show(&mut self, frame: &Frame, overlay: &StatusOverlay) -> Result<(), DisplayError> {
        self.ticks += 1;

        match (&overlay.threat, self.threat_visible) {
            (Some(threat), false) => {
                info!(threat = %threat, "THREAT DETECTED");
                self.threat_visible = true;
            }
            (None, true) => {
                info!("Threat indicator cleared");
                self.threat_visible = false;
            }
            _ => {}
        }

        if self.ticks % self.every_n == 0 {
            info!(
                seq = frame.seq,
                fps = format!("{:.1}", overlay.fps),
                recording = overlay.recording,
                threat = %overlay.threat.as_ref().map(ToString::to_string).unwrap_or_default(),
                "Live feed status"
            );
        } else {
            debug!(seq = frame.seq, fps = format!("{:.1}", overlay.fps), "Frame rendered");
        }
        Ok(())
    }

    fn close(&mut self) {}

    fn display_name(&self) -> &'static str {
        "console"
    }
}

// ============================================================================
// Null Display
// ============================================================================

/// Headless: frames are dropped.
pub struct NullDisplay;

impl FeedDisplay for NullDisplay {
    fn show(&mut self, _frame: &Frame, _overlay: &StatusOverlay) -> Result<(), DisplayError> {
        Ok(())
    }

    fn close(&mut self) {}

    fn display_name(&self) -> &'static str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_display_tracks_threat_transitions() {
        let mut display = ConsoleDisplay::new(30);
        let frame = Frame::new(0, 4, 4, vec![0u8; 4 * 4 * 3]);

        let with_threat = StatusOverlay {
            fps: 30.0,
            threat: Some(crate::types::Detection {
                label: "Gun".to_string(),
                confidence: 90.0,
            }),
            recording: true,
        };
        display.show(&frame, &with_threat).expect("show");
        assert!(display.threat_visible);

        let clear = StatusOverlay {
            fps: 30.0,
            threat: None,
            recording: false,
        };
        display.show(&frame, &clear).expect("show");
        assert!(!display.threat_visible);
    }
}
