//! Core domain types shared across the pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ============================================================================
// Frame
// ============================================================================

/// One decoded video frame.
///
/// Produced by the acquisition task, published as `Arc<Frame>` and read-shared
/// by every consumer for the duration of one tick. Nothing mutates a frame
/// after publication; a consumer that needs a wire encoding calls
/// [`encode_jpeg`](Frame::encode_jpeg) on its own copy of the bytes.
#[derive(Clone)]
pub struct Frame {
    /// Monotonic sequence number assigned by the capture source.
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGB8 pixel data, row-major.
    pub pixels: Vec<u8>,
    /// Wall-clock capture timestamp.
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(seq: u64, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            seq,
            width,
            height,
            pixels,
            captured_at: Utc::now(),
        }
    }

    /// Encode the frame to JPEG for the detection wire format and for
    /// evidence segments.
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
        encoder.encode(
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(buf)
    }
}

impl std::fmt::Debug for Frame {
    // Pixel data is elided; a 640x480 frame is ~900 KB of noise in a log line.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("seq", &self.seq)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("captured_at", &self.captured_at)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Detections
// ============================================================================

/// A single detection returned by the detection capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Label reported by the capability (e.g. "Gun", "Knife").
    pub label: String,
    /// Confidence percentage in `[0, 100]`.
    pub confidence: f64,
}

impl std::fmt::Display for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.1}%)", self.label, self.confidence)
    }
}

/// Point-in-time copy of the most recent completed detection cycle.
///
/// Exactly one snapshot is live at a time; each completed cycle replaces it
/// atomically under the detector's shared-state lock. Readers only ever see
/// a whole snapshot, never a partially written one.
#[derive(Debug, Clone)]
pub struct ThreatSnapshot {
    pub detections: Vec<Detection>,
    pub computed_at: Instant,
}

impl ThreatSnapshot {
    pub fn empty() -> Self {
        Self {
            detections: Vec::new(),
            computed_at: Instant::now(),
        }
    }

    pub fn has_threats(&self) -> bool {
        !self.detections.is_empty()
    }
}

impl Default for ThreatSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// Overlay
// ============================================================================

/// Status information rendered on top of the live feed each tick.
#[derive(Debug, Clone)]
pub struct StatusOverlay {
    /// Instantaneous frame rate of the tick loop.
    pub fps: f64,
    /// Highest-priority current threat, if any.
    pub threat: Option<Detection>,
    /// Whether an evidence segment is currently open.
    pub recording: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_display_format() {
        let d = Detection {
            label: "Gun".to_string(),
            confidence: 91.25,
        };
        assert_eq!(format!("{}", d), "Gun (91.2%)");
    }

    #[test]
    fn empty_snapshot_has_no_threats() {
        assert!(!ThreatSnapshot::empty().has_threats());
    }

    #[test]
    fn encode_jpeg_produces_valid_stream() {
        let frame = Frame::new(0, 8, 8, vec![128u8; 8 * 8 * 3]);
        let jpeg = frame.encode_jpeg(80).expect("encode failed");
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        // JPEG EOI marker
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xFF, 0xD9]);
    }
}
