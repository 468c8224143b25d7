//! Capture backend abstraction for frame ingestion.
//!
//! Provides a unified trait for decoding frames from different devices:
//! a synthetic test feed, still-image directory replay, and MJPEG network
//! streams (IP cameras).

use crate::types::Frame;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::defaults::{MJPEG_CONNECT_TIMEOUT_SECS, MJPEG_MAX_BUFFER_BYTES};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("stream error: {0}")]
    Stream(String),
}

// ============================================================================
// Capture Trait
// ============================================================================

/// Events produced by a capture backend.
pub enum FrameEvent {
    /// A frame was decoded.
    Frame(Frame),
    /// Device reached end of data (file replay exhausted, stream closed).
    Eof,
}

/// Trait abstracting where frames come from.
///
/// Implementations handle device access, decoding, and pacing internally.
/// The acquisition task calls [`next_frame`](FrameCapture::next_frame) in a
/// select! with cancellation.
#[async_trait]
pub trait FrameCapture: Send + 'static {
    /// Decode the next frame from the device.
    ///
    /// Returns `FrameEvent::Eof` when no more frames will arrive.
    /// Returns `Err` on unrecoverable device errors.
    async fn next_frame(&mut self) -> Result<FrameEvent, CaptureError>;

    /// Human-readable name for logging (e.g. "synthetic", "mjpeg").
    fn source_name(&self) -> &str;
}

// ============================================================================
// Synthetic Source (test feed)
// ============================================================================

/// Procedurally generated test feed.
///
/// Produces a moving gradient with random speckle at the target rate.
/// An optional frame limit turns it into a bounded replay for tests.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    frame_limit: Option<u64>,
    seq: u64,
    rng: StdRng,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, target_fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
            frame_limit: None,
            seq: 0,
            rng: StdRng::from_entropy(),
        }
    }

    /// Stop after `limit` frames (the source then reports Eof).
    pub fn with_frame_limit(mut self, limit: u64) -> Self {
        self.frame_limit = Some(limit);
        self
    }

    /// Remove inter-frame pacing. Tests use this to run the feed flat out.
    pub fn without_pacing(mut self) -> Self {
        self.frame_interval = Duration::ZERO;
        self
    }

    fn render(&mut self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut pixels = vec![0u8; w * h * 3];
        let phase = (self.seq % 256) as u8;
        for y in 0..h {
            for x in 0..w {
                let i = (y * w + x) * 3;
                pixels[i] = (x % 256) as u8;
                pixels[i + 1] = (y % 256) as u8;
                pixels[i + 2] = phase;
            }
        }
        // Sensor-noise speckle
        for _ in 0..64 {
            let i = self.rng.gen_range(0..w * h) * 3;
            pixels[i] = self.rng.gen();
            pixels[i + 1] = self.rng.gen();
            pixels[i + 2] = self.rng.gen();
        }
        pixels
    }
}

#[async_trait]
impl FrameCapture for SyntheticSource {
    async fn next_frame(&mut self) -> Result<FrameEvent, CaptureError> {
        if let Some(limit) = self.frame_limit {
            if self.seq >= limit {
                return Ok(FrameEvent::Eof);
            }
        }
        // Pace after the first frame so startup latency stays low.
        if self.seq > 0 && !self.frame_interval.is_zero() {
            tokio::time::sleep(self.frame_interval).await;
        }
        let pixels = self.render();
        let frame = Frame::new(self.seq, self.width, self.height, pixels);
        self.seq += 1;
        Ok(FrameEvent::Frame(frame))
    }

    fn source_name(&self) -> &str {
        "synthetic"
    }
}

// ============================================================================
// Image Directory Source (file replay)
// ============================================================================

/// Replays a directory of still images (JPEG/PNG) as a feed.
///
/// Files are replayed in lexicographic order with inter-frame pacing,
/// then the source reports Eof.
pub struct ImageDirSource {
    files: std::vec::IntoIter<PathBuf>,
    frame_interval: Duration,
    seq: u64,
}

impl ImageDirSource {
    pub fn open(dir: &Path, target_fps: u32) -> Result<Self, CaptureError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("jpg" | "jpeg" | "png")
                )
            })
            .collect();
        files.sort();
        debug!(dir = %dir.display(), frames = files.len(), "Image replay source opened");
        Ok(Self {
            files: files.into_iter(),
            frame_interval: Duration::from_secs_f64(1.0 / f64::from(target_fps.max(1))),
            seq: 0,
        })
    }
}

#[async_trait]
impl FrameCapture for ImageDirSource {
    async fn next_frame(&mut self) -> Result<FrameEvent, CaptureError> {
        let Some(path) = self.files.next() else {
            return Ok(FrameEvent::Eof);
        };
        if self.seq > 0 && !self.frame_interval.is_zero() {
            tokio::time::sleep(self.frame_interval).await;
        }
        let rgb = image::open(&path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::new(self.seq, width, height, rgb.into_raw());
        self.seq += 1;
        Ok(FrameEvent::Frame(frame))
    }

    fn source_name(&self) -> &str {
        "image-dir"
    }
}

// ============================================================================
// MJPEG Source (IP camera)
// ============================================================================

/// Reads an MJPEG multipart stream from an IP camera URL.
///
/// Frames are located by scanning for JPEG SOI/EOI markers rather than
/// parsing multipart boundaries — camera firmwares disagree on boundary
/// framing, the markers are universal.
pub struct MjpegSource {
    url: String,
    response: Option<reqwest::Response>,
    buf: Vec<u8>,
    seq: u64,
}

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

impl MjpegSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            response: None,
            buf: Vec::with_capacity(64 * 1024),
            seq: 0,
        }
    }

    async fn connect(&mut self) -> Result<(), CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(MJPEG_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| CaptureError::Stream(e.to_string()))?;
        let resp = client
            .get(&self.url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| CaptureError::Stream(format!("connect {}: {}", self.url, e)))?;
        self.response = Some(resp);
        debug!(url = %self.url, "MJPEG stream connected");
        Ok(())
    }

    /// Extract one complete JPEG (SOI..=EOI) from the scan buffer, if present.
    fn take_jpeg(&mut self) -> Option<Vec<u8>> {
        let soi = find_marker(&self.buf, &JPEG_SOI)?;
        let eoi = find_marker(&self.buf[soi + 2..], &JPEG_EOI)? + soi + 2;
        let jpeg = self.buf[soi..eoi + 2].to_vec();
        self.buf.drain(..eoi + 2);
        Some(jpeg)
    }
}

fn find_marker(haystack: &[u8], marker: &[u8; 2]) -> Option<usize> {
    haystack.windows(2).position(|w| w == marker)
}

#[async_trait]
impl FrameCapture for MjpegSource {
    async fn next_frame(&mut self) -> Result<FrameEvent, CaptureError> {
        if self.response.is_none() {
            self.connect().await?;
        }

        loop {
            if let Some(jpeg) = self.take_jpeg() {
                match image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg) {
                    Ok(img) => {
                        let rgb = img.to_rgb8();
                        let (width, height) = rgb.dimensions();
                        let frame = Frame::new(self.seq, width, height, rgb.into_raw());
                        self.seq += 1;
                        return Ok(FrameEvent::Frame(frame));
                    }
                    Err(e) => {
                        // Torn frame mid-stream; skip it and keep reading.
                        warn!(error = %e, "Skipping undecodable MJPEG frame");
                        continue;
                    }
                }
            }

            if self.buf.len() > MJPEG_MAX_BUFFER_BYTES {
                return Err(CaptureError::Stream(format!(
                    "no frame boundary within {} bytes — stream corrupt",
                    MJPEG_MAX_BUFFER_BYTES
                )));
            }

            let Some(response) = self.response.as_mut() else {
                return Ok(FrameEvent::Eof);
            };
            match response.chunk().await {
                Ok(Some(chunk)) => self.buf.extend_from_slice(&chunk),
                Ok(None) => return Ok(FrameEvent::Eof),
                Err(e) => return Err(CaptureError::Stream(e.to_string())),
            }
        }
    }

    fn source_name(&self) -> &str {
        "mjpeg"
    }
}
