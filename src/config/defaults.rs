//! System-wide default constants.
//!
//! Centralises magic numbers so tuning lives in one place.
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Pipeline
// ============================================================================

/// Maximum time to wait for the first decoded frame before treating the
/// capture device as dead (seconds).
pub const WARMUP_TIMEOUT_SECS: u64 = 10;

/// Poll interval while waiting for the first frame (milliseconds).
pub const WARMUP_POLL_MS: u64 = 50;

/// A tick that takes longer than `factor * frame_interval` gets a warning.
pub const TICK_OVERRUN_FACTOR: u32 = 2;

/// Default status-line cadence for the console display (ticks).
pub const STATUS_EVERY_N_TICKS: u64 = 30;

// ============================================================================
// Detection
// ============================================================================

/// HTTP client timeout for detection backend requests (seconds).
pub const DETECT_HTTP_TIMEOUT_SECS: u64 = 10;

/// JPEG quality used for the detection wire format and evidence segments.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

// ============================================================================
// Alerting
// ============================================================================

/// HTTP client timeout for alert delivery requests (seconds).
pub const ALERT_HTTP_TIMEOUT_SECS: u64 = 15;

// ============================================================================
// Capture
// ============================================================================

/// Connect timeout for MJPEG network streams (seconds).
pub const MJPEG_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Upper bound on the MJPEG scan buffer before the stream is declared
/// corrupt (bytes). A single 4K JPEG frame stays well under this.
pub const MJPEG_MAX_BUFFER_BYTES: usize = 8 * 1024 * 1024;
