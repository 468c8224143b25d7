//! Site Configuration - All pipeline tunables as operator-editable TOML values
//!
//! Every constant that governs runtime behaviour is a field in this module.
//! Each section implements `Default` with values matching the reference
//! deployment, ensuring sensible behaviour when no config file is present.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults;

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a camera deployment.
///
/// Load with `WatchConfig::load()` which searches:
/// 1. `$WATCHPOST_CONFIG` env var
/// 2. `./watchpost.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Frame acquisition source
    #[serde(default)]
    pub source: SourceConfig,

    /// Weapon detection capability
    #[serde(default)]
    pub detection: DetectionConfig,

    /// Out-of-band alert delivery
    #[serde(default)]
    pub alert: AlertConfig,

    /// Evidence recording and audit logging
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Live feed display
    #[serde(default)]
    pub display: DisplayConfig,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            detection: DetectionConfig::default(),
            alert: AlertConfig::default(),
            recording: RecordingConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl WatchConfig {
    /// Load configuration using the standard search order:
    /// 1. `$WATCHPOST_CONFIG` environment variable
    /// 2. `./watchpost.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var("WATCHPOST_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded config from WATCHPOST_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from WATCHPOST_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "WATCHPOST_CONFIG points to non-existent file, falling back");
            }
        }

        // 2. Check ./watchpost.toml
        let local = PathBuf::from("watchpost.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded config from ./watchpost.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./watchpost.toml, using defaults");
                }
            }
        }

        // 3. Defaults
        info!("No watchpost.toml found — using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints and value ranges.
    ///
    /// Called automatically by `load_from_file`; call it explicitly after
    /// applying CLI overrides.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=240).contains(&self.source.target_fps) {
            return Err(ConfigError::Invalid(format!(
                "source.target_fps must be in 1..=240, got {}",
                self.source.target_fps
            )));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "source dimensions must be non-zero, got {}x{}",
                self.source.width, self.source.height
            )));
        }
        if self.detection.labels.is_empty() {
            return Err(ConfigError::Invalid(
                "detection.labels must not be empty".to_string(),
            ));
        }
        if !(0.0..=100.0).contains(&self.detection.min_confidence) {
            return Err(ConfigError::Invalid(format!(
                "detection.min_confidence must be in 0..=100, got {}",
                self.detection.min_confidence
            )));
        }
        if self.detection.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "detection.interval_ms must be non-zero".to_string(),
            ));
        }
        if self.recording.max_segment_secs == 0 {
            return Err(ConfigError::Invalid(
                "recording.max_segment_secs must be non-zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.recording.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "recording.jpeg_quality must be in 1..=100, got {}",
                self.recording.jpeg_quality
            )));
        }
        Ok(())
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse {0}: {1}")]
    Parse(PathBuf, #[source] Box<toml::de::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Source
// ============================================================================

/// Which frame capture backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Procedurally generated test feed.
    Synthetic,
    /// Replay a directory of still images as a feed.
    ImageDir,
    /// MJPEG stream from an IP camera URL.
    Mjpeg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub kind: SourceKind,

    /// MJPEG stream URL (kind = "mjpeg").
    pub url: String,

    /// Image directory (kind = "image-dir").
    pub dir: PathBuf,

    /// Capture width in pixels (synthetic source; informational otherwise).
    pub width: u32,

    /// Capture height in pixels (synthetic source; informational otherwise).
    pub height: u32,

    /// Target acquisition and tick rate.
    pub target_fps: u32,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Synthetic,
            url: String::new(),
            dir: PathBuf::from("frames"),
            width: 640,
            height: 480,
            target_fps: 30,
        }
    }
}

// ============================================================================
// Detection
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Labels that count as weapons. Detections outside this set are
    /// discarded regardless of confidence.
    pub labels: Vec<String>,

    /// Minimum confidence percentage. Passed to the backend and re-applied
    /// locally.
    pub min_confidence: f64,

    /// Minimum time between accepted detection dispatches.
    pub interval_ms: u64,

    /// Detection backend base URL.
    pub endpoint: String,

    /// Bearer token for the backend. Empty disables the auth header.
    pub api_key: String,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            labels: vec!["Gun".to_string(), "Knife".to_string()],
            min_confidence: 85.0,
            interval_ms: 300,
            endpoint: "http://127.0.0.1:9090".to_string(),
            api_key: String::new(),
        }
    }
}

// ============================================================================
// Alerting
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Minimum time between two alert invocations (seconds).
    pub cooldown_secs: u64,

    /// Alert service base URL.
    pub endpoint: String,

    /// Account identifier. `WATCHPOST_ALERT_SID` overrides.
    pub account_sid: String,

    /// Auth token. `WATCHPOST_ALERT_TOKEN` overrides.
    pub auth_token: String,

    /// Caller identity presented by the alert channel.
    pub from_number: String,

    /// Emergency contact to alert.
    pub to_number: String,

    /// Voice payload the channel plays to the callee.
    pub payload_url: String,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 30,
            endpoint: "https://api.twilio.com".to_string(),
            account_sid: String::new(),
            auth_token: String::new(),
            from_number: String::new(),
            to_number: String::new(),
            payload_url: "http://demo.twilio.com/docs/voice.xml".to_string(),
        }
    }
}

impl AlertConfig {
    /// Resolve credentials with env-var overrides applied.
    ///
    /// Operators should prefer env vars over TOML for secrets.
    pub fn resolved_credentials(&self) -> (String, String) {
        let sid = std::env::var("WATCHPOST_ALERT_SID").unwrap_or_else(|_| self.account_sid.clone());
        let token =
            std::env::var("WATCHPOST_ALERT_TOKEN").unwrap_or_else(|_| self.auth_token.clone());
        (sid, token)
    }
}

// ============================================================================
// Recording
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    /// Master switch for evidence recording.
    pub enabled: bool,

    /// Persist frames only while threats are present. When false, every
    /// frame is recorded.
    pub threat_only: bool,

    /// Directory for evidence segment files.
    pub dir: PathBuf,

    /// Maximum segment duration before rollover (seconds).
    pub max_segment_secs: u64,

    /// JPEG quality for recorded frames.
    pub jpeg_quality: u8,

    /// Audit log file (4-column CSV).
    pub log_file: PathBuf,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threat_only: true,
            dir: PathBuf::from("recordings"),
            max_segment_secs: 300,
            jpeg_quality: defaults::DEFAULT_JPEG_QUALITY,
            log_file: PathBuf::from("security_logs.csv"),
        }
    }
}

// ============================================================================
// Display
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayMode {
    /// Status line rendered through the log output.
    Console,
    /// Headless.
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub mode: DisplayMode,

    /// Console display emits a full status line every N ticks.
    pub status_every_n_ticks: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: DisplayMode::Console,
            status_every_n_ticks: defaults::STATUS_EVERY_N_TICKS,
        }
    }
}
