//! WATCHPOST - Real-Time Security Camera Intelligence
//!
//! Live video feed monitoring with weapon detection, out-of-band alerting,
//! and evidence recording.
//!
//! # Usage
//!
//! ```bash
//! # Run against the synthetic test feed
//! cargo run --release
//!
//! # Monitor an IP camera MJPEG stream
//! cargo run --release -- --mjpeg http://camera.local/stream
//!
//! # Replay a directory of stills, recording everything
//! cargo run --release -- --image-dir ./frames --record-all
//! ```
//!
//! # Environment Variables
//!
//! - `WATCHPOST_CONFIG`: Path to a TOML config file
//! - `WATCHPOST_ALERT_SID` / `WATCHPOST_ALERT_TOKEN`: Alert channel credentials
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use watchpost::alert::{Alerter, HttpAlerter, LogAlerter};
use watchpost::capture::{FrameCapture, ImageDirSource, MjpegSource, SyntheticSource};
use watchpost::config::SourceKind;
use watchpost::detect::HttpDetector;
use watchpost::{
    display, EvidenceRecorder, FrameSource, PipelineCoordinator, ThreatDetector, WatchConfig,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "watchpost")]
#[command(about = "Watchpost Security Camera Intelligence")]
#[command(version)]
struct CliArgs {
    /// Path to a TOML config file (overrides the WATCHPOST_CONFIG search)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the synthetic test feed regardless of configured source
    #[arg(long)]
    synthetic: bool,

    /// Replay a directory of still images as the feed
    #[arg(long, value_name = "DIR")]
    image_dir: Option<PathBuf>,

    /// Monitor an MJPEG stream (e.g. http://camera.local/stream)
    #[arg(long, value_name = "URL")]
    mjpeg: Option<String>,

    /// Record every frame instead of threat-only capture
    #[arg(long)]
    record_all: bool,

    /// Disable evidence recording entirely
    #[arg(long, conflicts_with = "record_all")]
    no_record: bool,

    /// Run headless (no feed display)
    #[arg(long)]
    no_display: bool,

    /// Stop after this many seconds (bounded runs for demos and tests)
    #[arg(long, value_name = "SECS")]
    duration_secs: Option<u64>,
}

impl CliArgs {
    /// Fold CLI overrides into the loaded configuration.
    fn apply_to(&self, config: &mut WatchConfig) {
        if self.synthetic {
            config.source.kind = SourceKind::Synthetic;
        }
        if let Some(ref dir) = self.image_dir {
            config.source.kind = SourceKind::ImageDir;
            config.source.dir = dir.clone();
        }
        if let Some(ref url) = self.mjpeg {
            config.source.kind = SourceKind::Mjpeg;
            config.source.url = url.clone();
        }
        if self.record_all {
            config.recording.threat_only = false;
        }
        if self.no_record {
            config.recording.enabled = false;
        }
        if self.no_display {
            config.display.mode = watchpost::config::DisplayMode::None;
        }
    }
}

// ============================================================================
// Wiring
// ============================================================================

fn build_capture(config: &WatchConfig) -> Result<Box<dyn FrameCapture>> {
    let source = &config.source;
    Ok(match source.kind {
        SourceKind::Synthetic => Box::new(SyntheticSource::new(
            source.width,
            source.height,
            source.target_fps,
        )),
        SourceKind::ImageDir => Box::new(
            ImageDirSource::open(&source.dir, source.target_fps).with_context(|| {
                format!("failed to open image directory {}", source.dir.display())
            })?,
        ),
        SourceKind::Mjpeg => {
            anyhow::ensure!(!source.url.is_empty(), "source.url required for mjpeg source");
            Box::new(MjpegSource::new(source.url.clone()))
        }
    })
}

fn build_alerter(config: &WatchConfig) -> Arc<dyn Alerter> {
    match HttpAlerter::new(&config.alert) {
        Ok(alerter) => Arc::new(alerter),
        Err(e) => {
            warn!(error = %e, "Alert channel unavailable — falling back to log-only alerts");
            Arc::new(LogAlerter)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = match args.config {
        Some(ref path) => WatchConfig::load_from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => WatchConfig::load(),
    };
    args.apply_to(&mut config);
    config.validate().context("configuration invalid")?;

    info!("🚀 Starting security pipeline");

    let cancel = CancellationToken::new();

    // Ctrl-C triggers the same clean shutdown path as feed exhaustion.
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received — stopping");
                cancel.cancel();
            }
        });
    }

    if let Some(secs) = args.duration_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(secs)).await;
            info!(duration_secs = secs, "Run duration elapsed — stopping");
            cancel.cancel();
        });
    }

    let capture = build_capture(&config)?;
    let source = FrameSource::start(capture, &cancel);

    let backend = Arc::new(HttpDetector::new(&config.detection).context("detection backend")?);
    let alerter = build_alerter(&config);
    let detector = ThreatDetector::new(&config.detection, &config.alert, backend, alerter);

    let recorder = EvidenceRecorder::new(&config.recording).context("evidence recorder")?;
    let feed_display = display::from_config(&config.display);

    let coordinator = PipelineCoordinator::new(
        source,
        detector,
        recorder,
        feed_display,
        config.recording.enabled,
        config.recording.threat_only,
        config.source.target_fps,
        cancel,
    );

    let stats = coordinator.run().await;
    info!(%stats, "Final statistics");

    Ok(())
}
