//! Dedicated acquisition task with a lock-free latest-frame slot.
//!
//! The acquisition loop runs independently of any reader's pace: every
//! decoded frame atomically replaces the previous one (newest-wins, no
//! queue, no backpressure onto the device). Readers call [`latest`] and
//! never block or observe a torn frame.
//!
//! [`latest`]: FrameSource::latest

use crate::capture::sources::{FrameCapture, FrameEvent};
use crate::types::Frame;
use arc_swap::ArcSwapOption;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Owns the capture device and the acquisition task.
///
/// The slot is cleared back to `None` on EOF or a device error, which the
/// coordinator treats as a terminal condition.
pub struct FrameSource {
    latest: Arc<ArcSwapOption<Frame>>,
    task: Option<JoinHandle<()>>,
    cancel: CancellationToken,
    name: String,
}

impl FrameSource {
    /// Spawn the acquisition loop for the given capture backend.
    ///
    /// The loop stops when `parent_cancel` fires, on [`stop`](Self::stop),
    /// or when the device reports EOF / errors out. Dropping out of the
    /// loop drops the backend, releasing the device.
    pub fn start(mut capture: Box<dyn FrameCapture>, parent_cancel: &CancellationToken) -> Self {
        let latest: Arc<ArcSwapOption<Frame>> = Arc::new(ArcSwapOption::const_empty());
        let cancel = parent_cancel.child_token();
        let name = capture.source_name().to_string();

        let slot = Arc::clone(&latest);
        let token = cancel.clone();
        let source_name = name.clone();
        let task = tokio::spawn(async move {
            info!(source = %source_name, "Acquisition started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!(source = %source_name, "Acquisition cancelled");
                        break;
                    }
                    result = capture.next_frame() => match result {
                        Ok(FrameEvent::Frame(frame)) => {
                            slot.store(Some(Arc::new(frame)));
                        }
                        Ok(FrameEvent::Eof) => {
                            info!(source = %source_name, "Capture device reached end of feed");
                            slot.store(None);
                            break;
                        }
                        Err(e) => {
                            warn!(source = %source_name, error = %e, "Capture device failed");
                            slot.store(None);
                            break;
                        }
                    }
                }
            }
        });

        Self {
            latest,
            task: Some(task),
            cancel,
            name,
        }
    }

    /// Most recent decoded frame, without blocking.
    ///
    /// `None` before the first decode and again after the device has
    /// failed or reached end of feed.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.latest.load_full()
    }

    pub fn source_name(&self) -> &str {
        &self.name
    }

    /// Stop acquisition and release the capture device. Idempotent.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Acquisition task panicked during shutdown");
            }
        }
    }
}
