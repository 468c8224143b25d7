//! Frame acquisition module
//!
//! Handles frame ingestion from capture backends and publishes the most
//! recent decoded frame to the rest of the pipeline.
//!
//! Acquisition runs on its own task and never blocks on downstream
//! consumers: slow readers simply see frames overwritten (newest-wins).
//! Stale frames are worthless for a live security feed.

pub mod sources;
mod frame_source;

pub use frame_source::FrameSource;
pub use sources::{
    CaptureError, FrameCapture, FrameEvent, ImageDirSource, MjpegSource, SyntheticSource,
};
