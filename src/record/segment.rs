//! Evidence segment writer.
//!
//! Segments are Motion-JPEG streams: each recorded frame's JPEG bytes are
//! appended back to back. The format needs no index or trailer, so a
//! segment truncated by a crash is still playable up to the last complete
//! frame — exactly the property evidence files need.

use crate::record::RecordError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub struct SegmentWriter {
    path: PathBuf,
    file: BufWriter<File>,
    frames: u64,
}

impl SegmentWriter {
    pub fn create(path: PathBuf) -> Result<Self, RecordError> {
        let file = File::create(&path).map_err(|e| RecordError::io(&path, e))?;
        Ok(Self {
            path,
            file: BufWriter::new(file),
            frames: 0,
        })
    }

    pub fn append(&mut self, jpeg: &[u8]) -> Result<(), RecordError> {
        self.file
            .write_all(jpeg)
            .map_err(|e| RecordError::io(&self.path, e))?;
        self.frames += 1;
        Ok(())
    }

    /// Flush buffered frames and close the segment.
    pub fn finalize(mut self) -> Result<u64, RecordError> {
        self.file
            .flush()
            .map_err(|e| RecordError::io(&self.path, e))?;
        Ok(self.frames)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
