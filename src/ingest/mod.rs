//! Frame sources.
//!
//! This module provides the sources a monitor can read frames from:
//! - Synthetic scene (`stub://<name>`), for demos and tests
//! - Image-sequence directories (feature: ingest-images)
//!
//! Every source follows the same lifecycle: `open`, then `next_frame` until it
//! returns `Ok(None)` (end of stream) or an error, then `release`. Sources are
//! not retried; the monitor treats read failures as the end of the stream.

#[cfg(feature = "ingest-images")]
pub mod images;
pub mod synthetic;

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::frame::Frame;

#[cfg(feature = "ingest-images")]
pub use images::ImageSequenceSource;
pub use synthetic::SyntheticSource;

/// Configuration for opening a frame source.
#[derive(Clone, Debug)]
pub struct SourceConfig {
    /// `stub://<name>` or a local directory of images.
    pub uri: String,
    /// Frame width (synthetic sources only).
    pub width: u32,
    /// Frame height (synthetic sources only).
    pub height: u32,
    /// Target frame rate (frames per second) for paced sources.
    pub target_fps: u32,
    /// Stop after this many frames.
    pub max_frames: Option<u64>,
    /// Sleep between frames to hold `target_fps`.
    pub pace: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            uri: "stub://camera".to_string(),
            width: 640,
            height: 480,
            target_fps: 10,
            max_frames: None,
            pace: true,
        }
    }
}

/// Statistics for a frame source.
#[derive(Clone, Debug, Default)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}

/// A sequential supplier of frames.
pub trait FrameSource {
    /// Acquire the underlying device or stream.
    fn open(&mut self) -> Result<()>;

    /// Next frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    /// Release the underlying device or stream. Must be safe to call twice.
    fn release(&mut self);

    fn stats(&self) -> SourceStats;
}

/// Build and open the source a URI points at.
pub fn open_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    let mut source = build_source(config)?;
    source.open()?;
    Ok(source)
}

fn build_source(config: &SourceConfig) -> Result<Box<dyn FrameSource>> {
    if config.uri.starts_with("stub://") {
        return Ok(Box::new(SyntheticSource::new(config.clone())));
    }
    if config.uri.contains("://") {
        return Err(anyhow!(
            "unsupported source {} (expected stub:// or a local directory)",
            config.uri
        ));
    }
    if !Path::new(&config.uri).is_dir() {
        return Err(anyhow!("source {} is not a directory", config.uri));
    }
    #[cfg(feature = "ingest-images")]
    {
        Ok(Box::new(ImageSequenceSource::new(config.clone())))
    }
    #[cfg(not(feature = "ingest-images"))]
    {
        Err(anyhow!(
            "image-sequence ingestion requires the ingest-images feature"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_synthetic_source() {
        let config = SourceConfig {
            uri: "stub://test".to_string(),
            pace: false,
            ..SourceConfig::default()
        };
        let mut source = open_source(&config).unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        source.release();
    }

    #[test]
    fn rejects_network_and_missing_sources() {
        let rtsp = SourceConfig {
            uri: "rtsp://camera/stream".to_string(),
            ..SourceConfig::default()
        };
        assert!(open_source(&rtsp).is_err());

        let missing = SourceConfig {
            uri: "/definitely/not/a/dir".to_string(),
            ..SourceConfig::default()
        };
        assert!(open_source(&missing).is_err());
    }
}
