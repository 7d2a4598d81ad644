//! Image-sequence frame source.
//!
//! Reads every `.jpg`, `.jpeg`, `.png` or `.bmp` file of a local directory in
//! lexical order and yields them as frames. Useful for replaying footage that
//! was exported as stills.

#![cfg(feature = "ingest-images")]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::Frame;

const EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub struct ImageSequenceSource {
    config: SourceConfig,
    files: Vec<PathBuf>,
    cursor: usize,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl ImageSequenceSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            files: Vec::new(),
            cursor: 0,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn pace(&mut self) {
        if !self.config.pace || self.config.target_fps == 0 {
            return;
        }
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.config.target_fps));
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
    }
}

impl FrameSource for ImageSequenceSource {
    fn open(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.config.uri)
            .with_context(|| format!("failed to read image directory {}", self.config.uri))?;
        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let matches = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if matches {
                files.push(path);
            }
        }
        if files.is_empty() {
            return Err(anyhow!("no images found in {}", self.config.uri));
        }
        files.sort();
        log::info!(
            "ImageSequenceSource: opened {} ({} images)",
            self.config.uri,
            files.len()
        );
        self.files = files;
        self.cursor = 0;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            return Ok(None);
        }
        let Some(path) = self.files.get(self.cursor).cloned() else {
            return Ok(None);
        };
        self.cursor += 1;
        self.pace();

        let image = image::open(&path)
            .with_context(|| format!("failed to decode {}", path.display()))?
            .to_rgb8();
        let (width, height) = image.dimensions();
        self.frame_count += 1;
        Frame::new(image.into_raw(), width, height, self.frame_count).map(Some)
    }

    fn release(&mut self) {
        if !self.files.is_empty() {
            log::info!(
                "ImageSequenceSource: released {} after {} frames",
                self.config.uri,
                self.frame_count
            );
            self.files.clear();
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.config.uri.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_images_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for (name, shade) in [("b.png", 200u8), ("a.png", 10u8)] {
            let img = image::RgbImage::from_pixel(8, 6, image::Rgb([shade, shade, shade]));
            img.save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), b"skip me").unwrap();

        let mut source = ImageSequenceSource::new(SourceConfig {
            uri: dir.path().display().to_string(),
            pace: false,
            ..SourceConfig::default()
        });
        source.open().unwrap();

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!((first.width, first.height), (8, 6));
        assert_eq!(first.view().rgb(0, 0), [10, 10, 10]);
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.view().rgb(0, 0), [200, 200, 200]);
        assert!(source.next_frame().unwrap().is_none());
        source.release();
    }

    #[test]
    fn decodes_every_listed_extension() {
        let dir = tempfile::tempdir().unwrap();
        for (i, ext) in EXTENSIONS.iter().enumerate() {
            let img = image::RgbImage::from_pixel(4, 4, image::Rgb([90, 90, 90]));
            img.save(dir.path().join(format!("{}.{}", i, ext))).unwrap();
        }

        let mut source = ImageSequenceSource::new(SourceConfig {
            uri: dir.path().display().to_string(),
            pace: false,
            ..SourceConfig::default()
        });
        source.open().unwrap();
        for _ in EXTENSIONS {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!((frame.width, frame.height), (4, 4));
        }
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn decodes_bmp_frames() {
        let dir = tempfile::tempdir().unwrap();
        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([12, 34, 56]));
        img.save(dir.path().join("a.bmp")).unwrap();

        let mut source = ImageSequenceSource::new(SourceConfig {
            uri: dir.path().display().to_string(),
            pace: false,
            ..SourceConfig::default()
        });
        source.open().unwrap();
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.view().rgb(0, 0), [12, 34, 56]);
    }

    #[test]
    fn empty_directory_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = ImageSequenceSource::new(SourceConfig {
            uri: dir.path().display().to_string(),
            ..SourceConfig::default()
        });
        assert!(source.open().is_err());
    }
}
