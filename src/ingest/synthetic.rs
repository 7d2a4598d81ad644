//! Synthetic frame source (`stub://`).
//!
//! Renders a dark, slightly noisy background with a bright square sweeping
//! left to right along the vertical center line. The square enters and leaves
//! the monitoring zone on every pass, which exercises the whole pipeline with
//! the `cpu` detector and no camera.

use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use rand::Rng;

use super::{FrameSource, SourceConfig, SourceStats};
use crate::frame::{self, Frame};

const BACKGROUND: u8 = 40;
const NOISE: i16 = 4;
const FOREGROUND: u8 = 245;

pub struct SyntheticSource {
    config: SourceConfig,
    frame_count: u64,
    opened: bool,
    last_frame_at: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(config: SourceConfig) -> Self {
        Self {
            config,
            frame_count: 0,
            opened: false,
            last_frame_at: None,
        }
    }

    /// Side length of the moving square.
    pub fn square_side(&self) -> u32 {
        (self.config.width.min(self.config.height) / 8).max(4)
    }

    /// Left edge of the square for a frame index (may be off-screen).
    pub fn square_x(&self, index: u64) -> i64 {
        let side = i64::from(self.square_side());
        let step = i64::from((self.config.width / 64).max(1));
        let period = i64::from(self.config.width) + side;
        ((index.saturating_sub(1) as i64) * step) % period - side
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

    fn generate_pixels(&self, index: u64) -> Result<Vec<u8>> {
        let (width, height) = (self.config.width, self.config.height);
        let mut pixels = vec![BACKGROUND; frame::expected_len(width, height)?];
        let mut rng = rand::thread_rng();
        for p in pixels.iter_mut() {
            *p = (i16::from(*p) + rng.gen_range(-NOISE..=NOISE)) as u8;
        }

        let side = i64::from(self.square_side());
        let x0 = self.square_x(index);
        let y0 = (i64::from(height) - side) / 2;
        for y in y0.max(0)..(y0 + side).min(i64::from(height)) {
            for x in x0.max(0)..(x0 + side).min(i64::from(width)) {
                let idx = ((y as usize) * width as usize + x as usize) * frame::CHANNELS;
                pixels[idx..idx + frame::CHANNELS].fill(FOREGROUND);
            }
        }
        Ok(pixels)
    }
}

impl FrameSource for SyntheticSource {
    fn open(&mut self) -> Result<()> {
        if self.config.width == 0 || self.config.height == 0 {
            return Err(anyhow!(
                "synthetic source {} needs non-zero dimensions",
                self.config.uri
            ));
        }
        self.opened = true;
        log::info!(
            "SyntheticSource: opened {} ({}x{} @ {} fps)",
            self.config.uri,
            self.config.width,
            self.config.height,
            self.config.target_fps
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.opened {
            return Err(anyhow!("source {} is not open", self.config.uri));
        }
        if self
            .config
            .max_frames
            .is_some_and(|max| self.frame_count >= max)
        {
            return Ok(None);
        }
        self.pace();
        self.frame_count += 1;
        let pixels = self.generate_pixels(self.frame_count)?;
        Frame::new(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
        .map(Some)
    }

    fn release(&mut self) {
        if self.opened {
            self.opened = false;
            log::info!(
                "SyntheticSource: released {} after {} frames",
                self.config.uri,
                self.frame_count
            );
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
    use crate::detect::{CpuBackend, DetectorBackend};

    fn config(max_frames: Option<u64>) -> SourceConfig {
        SourceConfig {
            uri: "stub://test".to_string(),
            width: 128,
            height: 96,
            target_fps: 10,
            max_frames,
            pace: false,
        }
    }

    #[test]
    fn honours_max_frames() {
        let mut source = SyntheticSource::new(config(Some(3)));
        source.open().unwrap();
        for expected in 1..=3 {
            let frame = source.next_frame().unwrap().unwrap();
            assert_eq!(frame.index, expected);
        }
        assert!(source.next_frame().unwrap().is_none());
        assert_eq!(source.stats().frames_captured, 3);
    }

    #[test]
    fn refuses_reads_before_open() {
        let mut source = SyntheticSource::new(config(None));
        assert!(source.next_frame().is_err());
    }

    #[test]
    fn zero_size_fails_to_open() {
        let mut cfg = config(None);
        cfg.width = 0;
        assert!(SyntheticSource::new(cfg).open().is_err());
    }

    #[test]
    fn square_is_found_by_cpu_backend() {
        let mut source = SyntheticSource::new(config(None));
        source.open().unwrap();
        let side = source.square_side();
        let mut backend = CpuBackend::new();

        // Skip ahead until the square is fully on screen.
        let mut frame = source.next_frame().unwrap().unwrap();
        while source.square_x(frame.index) < 0 {
            frame = source.next_frame().unwrap().unwrap();
        }
        let x0 = source.square_x(frame.index) as f32;

        let detections = backend.detect(&frame.view(), 0.5).unwrap();
        assert_eq!(detections.len(), 1);
        let bbox = detections[0].bbox;
        assert_eq!(bbox.x1, x0);
        assert_eq!(bbox.x2 - bbox.x1, side as f32);
        assert_eq!(bbox.y2 - bbox.y1, side as f32);
        source.release();
    }
}
