use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::FrameView;

/// Luma at or above which a pixel counts as foreground.
pub const DEFAULT_LUMA_THRESHOLD: u8 = 200;

/// Minimum number of foreground pixels before anything is reported.
const MIN_FOREGROUND_PIXELS: u64 = 16;

/// CPU backend: reports the bounding box of bright pixels as one object.
///
/// Confidence is the fill ratio of the box (foreground pixels / box area), so
/// a single solid blob scores close to 1.0 and scattered glare scores low.
pub struct CpuBackend {
    luma_threshold: u8,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
        }
    }

    pub fn with_luma_threshold(mut self, threshold: u8) -> Self {
        self.luma_threshold = threshold;
        self
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for CpuBackend {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn detect(
        &mut self,
        frame: &FrameView<'_>,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let mut count = 0u64;
        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);

        for y in 0..frame.height() {
            for x in 0..frame.width() {
                if frame.luma(x, y) >= self.luma_threshold {
                    count += 1;
                    min_x = min_x.min(x);
                    min_y = min_y.min(y);
                    max_x = max_x.max(x);
                    max_y = max_y.max(y);
                }
            }
        }

        if count < MIN_FOREGROUND_PIXELS {
            return Ok(Vec::new());
        }

        // Box edges sit on pixel boundaries, so the far edge is exclusive.
        let bbox = BoundingBox::new(
            min_x as f32,
            min_y as f32,
            (max_x + 1) as f32,
            (max_y + 1) as f32,
        );
        let confidence = (count as f32 / bbox.area()).min(1.0);
        if confidence < confidence_threshold {
            log::debug!(
                "cpu backend: dropped bright region fill={:.2} below threshold {:.2}",
                confidence,
                confidence_threshold
            );
            return Ok(Vec::new());
        }

        Ok(vec![Detection::new(bbox, 0, confidence)])
    }

    fn class_name(&self, class_id: u32) -> &str {
        match class_id {
            0 => "object",
            _ => "unknown",
        }
    }
}
