//! Monitoring zone geometry.
//!
//! The zone is a single axis-aligned rectangle centered in the frame and
//! covering 40% of its width and height. It is recomputed from the frame
//! dimensions every iteration, which is idempotent for fixed-size sources
//! and keeps resizable sources correct.

use crate::detect::BoundingBox;

/// Zone size as a fraction of the frame, expressed as `NUM / DEN` so the
/// floor is exact in integer arithmetic.
const ZONE_FRACTION_NUM: u64 = 2;
const ZONE_FRACTION_DEN: u64 = 5;

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Zone {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl Zone {
    /// Centered zone covering 40% of each frame dimension.
    pub fn centered(frame_width: u32, frame_height: u32) -> Self {
        let zone_w = scaled(frame_width);
        let zone_h = scaled(frame_height);
        let x1 = (frame_width - zone_w) / 2;
        let y1 = (frame_height - zone_h) / 2;
        Self {
            x1,
            y1,
            x2: x1 + zone_w,
            y2: y1 + zone_h,
        }
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }

    /// Open-interval overlap test against a detection box.
    ///
    /// Box coordinates are truncated to whole pixels first. Boxes that only
    /// share an edge with the zone do not intersect it.
    pub fn intersects(&self, bbox: &BoundingBox) -> bool {
        let (bx1, by1, bx2, by2) = bbox.to_pixels();
        let (zx1, zy1, zx2, zy2) = (
            i64::from(self.x1),
            i64::from(self.y1),
            i64::from(self.x2),
            i64::from(self.y2),
        );
        bx1 < zx2 && bx2 > zx1 && by1 < zy2 && by2 > zy1
    }
}

/// Derive the monitoring zone from frame dimensions.
pub fn compute_zone(frame_width: u32, frame_height: u32) -> Zone {
    Zone::centered(frame_width, frame_height)
}

fn scaled(dimension: u32) -> u32 {
    // floor(0.4 * dimension); never exceeds `dimension`.
    (u64::from(dimension) * ZONE_FRACTION_NUM / ZONE_FRACTION_DEN) as u32
}
