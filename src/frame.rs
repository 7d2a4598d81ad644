//! Frame container.
//!
//! - `Frame`: one captured RGB8 raster. Pixels are private; detectors and
//!   renderers read them through `FrameView`.
//! - `FrameView`: borrowed read-only view handed to detector backends.
//!
//! Frames are ephemeral: produced by a `FrameSource`, consumed by one loop
//! iteration and dropped.

use anyhow::{anyhow, Result};

/// Bytes per pixel (packed RGB).
pub const CHANNELS: usize = 3;

/// One captured frame.
pub struct Frame {
    /// Packed RGB8 pixels, row-major.
    data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Sequence number assigned by the source (starts at 1).
    pub index: u64,
}

impl Frame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(data: Vec<u8>, width: u32, height: u32, index: u64) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        let expected = expected_len(width, height)?;
        if data.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                data.len()
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            index,
        })
    }

    pub fn view(&self) -> FrameView<'_> {
        FrameView { frame: self }
    }

    /// Consume the frame and hand back its pixel buffer.
    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }
}

/// Read-only view of a frame for inference.
#[derive(Clone, Copy)]
pub struct FrameView<'a> {
    frame: &'a Frame,
}

impl<'a> FrameView<'a> {
    pub fn width(&self) -> u32 {
        self.frame.width
    }

    pub fn height(&self) -> u32 {
        self.frame.height
    }

    pub fn index(&self) -> u64 {
        self.frame.index
    }

    pub fn pixels(&self) -> &'a [u8] {
        &self.frame.data
    }

    /// RGB triple at (x, y). Caller guarantees bounds.
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let idx = (y as usize * self.frame.width as usize + x as usize) * CHANNELS;
        [
            self.frame.data[idx],
            self.frame.data[idx + 1],
            self.frame.data[idx + 2],
        ]
    }

    /// Integer Rec.601 luma at (x, y).
    pub fn luma(&self, x: u32, y: u32) -> u8 {
        let [r, g, b] = self.rgb(x, y);
        ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
    }
}

pub(crate) fn expected_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(CHANNELS))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
