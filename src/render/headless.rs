use anyhow::Result;

use super::{Overlay, Renderer};
use crate::frame::Frame;

/// Renderer with no output surface. Keeps the last overlay for inspection and
/// logs status transitions at debug level.
#[derive(Default)]
pub struct HeadlessRenderer {
    frames: u64,
    last: Option<Overlay>,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn last_overlay(&self) -> Option<&Overlay> {
        self.last.as_ref()
    }
}

impl Renderer for HeadlessRenderer {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        self.frames += 1;
        if self.last.as_ref().map(|o| o.breached) != Some(overlay.breached) {
            log::debug!("frame {}: {}", frame.index, overlay.status_text());
        }
        self.last = Some(overlay.clone());
        Ok(())
    }
}
