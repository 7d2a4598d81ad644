//! Presentation of per-frame monitor state.
//!
//! The monitor builds an `Overlay` for every frame and hands it to a
//! `Renderer` together with the frame. Renderers decide how much of it to
//! show: a terminal status line, log lines, or annotated snapshot files.

mod console;
mod headless;
#[cfg(feature = "render-snapshots")]
mod snapshot;

use anyhow::Result;

use crate::detect::BoundingBox;
use crate::frame::Frame;
use crate::zone::Zone;

pub use console::{ConsoleRenderer, QuitKeys, UiMode};
pub use headless::HeadlessRenderer;
#[cfg(feature = "render-snapshots")]
pub use snapshot::SnapshotRenderer;

/// RGB colours used for overlays.
pub const ZONE_COLOR: [u8; 3] = [0, 0, 255];
pub const ALERT_COLOR: [u8; 3] = [255, 0, 0];
pub const DETECTION_COLOR: [u8; 3] = [0, 255, 0];
pub const TEXT_COLOR: [u8; 3] = [255, 255, 255];

/// A detection box with its display label.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledBox {
    pub bbox: BoundingBox,
    /// `"<class>: <confidence>"`
    pub label: String,
}

/// Everything drawn on top of one frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Overlay {
    pub zone: Zone,
    pub breached: bool,
    pub boxes: Vec<LabeledBox>,
    pub breach_count: u64,
}

impl Overlay {
    pub fn status_text(&self) -> String {
        format!(
            "Status: {}",
            if self.breached { "BREACH" } else { "Secure" }
        )
    }

    pub fn count_text(&self) -> String {
        format!("Total Breaches: {}", self.breach_count)
    }

    /// Zone outline colour: alert colour while breached.
    pub fn zone_color(&self) -> [u8; 3] {
        if self.breached {
            ALERT_COLOR
        } else {
            ZONE_COLOR
        }
    }
}

/// Label text for a detection box.
pub fn detection_label(class_name: &str, confidence: f32) -> String {
    format!("{}: {:.2}", class_name, confidence)
}

/// Presentation surface for the monitor loop.
pub trait Renderer {
    /// Show one frame with its overlay.
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()>;

    /// Non-blocking check for a user quit request.
    fn poll_quit(&mut self) -> bool {
        false
    }

    /// Tear down any surfaces. Must be safe to call twice.
    fn close(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(breached: bool) -> Overlay {
        Overlay {
            zone: Zone {
                x1: 1,
                y1: 1,
                x2: 2,
                y2: 2,
            },
            breached,
            boxes: vec![],
            breach_count: 4,
        }
    }

    #[test]
    fn status_texts() {
        assert_eq!(overlay(true).status_text(), "Status: BREACH");
        assert_eq!(overlay(false).status_text(), "Status: Secure");
        assert_eq!(overlay(false).count_text(), "Total Breaches: 4");
        assert_eq!(overlay(true).zone_color(), ALERT_COLOR);
        assert_eq!(overlay(false).zone_color(), ZONE_COLOR);
    }

    #[test]
    fn label_rounds_confidence() {
        assert_eq!(detection_label("person", 0.876), "person: 0.88");
    }
}
