//! Writes annotated JPEG snapshots of breach frames.
//!
//! Outlines are always drawn. Text (labels, status, tally) is drawn when a
//! font file is configured; every snapshot also gets a caption log line.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use super::{Overlay, Renderer, DETECTION_COLOR, TEXT_COLOR};
use crate::frame::Frame;

/// Outline thickness in pixels.
const LINE_WIDTH: i32 = 2;
const LABEL_SCALE: f32 = 16.0;
const STATUS_SCALE: f32 = 24.0;

pub struct SnapshotRenderer {
    dir: PathBuf,
    font: Option<FontVec>,
    written: u64,
}

impl SnapshotRenderer {
    pub fn new(dir: impl Into<PathBuf>, font_path: Option<&Path>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create snapshot dir {}", dir.display()))?;
        let font = font_path.map(load_font).transpose()?;
        if font.is_none() {
            log::info!("no snapshot font configured; overlay text goes to the log only");
        }
        Ok(Self {
            dir,
            font,
            written: 0,
        })
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontVec::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

/// One-line summary of the overlay text.
pub fn caption(overlay: &Overlay) -> String {
    let mut text = format!("{} | {}", overlay.status_text(), overlay.count_text());
    for labeled in &overlay.boxes {
        text.push_str(" | ");
        text.push_str(&labeled.label);
    }
    text
}

fn draw_overlay_text(image: &mut RgbImage, font: &FontVec, overlay: &Overlay) {
    for labeled in &overlay.boxes {
        let (x1, y1, _, _) = labeled.bbox.to_pixels();
        let y = (y1 - LABEL_SCALE as i64).max(0);
        draw_text_mut(
            image,
            Rgb(DETECTION_COLOR),
            x1 as i32,
            y as i32,
            LABEL_SCALE,
            font,
            &labeled.label,
        );
    }
    draw_text_mut(
        image,
        Rgb(overlay.zone_color()),
        10,
        10,
        STATUS_SCALE,
        font,
        &overlay.status_text(),
    );
    draw_text_mut(
        image,
        Rgb(TEXT_COLOR),
        10,
        10 + STATUS_SCALE as i32 + 6,
        STATUS_SCALE,
        font,
        &overlay.count_text(),
    );
}

fn outline(image: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64, color: [u8; 3]) {
    for inset in 0..LINE_WIDTH as i64 {
        let (w, h) = (x2 - x1 - 2 * inset, y2 - y1 - 2 * inset);
        if w <= 0 || h <= 0 {
            break;
        }
        let rect = Rect::at((x1 + inset) as i32, (y1 + inset) as i32).of_size(w as u32, h as u32);
        draw_hollow_rect_mut(image, rect, Rgb(color));
    }
}

impl Renderer for SnapshotRenderer {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        if !overlay.breached {
            return Ok(());
        }
        let view = frame.view();
        let mut image = RgbImage::from_raw(view.width(), view.height(), view.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame {} has an invalid pixel buffer", frame.index))?;

        let zone = overlay.zone;
        outline(
            &mut image,
            i64::from(zone.x1),
            i64::from(zone.y1),
            i64::from(zone.x2),
            i64::from(zone.y2),
            overlay.zone_color(),
        );
        for labeled in &overlay.boxes {
            let (x1, y1, x2, y2) = labeled.bbox.to_pixels();
            outline(&mut image, x1, y1, x2, y2, DETECTION_COLOR);
        }
        if let Some(font) = &self.font {
            draw_overlay_text(&mut image, font, overlay);
        }

        let path = self.dir.join(format!(
            "breach_{:06}_count{}.jpg",
            frame.index, overlay.breach_count
        ));
        image
            .save(&path)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        self.written += 1;
        log::info!("snapshot {}: {}", path.display(), caption(overlay));
        Ok(())
    }
}
