#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::backends::COCO_CLASSES;
use crate::detect::result::{BoundingBox, Detection};
use crate::frame::FrameView;

/// IoU above which a lower-scored box of the same class is suppressed.
const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based backend for YOLO-style ONNX detectors.
///
/// Expects a single `[1, N, 5 + C]` output where each row is
/// `cx, cy, w, h, objectness, class scores...` in model input pixels.
/// Frames are resampled to the model input size and boxes are scaled back.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &FrameView<'_>) -> Tensor {
        let (fw, fh) = (frame.width() as usize, frame.height() as usize);
        let (mw, mh) = (self.width as usize, self.height as usize);
        let pixels = frame.pixels();

        // Nearest-neighbour resample into NCHW, scaled to 0..1.
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, mh, mw), |(_, channel, y, x)| {
            let sx = (x * fw / mw).min(fw - 1);
            let sy = (y * fh / mh).min(fh - 1);
            let idx = (sy * fw + sx) * 3 + channel;
            pixels[idx] as f32 / 255.0
        });

        input.into_tensor()
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        frame: &FrameView<'_>,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let rows = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, N, 5 + C]")?;

        let shape = rows.shape();
        let (count, width) = (shape[1], shape[2]);
        if width < 6 {
            return Err(anyhow!("model output rows too short: {}", width));
        }

        let sx = frame.width() as f32 / self.width as f32;
        let sy = frame.height() as f32 / self.height as f32;
        let max_x = frame.width() as f32;
        let max_y = frame.height() as f32;

        let mut candidates = Vec::new();
        for i in 0..count {
            let objectness = rows[[0, i, 4]];
            if objectness < confidence_threshold {
                continue;
            }
            let (mut class_id, mut class_score) = (0usize, f32::NEG_INFINITY);
            for c in 5..width {
                let score = rows[[0, i, c]];
                if score > class_score {
                    class_id = c - 5;
                    class_score = score;
                }
            }
            let confidence = objectness * class_score;
            if confidence.is_nan() || confidence < confidence_threshold {
                continue;
            }

            let (cx, cy, w, h) = (
                rows[[0, i, 0]],
                rows[[0, i, 1]],
                rows[[0, i, 2]],
                rows[[0, i, 3]],
            );
            let bbox = BoundingBox::new(
                ((cx - w / 2.0) * sx).clamp(0.0, max_x),
                ((cy - h / 2.0) * sy).clamp(0.0, max_y),
                ((cx + w / 2.0) * sx).clamp(0.0, max_x),
                ((cy + h / 2.0) * sy).clamp(0.0, max_y),
            );
            candidates.push(Detection::new(bbox, class_id as u32, confidence));
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

/// Greedy per-class non-maximum suppression.
fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    let mut kept: Vec<Detection> = Vec::new();
    for cand in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.class_id == cand.class_id && k.bbox.iou(&cand.bbox) > iou_threshold);
        if !suppressed {
            kept.push(cand);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        frame: &FrameView<'_>,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let input = self.build_input(frame);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame, confidence_threshold)
    }

    fn class_name(&self, class_id: u32) -> &str {
        COCO_CLASSES
            .get(class_id as usize)
            .copied()
            .unwrap_or("unknown")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_keeps_best_of_overlapping_same_class() {
        let a = Detection::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0, 0.9);
        let b = Detection::new(BoundingBox::new(1.0, 1.0, 10.0, 10.0), 0, 0.8);
        let c = Detection::new(BoundingBox::new(1.0, 1.0, 10.0, 10.0), 2, 0.7);
        let kept = non_max_suppression(vec![b, a.clone(), c.clone()], NMS_IOU_THRESHOLD);
        assert_eq!(kept, vec![a, c]);
    }
}
