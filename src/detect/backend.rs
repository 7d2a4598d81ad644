use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::FrameView;

/// Detector backend trait.
///
/// The model behind a backend is opaque: a frame goes in, detections above
/// the confidence threshold come out. Backends are swapped through the
/// `BackendRegistry` so the monitor never depends on a concrete model.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame.
    ///
    /// Implementations return only detections whose confidence is at least
    /// `confidence_threshold`. An error is fatal for the current run.
    fn detect(&mut self, frame: &FrameView<'_>, confidence_threshold: f32)
        -> Result<Vec<Detection>>;

    /// Human-readable label for a class id.
    fn class_name(&self, class_id: u32) -> &str;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
