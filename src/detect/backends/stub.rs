use std::collections::VecDeque;

use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::FrameView;

/// Stub backend for testing. Replays scripted detections, one batch per frame.
///
/// Once the script is exhausted every further frame yields no detections.
/// Scripted detections below the threshold are filtered like a real model.
pub struct StubBackend {
    script: VecDeque<Vec<Detection>>,
    labels: Vec<String>,
    calls: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            labels: vec!["object".to_string()],
            calls: 0,
        }
    }

    pub fn with_script<I>(frames: I) -> Self
    where
        I: IntoIterator<Item = Vec<Detection>>,
    {
        let mut backend = Self::new();
        backend.script.extend(frames);
        backend
    }

    pub fn with_labels<S: Into<String>>(mut self, labels: impl IntoIterator<Item = S>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Queue detections for the next unscripted frame.
    pub fn push_frame(&mut self, detections: Vec<Detection>) {
        self.script.push_back(detections);
    }

    /// Number of `detect` calls so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        _frame: &FrameView<'_>,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>> {
        self.calls += 1;
        let mut detections = self.script.pop_front().unwrap_or_default();
        detections.retain(|d| d.confidence >= confidence_threshold);
        Ok(detections)
    }

    fn class_name(&self, class_id: u32) -> &str {
        self.labels
            .get(class_id as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }
}
