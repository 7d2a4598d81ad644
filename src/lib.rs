//! Proximity monitor
//!
//! Watches a video feed, runs object detection per frame and raises a
//! rate-limited alert whenever a detected object overlaps a fixed monitoring
//! zone in the center of the frame.
//!
//! # Architecture
//!
//! Data flows leaf to root through narrow seams:
//!
//! 1. **Frame source** (`ingest`): sequential frames until end of stream.
//! 2. **Detector** (`detect`): opaque backend mapping a frame to detections.
//! 3. **Zone** (`zone`): centered rectangle covering 40% of each dimension.
//! 4. **Breach evaluation** (`breach`): does any detection overlap the zone?
//! 5. **Alert throttle** (`throttle`): at most one alert per cooldown window.
//! 6. **Renderer / notifier** (`render`, `notify`): presentation only.
//!
//! `monitor::Monitor` runs these in a single-threaded loop until a quit
//! request, end of stream or a read failure.

pub mod breach;
pub mod config;
pub mod detect;
pub mod frame;
pub mod ingest;
pub mod monitor;
pub mod notify;
pub mod render;
pub mod throttle;
pub mod zone;

use std::io::IsTerminal;

use anyhow::{anyhow, Result};

pub use breach::{breaching, is_breached};
pub use config::{MonitorConfig, NotifierMode, RenderMode};
pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend};
pub use frame::{Frame, FrameView};
pub use ingest::{open_source, FrameSource, SourceConfig};
pub use monitor::{Monitor, MonitorReport, MonitorState, QuitSignal, StopReason};
pub use notify::{LogNotifier, Notifier, PromptNotifier};
pub use render::{ConsoleRenderer, HeadlessRenderer, Overlay, QuitKeys, Renderer, UiMode};
pub use throttle::{AlertEvent, AlertThrottle, Clock, ManualClock, MonotonicClock};
pub use zone::{compute_zone, Zone};

/// Resolve the configured detector backend.
pub fn build_detector(settings: &config::DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    let mut registry = BackendRegistry::new();
    registry.register(detect::CpuBackend::new());
    registry.register(detect::StubBackend::new());

    if settings.backend == "tract" {
        #[cfg(feature = "backend-tract")]
        {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("the tract backend needs detector.model_path"))?;
            registry.register(detect::TractBackend::new(
                model_path,
                settings.model_width,
                settings.model_height,
            )?);
        }
        #[cfg(not(feature = "backend-tract"))]
        {
            return Err(anyhow!(
                "the tract backend requires the backend-tract feature"
            ));
        }
    }

    registry.take(&settings.backend)
}

/// Build the configured renderer. `ui_flag` selects plain/pretty console output;
/// `quit_keys` makes the console renderer watch stdin for `q`.
pub fn build_renderer(
    settings: &config::RenderSettings,
    ui_flag: Option<&str>,
    quit_keys: bool,
) -> Result<Box<dyn Renderer>> {
    match settings.mode {
        RenderMode::Console => {
            let mut renderer =
                ConsoleRenderer::new(UiMode::from_flag(ui_flag), std::io::stderr().is_terminal());
            if quit_keys {
                renderer = renderer.with_quit_keys(QuitKeys::stdin()?);
            }
            Ok(Box::new(renderer))
        }
        RenderMode::Headless => Ok(Box::new(HeadlessRenderer::new())),
        #[cfg(feature = "render-snapshots")]
        RenderMode::Snapshots => Ok(Box::new(render::SnapshotRenderer::new(
            settings.snapshot_dir.clone(),
            settings.font_path.as_deref(),
        )?)),
        #[cfg(not(feature = "render-snapshots"))]
        RenderMode::Snapshots => Err(anyhow!(
            "snapshot rendering requires the render-snapshots feature"
        )),
    }
}

pub fn build_notifier(mode: NotifierMode) -> Box<dyn Notifier> {
    match mode {
        NotifierMode::Log => Box::new(LogNotifier),
        NotifierMode::Prompt => Box::new(PromptNotifier::stdio()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn detector_settings(backend: &str) -> config::DetectorSettings {
        config::DetectorSettings {
            backend: backend.to_string(),
            confidence_threshold: 0.5,
            model_path: None,
            model_width: 640,
            model_height: 640,
        }
    }

    #[test]
    fn builds_known_detectors() {
        assert_eq!(build_detector(&detector_settings("cpu")).unwrap().name(), "cpu");
        assert_eq!(build_detector(&detector_settings("stub")).unwrap().name(), "stub");
        assert!(build_detector(&detector_settings("yolo")).is_err());
        assert!(build_detector(&detector_settings("tract")).is_err());
    }

    #[test]
    fn builds_headless_renderer() {
        let settings = config::RenderSettings {
            mode: RenderMode::Headless,
            snapshot_dir: PathBuf::from("unused"),
            font_path: None,
        };
        assert!(build_renderer(&settings, None, false).is_ok());
    }
}
