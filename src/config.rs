use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::ingest::SourceConfig;
use crate::notify::ALERT_TITLE;
use crate::throttle::DEFAULT_COOLDOWN;

const DEFAULT_SOURCE_URI: &str = "stub://camera";
const DEFAULT_SOURCE_FPS: u32 = 10;
const DEFAULT_SOURCE_WIDTH: u32 = 640;
const DEFAULT_SOURCE_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "cpu";
const DEFAULT_MODEL_SIZE: u32 = 640;
const DEFAULT_SNAPSHOT_DIR: &str = "snapshots";

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    source: Option<SourceConfigFile>,
    detector: Option<DetectorConfigFile>,
    alert: Option<AlertConfigFile>,
    render: Option<RenderConfigFile>,
    notifier: Option<NotifierConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct SourceConfigFile {
    uri: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    confidence_threshold: Option<f32>,
    model_path: Option<PathBuf>,
    model_width: Option<u32>,
    model_height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct AlertConfigFile {
    cooldown_secs: Option<f64>,
    title: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    mode: Option<String>,
    snapshot_dir: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct NotifierConfigFile {
    mode: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Console,
    Headless,
    Snapshots,
}

impl RenderMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "headless" => Ok(Self::Headless),
            "snapshots" => Ok(Self::Snapshots),
            other => Err(anyhow!(
                "unknown render mode '{}' (expected console, headless or snapshots)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierMode {
    Log,
    Prompt,
}

impl NotifierMode {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(Self::Log),
            "prompt" => Ok(Self::Prompt),
            other => Err(anyhow!(
                "unknown notifier mode '{}' (expected log or prompt)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub source: SourceConfig,
    pub detector: DetectorSettings,
    pub alert: AlertSettings,
    pub render: RenderSettings,
    pub notifier: NotifierMode,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: String,
    pub confidence_threshold: f32,
    pub model_path: Option<PathBuf>,
    pub model_width: u32,
    pub model_height: u32,
}

#[derive(Debug, Clone)]
pub struct AlertSettings {
    pub cooldown: Duration,
    pub title: String,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub mode: RenderMode,
    pub snapshot_dir: PathBuf,
    /// TrueType/OpenType font for snapshot text.
    pub font_path: Option<PathBuf>,
}

impl MonitorConfig {
    /// Load from `$PROXIMITY_CONFIG` (if set), then apply env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PROXIMITY_CONFIG").ok();
        Self::load_from(config_path.as_deref().map(Path::new))
    }

    /// Load from an explicit file (if any), then apply env overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: MonitorConfigFile) -> Result<Self> {
        let source_file = file.source.unwrap_or_default();
        let source = SourceConfig {
            uri: source_file
                .uri
                .unwrap_or_else(|| DEFAULT_SOURCE_URI.to_string()),
            target_fps: source_file.target_fps.unwrap_or(DEFAULT_SOURCE_FPS),
            width: source_file.width.unwrap_or(DEFAULT_SOURCE_WIDTH),
            height: source_file.height.unwrap_or(DEFAULT_SOURCE_HEIGHT),
            max_frames: source_file.max_frames,
            pace: true,
        };

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: detector_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            model_path: detector_file.model_path,
            model_width: detector_file.model_width.unwrap_or(DEFAULT_MODEL_SIZE),
            model_height: detector_file.model_height.unwrap_or(DEFAULT_MODEL_SIZE),
        };

        let alert_file = file.alert.unwrap_or_default();
        let alert = AlertSettings {
            cooldown: match alert_file.cooldown_secs {
                Some(secs) => cooldown_from_secs(secs)?,
                None => DEFAULT_COOLDOWN,
            },
            title: alert_file.title.unwrap_or_else(|| ALERT_TITLE.to_string()),
        };

        let render_file = file.render.unwrap_or_default();
        let render = RenderSettings {
            mode: match render_file.mode.as_deref() {
                Some(mode) => RenderMode::parse(mode)?,
                None => RenderMode::Console,
            },
            snapshot_dir: render_file
                .snapshot_dir
                .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_DIR)),
            font_path: render_file.font_path,
        };

        let notifier = match file.notifier.and_then(|n| n.mode) {
            Some(mode) => NotifierMode::parse(&mode)?,
            None => NotifierMode::Log,
        };

        Ok(Self {
            source,
            detector,
            alert,
            render,
            notifier,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(uri) = non_empty_env("PROXIMITY_SOURCE") {
            self.source.uri = uri;
        }
        if let Some(backend) = non_empty_env("PROXIMITY_BACKEND") {
            self.detector.backend = backend;
        }
        if let Some(threshold) = non_empty_env("PROXIMITY_CONFIDENCE") {
            self.detector.confidence_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("PROXIMITY_CONFIDENCE must be a number in [0, 1]"))?;
        }
        if let Some(cooldown) = non_empty_env("PROXIMITY_COOLDOWN_SECS") {
            let secs: f64 = cooldown
                .parse()
                .map_err(|_| anyhow!("PROXIMITY_COOLDOWN_SECS must be a number of seconds"))?;
            self.alert.cooldown = cooldown_from_secs(secs)?;
        }
        if let Some(max_frames) = non_empty_env("PROXIMITY_MAX_FRAMES") {
            self.source.max_frames = Some(
                max_frames
                    .parse()
                    .map_err(|_| anyhow!("PROXIMITY_MAX_FRAMES must be an integer"))?,
            );
        }
        if let Some(mode) = non_empty_env("PROXIMITY_RENDER") {
            self.render.mode = RenderMode::parse(&mode)?;
        }
        if let Some(mode) = non_empty_env("PROXIMITY_NOTIFIER") {
            self.notifier = NotifierMode::parse(&mode)?;
        }
        Ok(())
    }

    /// Check ranges. Called by the loaders; call again after manual edits.
    pub fn validate(&self) -> Result<()> {
        if self.source.uri.trim().is_empty() {
            return Err(anyhow!("source uri must not be empty"));
        }
        if self.source.width == 0 || self.source.height == 0 {
            return Err(anyhow!("source width and height must be greater than zero"));
        }
        if self.source.target_fps == 0 {
            return Err(anyhow!("source target_fps must be >= 1"));
        }
        let threshold = self.detector.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(anyhow!(
                "confidence threshold must be within [0, 1], got {}",
                threshold
            ));
        }
        if self.detector.model_width == 0 || self.detector.model_height == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        Ok(())
    }
}

fn cooldown_from_secs(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("cooldown must be a finite, non-negative number of seconds"))
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<MonitorConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg: MonitorConfigFile = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reference_behaviour() {
        let cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        assert_eq!(cfg.source.uri, "stub://camera");
        assert_eq!((cfg.source.width, cfg.source.height), (640, 480));
        assert_eq!(cfg.source.max_frames, None);
        assert_eq!(cfg.detector.backend, "cpu");
        assert_eq!(cfg.detector.confidence_threshold, 0.5);
        assert_eq!(cfg.alert.cooldown, Duration::from_secs(3));
        assert_eq!(cfg.alert.title, "Proximity Alert");
        assert_eq!(cfg.render.mode, RenderMode::Console);
        assert_eq!(cfg.render.font_path, None);
        assert_eq!(cfg.notifier, NotifierMode::Log);
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        cfg.detector.confidence_threshold = 1.5;
        assert!(cfg.validate().is_err());

        let mut cfg = MonitorConfig::from_file(MonitorConfigFile::default()).unwrap();
        cfg.source.target_fps = 0;
        assert!(cfg.validate().is_err());

        assert!(cooldown_from_secs(-1.0).is_err());
        assert!(cooldown_from_secs(f64::NAN).is_err());
        assert_eq!(cooldown_from_secs(0.5).unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn parses_modes() {
        assert_eq!(RenderMode::parse("Headless").unwrap(), RenderMode::Headless);
        assert!(RenderMode::parse("window").is_err());
        assert_eq!(NotifierMode::parse("prompt").unwrap(), NotifierMode::Prompt);
        assert!(NotifierMode::parse("email").is_err());
    }
}
