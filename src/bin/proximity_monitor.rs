//! proximity_monitor - watch a feed and alert when objects enter the center zone
//!
//! This binary:
//! 1. Loads configuration (file, env, CLI flags)
//! 2. Opens the frame source (failure here exits non-zero)
//! 3. Runs the monitor loop until Ctrl-C / q, end of stream or a read failure
//! 4. Releases the source and prints a run summary

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use proximity_monitor::{
    build_detector, build_notifier, build_renderer, open_source, AlertThrottle, Monitor,
    MonitorConfig, NotifierMode, QuitSignal, RenderMode,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PROXIMITY_CONFIG")]
    config: Option<PathBuf>,
    /// Frame source: stub://<name> or a directory of images.
    #[arg(long)]
    source: Option<String>,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// Detector backend (cpu, stub, tract).
    #[arg(long)]
    backend: Option<String>,
    /// Seconds between two alerts.
    #[arg(long)]
    cooldown_secs: Option<f64>,
    /// Renderer: console, headless or snapshots.
    #[arg(long)]
    render: Option<String>,
    /// Notifier: log or prompt.
    #[arg(long)]
    notifier: Option<String>,
    /// Console style: plain or pretty (default: auto).
    #[arg(long)]
    ui: Option<String>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = load_config(&args)?;

    let quit = QuitSignal::ctrlc()?;
    let detector = build_detector(&cfg.detector)?;
    // stdin belongs to the prompt notifier when it is selected.
    let quit_keys = cfg.render.mode == RenderMode::Console
        && cfg.notifier == NotifierMode::Log
        && std::io::stdin().is_terminal();
    let renderer = build_renderer(&cfg.render, args.ui.as_deref(), quit_keys)?;
    let source = open_source(&cfg.source)
        .with_context(|| format!("could not open frame source {}", cfg.source.uri))?;
    let notifier = build_notifier(cfg.notifier);

    if quit_keys {
        log::info!("proximity monitoring started. Press Ctrl-C / q to quit.");
    } else {
        log::info!("proximity monitoring started. Press Ctrl-C to quit.");
    }

    let report = Monitor::new(source, detector, renderer, notifier)
        .with_throttle(AlertThrottle::new(cfg.alert.cooldown))
        .with_confidence_threshold(cfg.detector.confidence_threshold)
        .with_alert_title(cfg.alert.title.clone())
        .with_quit_signal(quit)
        .run()?;

    log::info!(
        "run summary: frames={} breach_frames={} alerts={} total_breaches={} stop={:?}",
        report.frames_processed,
        report.breach_frames,
        report.alerts_emitted,
        report.breach_count,
        report.stop_reason
    );
    Ok(())
}

fn load_config(args: &Args) -> Result<MonitorConfig> {
    let mut cfg = MonitorConfig::load_from(args.config.as_deref())?;
    if let Some(source) = &args.source {
        cfg.source.uri = source.clone();
    }
    if let Some(max_frames) = args.max_frames {
        cfg.source.max_frames = Some(max_frames);
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(secs) = args.cooldown_secs {
        cfg.alert.cooldown = std::time::Duration::try_from_secs_f64(secs)
            .context("--cooldown-secs must be a finite, non-negative number")?;
    }
    if let Some(render) = &args.render {
        cfg.render.mode = RenderMode::parse(render)?;
    }
    if let Some(notifier) = &args.notifier {
        cfg.notifier = NotifierMode::parse(notifier)?;
    }
    cfg.validate()?;
    Ok(cfg)
}
