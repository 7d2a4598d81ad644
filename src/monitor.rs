//! The monitor loop.
//!
//! One iteration: read a frame, derive the zone, run the detector, evaluate
//! the breach, feed the throttle, render, notify if an alert was emitted, then
//! check for a quit request. Iterations never overlap, so the throttle state
//! and the detection snapshot it was fed from always belong to the same frame.
//!
//! The monitor owns its source and renderer and releases both exactly once,
//! whether the loop ends on quit, end of stream, read failure or a detector
//! error.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::breach::is_breached;
use crate::detect::{DetectorBackend, DEFAULT_CONFIDENCE_THRESHOLD};
use crate::ingest::FrameSource;
use crate::notify::{alert_message, Notifier, ALERT_TITLE};
use crate::render::{detection_label, LabeledBox, Overlay, Renderer};
use crate::throttle::{AlertThrottle, Clock, MonotonicClock};
use crate::zone::compute_zone;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

/// Cooperative quit flag shared between the loop and whoever requests a stop.
#[derive(Clone, Debug, Default)]
pub struct QuitSignal {
    flag: Arc<AtomicBool>,
}

impl QuitSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal that is raised by Ctrl-C.
    pub fn ctrlc() -> Result<Self> {
        let signal = Self::new();
        let handle = signal.clone();
        ctrlc::set_handler(move || handle.request()).context("failed to install Ctrl-C handler")?;
        Ok(signal)
    }

    pub fn request(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitRequested,
    EndOfStream,
    /// The source failed mid-stream; treated as end of stream.
    ReadError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MonitorState {
    Running,
    Stopped(StopReason),
}

/// Summary of a finished run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorReport {
    pub frames_processed: u64,
    /// Frames in which at least one detection overlapped the zone.
    pub breach_frames: u64,
    pub alerts_emitted: u64,
    pub breach_count: u64,
    pub stop_reason: StopReason,
}

pub struct Monitor {
    source: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    renderer: Box<dyn Renderer>,
    notifier: Box<dyn Notifier>,
    clock: Box<dyn Clock>,
    throttle: AlertThrottle,
    quit: QuitSignal,
    confidence_threshold: f32,
    alert_title: String,
    state: MonitorState,
    released: bool,
    frames_processed: u64,
    breach_frames: u64,
    alerts_emitted: u64,
    last_health_log: Duration,
}

impl Monitor {
    /// Build a monitor around an already opened source.
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
        renderer: Box<dyn Renderer>,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            detector,
            renderer,
            notifier,
            clock: Box::new(MonotonicClock::new()),
            throttle: AlertThrottle::default(),
            quit: QuitSignal::new(),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            alert_title: ALERT_TITLE.to_string(),
            state: MonitorState::Running,
            released: false,
            frames_processed: 0,
            breach_frames: 0,
            alerts_emitted: 0,
            last_health_log: Duration::ZERO,
        }
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self.last_health_log = self.clock.now();
        self
    }

    pub fn with_throttle(mut self, throttle: AlertThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_quit_signal(mut self, quit: QuitSignal) -> Self {
        self.quit = quit;
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_alert_title(mut self, title: impl Into<String>) -> Self {
        self.alert_title = title.into();
        self
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn breach_count(&self) -> u64 {
        self.throttle.breach_count()
    }

    /// Run until stopped. Source and renderer are released on every path.
    pub fn run(mut self) -> Result<MonitorReport> {
        self.detector
            .warm_up()
            .with_context(|| format!("detector {} failed to warm up", self.detector.name()))?;
        log::info!(
            "monitoring started with detector {} (threshold {:.2}, cooldown {:.1}s)",
            self.detector.name(),
            self.confidence_threshold,
            self.throttle.cooldown().as_secs_f64()
        );

        let stop_reason = loop {
            if let MonitorState::Stopped(reason) = self.step()? {
                break reason;
            }
        };
        self.shutdown();

        let report = MonitorReport {
            frames_processed: self.frames_processed,
            breach_frames: self.breach_frames,
            alerts_emitted: self.alerts_emitted,
            breach_count: self.throttle.breach_count(),
            stop_reason,
        };
        log::info!(
            "monitoring stopped ({:?}): {} frames, {} breach frames, {} alerts",
            report.stop_reason,
            report.frames_processed,
            report.breach_frames,
            report.alerts_emitted
        );
        Ok(report)
    }

    /// Process a single frame.
    ///
    /// Read failures stop the monitor; detector, renderer and notifier
    /// failures are returned as errors.
    pub fn step(&mut self) -> Result<MonitorState> {
        if let MonitorState::Stopped(_) = self.state {
            return Ok(self.state);
        }

        let frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(self.stop(StopReason::EndOfStream)),
            Err(e) => {
                log::warn!("frame read failed, stopping: {:#}", e);
                return Ok(self.stop(StopReason::ReadError));
            }
        };

        let zone = compute_zone(frame.width, frame.height);
        let detections = self
            .detector
            .detect(&frame.view(), self.confidence_threshold)
            .with_context(|| {
                format!(
                    "detector {} failed on frame {}",
                    self.detector.name(),
                    frame.index
                )
            })?;
        let breached = is_breached(&detections, &zone);
        let now = self.clock.now();
        let alert = self.throttle.on_frame(breached, now);

        self.frames_processed += 1;
        if breached {
            self.breach_frames += 1;
        }

        let overlay = Overlay {
            zone,
            breached,
            boxes: detections
                .iter()
                .map(|d| LabeledBox {
                    bbox: d.bbox,
                    label: detection_label(self.detector.class_name(d.class_id), d.confidence),
                })
                .collect(),
            breach_count: self.throttle.breach_count(),
        };
        self.renderer.present(&frame, &overlay)?;

        match alert {
            Some(event) => {
                self.alerts_emitted += 1;
                log::warn!(
                    "breach #{} on frame {} at {:.2}s",
                    event.breach_count,
                    frame.index,
                    event.at.as_secs_f64()
                );
                self.notifier
                    .show_warning(&self.alert_title, &alert_message(event.breach_count))?;
            }
            None if breached => {
                log::debug!("breach on frame {} suppressed by cooldown", frame.index);
            }
            None => {}
        }

        if now.saturating_sub(self.last_health_log) >= HEALTH_LOG_INTERVAL {
            let stats = self.source.stats();
            log::info!(
                "source={} frames={} breaches={}",
                stats.uri,
                stats.frames_captured,
                self.throttle.breach_count()
            );
            self.last_health_log = now;
        }

        if self.quit.is_requested() || self.renderer.poll_quit() {
            return Ok(self.stop(StopReason::QuitRequested));
        }
        Ok(MonitorState::Running)
    }

    fn stop(&mut self, reason: StopReason) -> MonitorState {
        self.state = MonitorState::Stopped(reason);
        self.shutdown();
        self.state
    }

    fn shutdown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.release();
        self.renderer.close();
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection, StubBackend};
    use crate::frame::Frame;
    use crate::ingest::SourceStats;
    use crate::render::{ConsoleRenderer, HeadlessRenderer, QuitKeys, UiMode};
    use crate::throttle::ManualClock;
    use anyhow::anyhow;
    use std::sync::Mutex;

    /// Source yielding blank frames, then optionally an error.
    struct ScriptedSource {
        remaining: u64,
        fail_at_end: bool,
        frames: u64,
        released: Arc<AtomicBool>,
        clock: Option<(ManualClock, Duration)>,
    }

    impl ScriptedSource {
        fn new(frames: u64, released: Arc<AtomicBool>) -> Self {
            Self {
                remaining: frames,
                fail_at_end: false,
                frames: 0,
                released,
                clock: None,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn open(&mut self) -> Result<()> {
            Ok(())
        }

        fn next_frame(&mut self) -> Result<Option<Frame>> {
            if self.remaining == 0 {
                if self.fail_at_end {
                    return Err(anyhow!("device unplugged"));
                }
                return Ok(None);
            }
            if let Some((clock, step)) = &self.clock {
                if self.frames > 0 {
                    clock.advance(*step);
                }
            }
            self.remaining -= 1;
            self.frames += 1;
            Frame::new(vec![0; 64 * 48 * 3], 64, 48, self.frames).map(Some)
        }

        fn release(&mut self) {
            assert!(
                !self.released.swap(true, Ordering::SeqCst),
                "released twice"
            );
        }

        fn stats(&self) -> SourceStats {
            SourceStats {
                frames_captured: self.frames,
                uri: "scripted".to_string(),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        alerts: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Notifier for RecordingNotifier {
        fn show_warning(&mut self, title: &str, message: &str) -> Result<()> {
            self.alerts
                .lock()
                .unwrap()
                .push((title.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct FailingDetector;

    impl DetectorBackend for FailingDetector {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(
            &mut self,
            _frame: &crate::frame::FrameView<'_>,
            _confidence_threshold: f32,
        ) -> Result<Vec<Detection>> {
            Err(anyhow!("malformed frame"))
        }

        fn class_name(&self, _class_id: u32) -> &str {
            "none"
        }
    }

    // Zone for 64x48 is (19, 14, 44, 33).
    fn inside() -> Detection {
        Detection::new(BoundingBox::new(20.0, 20.0, 30.0, 30.0), 0, 0.9)
    }

    fn outside() -> Detection {
        Detection::new(BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0, 0.9)
    }

    #[test]
    fn sustained_breach_is_throttled() {
        let released = Arc::new(AtomicBool::new(false));
        let clock = ManualClock::new();
        let mut source = ScriptedSource::new(5, released.clone());
        source.clock = Some((clock.clone(), Duration::from_secs(1)));
        let notifier = RecordingNotifier::default();

        // t = 0, 1, 2, 3, 4
        let detector = StubBackend::with_script(vec![
            vec![inside()],
            vec![inside()],
            vec![outside()],
            vec![inside(), outside()],
            vec![inside()],
        ]);
        let monitor = Monitor::new(
            Box::new(source),
            Box::new(detector),
            Box::new(HeadlessRenderer::new()),
            Box::new(notifier.clone()),
        )
        .with_clock(clock)
        .with_throttle(AlertThrottle::new(Duration::from_secs(3)));

        let report = monitor.run().unwrap();
        assert_eq!(
            report,
            MonitorReport {
                frames_processed: 5,
                breach_frames: 4,
                alerts_emitted: 2,
                breach_count: 2,
                stop_reason: StopReason::EndOfStream,
            }
        );
        let alerts = notifier.alerts.lock().unwrap();
        assert_eq!(alerts[0].0, "Proximity Alert");
        assert_eq!(alerts[0].1, "Breach detected! Total breaches: 1");
        assert_eq!(alerts[1].1, "Breach detected! Total breaches: 2");
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn read_error_stops_cleanly() {
        let released = Arc::new(AtomicBool::new(false));
        let mut source = ScriptedSource::new(2, released.clone());
        source.fail_at_end = true;
        let monitor = Monitor::new(
            Box::new(source),
            Box::new(StubBackend::new()),
            Box::new(HeadlessRenderer::new()),
            Box::new(RecordingNotifier::default()),
        )
        .with_clock(ManualClock::new());

        let report = monitor.run().unwrap();
        assert_eq!(report.stop_reason, StopReason::ReadError);
        assert_eq!(report.frames_processed, 2);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn quit_signal_stops_after_current_frame() {
        let released = Arc::new(AtomicBool::new(false));
        let quit = QuitSignal::new();
        let mut monitor = Monitor::new(
            Box::new(ScriptedSource::new(100, released.clone())),
            Box::new(StubBackend::new()),
            Box::new(HeadlessRenderer::new()),
            Box::new(RecordingNotifier::default()),
        )
        .with_clock(ManualClock::new())
        .with_quit_signal(quit.clone());

        assert_eq!(monitor.step().unwrap(), MonitorState::Running);
        quit.request();
        assert_eq!(
            monitor.step().unwrap(),
            MonitorState::Stopped(StopReason::QuitRequested)
        );
        assert!(released.load(Ordering::SeqCst));
        // Further steps are no-ops.
        assert_eq!(
            monitor.step().unwrap(),
            MonitorState::Stopped(StopReason::QuitRequested)
        );
        drop(monitor);
    }

    #[test]
    fn quit_key_stops_the_loop() {
        let keys = QuitKeys::spawn(std::io::Cursor::new("q\n")).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !keys.is_pressed() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }

        let released = Arc::new(AtomicBool::new(false));
        let renderer = ConsoleRenderer::new(UiMode::Plain, false).with_quit_keys(keys);
        let monitor = Monitor::new(
            Box::new(ScriptedSource::new(100, released.clone())),
            Box::new(StubBackend::new()),
            Box::new(renderer),
            Box::new(RecordingNotifier::default()),
        )
        .with_clock(ManualClock::new());

        let report = monitor.run().unwrap();
        assert_eq!(report.stop_reason, StopReason::QuitRequested);
        assert_eq!(report.frames_processed, 1);
        assert!(released.load(Ordering::SeqCst));
    }

    #[test]
    fn detector_failure_is_fatal_but_releases() {
        let released = Arc::new(AtomicBool::new(false));
        let notifier = RecordingNotifier::default();
        let monitor = Monitor::new(
            Box::new(ScriptedSource::new(3, released.clone())),
            Box::new(FailingDetector),
            Box::new(HeadlessRenderer::new()),
            Box::new(notifier.clone()),
        )
        .with_clock(ManualClock::new());

        let err = monitor.run().unwrap_err();
        assert!(format!("{:#}", err).contains("malformed frame"));
        assert!(released.load(Ordering::SeqCst));
        assert!(notifier.alerts.lock().unwrap().is_empty());
    }

    #[test]
    fn low_confidence_detections_never_breach() {
        let released = Arc::new(AtomicBool::new(false));
        let weak = Detection::new(BoundingBox::new(20.0, 20.0, 30.0, 30.0), 0, 0.3);
        let monitor = Monitor::new(
            Box::new(ScriptedSource::new(1, released)),
            Box::new(StubBackend::with_script(vec![vec![weak]])),
            Box::new(HeadlessRenderer::new()),
            Box::new(RecordingNotifier::default()),
        )
        .with_clock(ManualClock::new())
        .with_confidence_threshold(0.5);

        let report = monitor.run().unwrap();
        assert_eq!(report.breach_frames, 0);
        assert_eq!(report.breach_count, 0);
    }
}
