use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use super::{Overlay, Renderer};
use crate::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn from_flag(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Line-based quit key watcher: `q` followed by Enter.
///
/// A background thread blocks on the reader so polling never stalls the
/// monitor loop.
#[derive(Clone, Debug)]
pub struct QuitKeys {
    pressed: Arc<AtomicBool>,
}

impl QuitKeys {
    /// Watch the process stdin.
    pub fn stdin() -> Result<Self> {
        Self::spawn_with(|| std::io::stdin().lock())
    }

    /// Watch an arbitrary reader.
    pub fn spawn<R: BufRead + Send + 'static>(reader: R) -> Result<Self> {
        Self::spawn_with(move || reader)
    }

    fn spawn_with<R, F>(make_reader: F) -> Result<Self>
    where
        R: BufRead,
        F: FnOnce() -> R + Send + 'static,
    {
        let pressed = Arc::new(AtomicBool::new(false));
        let flag = pressed.clone();
        thread::Builder::new()
            .name("quit-keys".to_string())
            .spawn(move || watch(make_reader(), &flag))
            .context("failed to start quit key watcher")?;
        Ok(Self { pressed })
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::SeqCst)
    }
}

fn watch<R: BufRead>(reader: R, pressed: &AtomicBool) {
    for line in reader.lines() {
        match line {
            Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                pressed.store(true, Ordering::SeqCst);
                return;
            }
            Ok(_) => {}
            Err(e) => {
                log::debug!("quit key watcher stopped: {}", e);
                return;
            }
        }
    }
}

/// Terminal renderer.
///
/// On a TTY the status and breach tally live on a spinner line that updates
/// every frame. Otherwise only status transitions are logged.
pub struct ConsoleRenderer {
    spinner: Option<ProgressBar>,
    last_status: Option<bool>,
    keys: Option<QuitKeys>,
}

impl ConsoleRenderer {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        let use_pretty = is_tty && !matches!(mode, UiMode::Plain);
        let spinner = use_pretty.then(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.set_draw_target(ProgressDrawTarget::stderr());
            spinner.enable_steady_tick(Duration::from_millis(120));
            let style = ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            spinner.set_style(style);
            spinner
        });
        Self {
            spinner,
            last_status: None,
            keys: None,
        }
    }

    pub fn with_quit_keys(mut self, keys: QuitKeys) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn is_pretty(&self) -> bool {
        self.spinner.is_some()
    }
}

impl Renderer for ConsoleRenderer {
    fn present(&mut self, frame: &Frame, overlay: &Overlay) -> Result<()> {
        let changed = self.last_status != Some(overlay.breached);
        self.last_status = Some(overlay.breached);

        match &self.spinner {
            Some(spinner) => spinner.set_message(format!(
                "frame {} | {} | {} | {} object(s)",
                frame.index,
                overlay.status_text(),
                overlay.count_text(),
                overlay.boxes.len()
            )),
            None if changed => log::info!(
                "frame {}: {} ({})",
                frame.index,
                overlay.status_text(),
                overlay.count_text()
            ),
            None => {}
        }
        Ok(())
    }

    fn poll_quit(&mut self) -> bool {
        self.keys.as_ref().is_some_and(QuitKeys::is_pressed)
    }

    fn close(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl Drop for ConsoleRenderer {
    fn drop(&mut self) {
        self.close();
    }
}
