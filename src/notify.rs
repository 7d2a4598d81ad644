//! User-facing alert delivery.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

/// Default alert dialog title.
pub const ALERT_TITLE: &str = "Proximity Alert";

/// Alert dialog body for a breach tally.
pub fn alert_message(breach_count: u64) -> String {
    format!("Breach detected! Total breaches: {}", breach_count)
}

/// Delivers alerts to the operator.
///
/// Implementations may block until the alert is acknowledged; the monitor
/// loop pauses while they do.
pub trait Notifier {
    fn show_warning(&mut self, title: &str, message: &str) -> Result<()>;
}

/// Logs alerts at warn level and returns immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_warning(&mut self, title: &str, message: &str) -> Result<()> {
        log::warn!("[{}] {}", title, message);
        Ok(())
    }
}

/// Prints the alert and blocks until the operator presses Enter.
pub struct PromptNotifier<R, W> {
    input: R,
    output: W,
}

impl PromptNotifier<std::io::StdinLock<'static>, std::io::Stderr> {
    /// Prompt on stderr, acknowledge from stdin.
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> PromptNotifier<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }
}

impl<R: BufRead, W: Write> Notifier for PromptNotifier<R, W> {
    fn show_warning(&mut self, title: &str, message: &str) -> Result<()> {
        writeln!(self.output, "\n!! {}: {}", title, message).context("failed to show alert")?;
        write!(self.output, "   press Enter to acknowledge ").context("failed to show alert")?;
        self.output.flush().context("failed to show alert")?;

        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("failed to read alert acknowledgement")?;
        log::info!("alert acknowledged: {}", message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_includes_tally() {
        assert_eq!(alert_message(3), "Breach detected! Total breaches: 3");
    }

    #[test]
    fn prompt_waits_for_a_line() {
        let input = std::io::Cursor::new(b"\n".to_vec());
        let mut output = Vec::new();
        {
            let mut notifier = PromptNotifier::new(input, &mut output);
            notifier
                .show_warning(ALERT_TITLE, &alert_message(1))
                .unwrap();
        }
        let shown = String::from_utf8(output).unwrap();
        assert!(shown.contains("Proximity Alert: Breach detected! Total breaches: 1"));
        assert!(shown.contains("press Enter"));
    }

    #[test]
    fn log_notifier_never_blocks() {
        LogNotifier.show_warning(ALERT_TITLE, "test").unwrap();
    }
}
