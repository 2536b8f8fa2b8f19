//! Spinners for long-running administrator actions.
//!
//! Downloads, snapshots and extractions can take a while on a slow host.
//! [`ProgressBar`] wraps an `indicatif` spinner with the project's styling
//! and turns itself into a hidden no-op when progress output is disabled.
//!
//! # Environment Variables
//!
//! - `REELSHELF_NO_PROGRESS`: set to any value to disable all progress
//!   indicators (the `--no-progress` flag sets it for the process)

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::io::IsTerminal;
use std::time::Duration;

use crate::constants::NO_PROGRESS_ENV_VAR;

/// Whether progress output is disabled, by environment or because stderr
/// is not a terminal.
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV_VAR).is_some() || !std::io::stderr().is_terminal()
}

/// A spinner with consistent styling.
///
/// ```rust,no_run
/// use reelshelf_cli::utils::progress::ProgressBar;
///
/// let spinner = ProgressBar::new_spinner();
/// spinner.set_message("Creating backup...");
/// spinner.finish_with_message("Backup created");
/// ```
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// Creates a spinner for an operation of unknown length.
    pub fn new_spinner() -> Self {
        let bar = if is_progress_disabled() {
            IndicatifBar::hidden()
        } else {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        };
        Self { inner: bar }
    }

    /// Sets the message displayed next to the spinner.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Stops the spinner, leaving `msg` on screen.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Stops the spinner and removes it from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }

    /// Whether output is suppressed.
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }
}

/// Creates a spinner with an initial message.
pub fn spinner_with_message(msg: impl Into<String>) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_message(msg);
    spinner
}

fn spinner_style() -> IndicatifStyle {
    IndicatifStyle::default_spinner()
        .template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| IndicatifStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "✓"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_spinner_hidden_when_disabled() {
        unsafe {
            std::env::set_var(NO_PROGRESS_ENV_VAR, "1");
        }
        let spinner = spinner_with_message("Working");
        assert!(spinner.is_hidden());
        spinner.finish_and_clear();
        unsafe {
            std::env::remove_var(NO_PROGRESS_ENV_VAR);
        }
    }
}
