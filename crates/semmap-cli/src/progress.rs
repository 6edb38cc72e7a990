//! Terminal progress for mapping runs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use semmap_engine::ProgressSink;
use tracing::info;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}";

/// Draws a bar on stderr. Status messages become the bar message and are
/// logged at info level.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// A sink that tracks position without drawing.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), target);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn set_max(&self, max: u64) {
        self.bar.set_length(max);
    }

    fn status(&self, message: &str) {
        info!("{message}");
        self.bar.set_message(message.to_string());
    }

    fn increment(&self, units: u64) {
        self.bar.inc(units);
    }
}
