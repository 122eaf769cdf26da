use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates for a long-running step.
pub trait ProgressSink: Send + Sync {
    fn set_current(&self, current: usize);
    fn set_total(&self, total: usize);
    fn finish(&self, message: &str);
}

/// Terminal progress bar.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    pub fn new(label: &str) -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        bar.set_style(style);
        bar.set_prefix(label.to_string());
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        Self { bar }
    }
}

impl ProgressSink for BarProgress {
    fn set_current(&self, current: usize) {
        self.bar.set_position(current as u64);
    }

    fn set_total(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }
}

/// Discards every update. Used in quiet mode and tests.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn set_current(&self, _current: usize) {}
    fn set_total(&self, _total: usize) {}
    fn finish(&self, _message: &str) {}
}
