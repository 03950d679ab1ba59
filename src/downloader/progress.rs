use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg:<32} [{bar:40.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} eta {eta}";
const LABEL_WIDTH: usize = 32;

/// Tracks byte progress of live transfers and the run-wide outcome counters.
///
/// Rendering is optional; the counters are kept either way.
pub struct ProgressAggregator {
    bars: Option<MultiProgress>,
    transferred: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
}

impl ProgressAggregator {
    /// Draws on `bars` when given, otherwise only counts.
    pub fn new(bars: Option<MultiProgress>) -> Self {
        ProgressAggregator {
            bars,
            transferred: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Registers a transfer of `total` bytes of which `start` are already on disk.
    pub fn new_handle(self: &Arc<Self>, label: &str, total: u64, start: u64) -> ProgressHandle {
        let bar = self.bars.as_ref().map(|bars| {
            let bar = bars.add(ProgressBar::new(total));
            bar.set_style(bar_style());
            bar.set_message(short_label(label));
            bar.set_position(start);
            bar
        });
        ProgressHandle {
            bar,
            aggregator: Arc::clone(self),
        }
    }

    pub fn record_transferred(&self) {
        self.transferred.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn summary(&self, elapsed: Duration) -> RunSummary {
        RunSummary {
            transferred: self.transferred.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template(BAR_TEMPLATE)
        .map(|style| style.progress_chars("=> "))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
}

fn short_label(label: &str) -> String {
    if label.chars().count() <= LABEL_WIDTH {
        return label.to_string();
    }
    let mut short: String = label.chars().take(LABEL_WIDTH - 1).collect();
    short.push('~');
    short
}

/// Reporting handle owned by exactly one transfer.
pub struct ProgressHandle {
    bar: Option<ProgressBar>,
    aggregator: Arc<ProgressAggregator>,
}

impl ProgressHandle {
    pub fn advance(&self, n: u64) {
        self.aggregator.bytes.fetch_add(n, Ordering::Relaxed);
        if let Some(bar) = &self.bar {
            bar.inc(n);
        }
    }

    /// Moves the bar back, e.g. when a transfer restarts from another offset.
    pub fn reset_to(&self, position: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(position);
        }
    }

    pub fn finish(self) {
        if let Some(bar) = &self.bar {
            bar.finish();
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        if let Some(bar) = &self.bar {
            if !bar.is_finished() {
                bar.abandon();
            }
        }
    }
}

/// Outcome of one `download` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub transferred: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} file(s) downloaded, {} already present, {} failed, {} bytes in {:.2}s",
            self.transferred,
            self.skipped,
            self.failed,
            self.bytes,
            self.elapsed.as_secs_f64()
        )
    }
}
