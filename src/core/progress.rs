//! Running progress line
//!
//! Shows items moved, total request charge and charge per second while a
//! run is in flight. Disabled when stderr is not a terminal.

use crate::core::cost::CostMeter;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Progress display for export and import runs
pub struct ProgressReporter {
    meter: CostMeter,
    items: AtomicU64,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Create a reporter
    ///
    /// # Arguments
    /// * `meter` - Cost meter the line reads totals from
    /// * `enable_bar` - Draw a spinner (ignored when stderr is not a terminal)
    /// * `label` - Verb shown in front of the item count
    pub fn new(meter: CostMeter, enable_bar: bool, label: &str) -> Self {
        let bar = (enable_bar && std::io::stderr().is_terminal()).then(|| {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::default_spinner()
                    .template(&format!(
                        "{{spinner:.green}} [{{elapsed_precise}}] {label} {{pos}} items {{msg}}"
                    ))
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(200));
            bar
        });

        Self {
            meter,
            items: AtomicU64::new(0),
            bar,
        }
    }

    /// A reporter that never draws
    pub fn hidden(meter: CostMeter) -> Self {
        Self::new(meter, false, "")
    }

    /// Count `count` more items and refresh the line
    pub fn add_items(&self, count: u64) {
        let total = self.items.fetch_add(count, Ordering::Relaxed) + count;

        if let Some(ref bar) = self.bar {
            bar.set_position(total);
            bar.set_message(format!(
                "| {:.2} RU | {:.2} RU/s",
                self.meter.total(),
                self.meter.throughput()
            ));
        }
    }

    /// Items counted so far
    pub fn items(&self) -> u64 {
        self.items.load(Ordering::Relaxed)
    }

    /// Print a line above the spinner without tearing it
    pub fn println(&self, line: impl AsRef<str>) {
        match self.bar {
            Some(ref bar) => bar.println(line),
            None => eprintln!("{}", line.as_ref()),
        }
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_reporter_counts_items() {
        let reporter = ProgressReporter::hidden(CostMeter::new());
        reporter.add_items(3);
        reporter.add_items(4);
        assert_eq!(reporter.items(), 7);
        reporter.finish();
    }
}
