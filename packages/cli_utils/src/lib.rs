#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing for the safewalk binaries.
//!
//! [`IndicatifProgress`] renders one bar per dataset collector behind the
//! [`ProgressCallback`] trait. [`init_logger`] routes `log` output through
//! `indicatif-log-bridge` so log lines print above the bars instead of
//! tearing them.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use safewalk_source::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// Log filter used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// A [`ProgressBar`] driven by a dataset collector.
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Applied once the task count is known.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    fn new(multi: &MultiProgress, label: &str) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {prefix:<20} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_prefix(label.to_string());
        bar.set_message("waiting");

        let bar_style = ProgressStyle::with_template(
            "  {prefix:<20} {wide_bar:.cyan/dim} {pos}/{len} tasks {percent}% [{eta}] {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");

        Self { bar, bar_style }
    }

    /// Bar counting `(region, year)` tasks for one dataset.
    ///
    /// Starts as a spinner and becomes a bar on
    /// [`ProgressCallback::set_total`].
    #[must_use]
    pub fn tasks_bar(multi: &MultiProgress, label: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::new(multi, label))
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge`.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. Returns the
/// [`MultiProgress`] every bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let filters = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filters)
        .build();
    let level = logger.filter();

    // Already initialized when called twice, e.g. from tests.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use indicatif::ProgressDrawTarget;

    use super::*;

    fn hidden() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    #[test]
    fn bar_tracks_tasks() {
        let multi = hidden();
        let progress = IndicatifProgress::new(&multi, "PEDESTRIAN");
        assert_eq!(progress.bar.length(), None);

        progress.set_total(4);
        progress.inc(1);
        progress.inc(2);
        assert_eq!(progress.bar.length(), Some(4));
        assert_eq!(progress.bar.position(), 3);

        progress.finish("done".to_string());
        assert!(progress.bar.is_finished());
        assert_eq!(progress.bar.message(), "done");
    }

    #[test]
    fn set_total_resets_position() {
        let multi = hidden();
        let progress = IndicatifProgress::new(&multi, "HOLIDAY");
        progress.set_total(10);
        progress.inc(5);
        progress.set_total(2);
        assert_eq!(progress.bar.position(), 0);
        assert_eq!(progress.bar.length(), Some(2));
    }
}
