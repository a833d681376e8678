//! CLI progress reporting
//!
//! `--progress` draws an indicatif bar on stderr; otherwise progress goes
//! through tracing like every other log line.

use crate::services::progress::{ConsoleProgressReporter, ProcessingStage, ProgressReporter, ProgressUpdate};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Mutex;

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar reporter for interactive runs
#[derive(Debug, Default)]
pub struct IndicatifProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifProgressReporter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-")
    }
}

impl ProgressReporter for IndicatifProgressReporter {
    fn start(&self, stage: ProcessingStage, total: usize) {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        bar.set_style(Self::style());
        bar.set_message(stage.description());
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn report_progress(&self, update: &ProgressUpdate) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                bar.set_position(update.completed as u64);
                if update.failed > 0 {
                    bar.set_message(format!("{} ({} failed)", update.item, update.failed));
                } else {
                    bar.set_message(update.item.clone());
                }
            }
        }
    }

    fn finish(&self, stage: ProcessingStage, completed: usize, failed: usize, elapsed_ms: u64) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_with_message(format!(
                    "{}: {completed} done, {failed} failed in {:.1}s",
                    stage.description(),
                    elapsed_ms as f64 / 1000.0
                ));
            }
        }
    }
}

/// Pick the reporter for a CLI run
#[must_use]
pub fn create_cli_progress_reporter(progress: bool, verbose: bool) -> Box<dyn ProgressReporter> {
    if progress {
        Box::new(IndicatifProgressReporter::new())
    } else {
        Box::new(ConsoleProgressReporter::new(verbose))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicatif_lifecycle() {
        let reporter = IndicatifProgressReporter::new();
        reporter.start(ProcessingStage::Thumbnails, 2);
        reporter.report_progress(&ProgressUpdate {
            stage: ProcessingStage::Thumbnails,
            completed: 1,
            total: 2,
            failed: 0,
            item: "white.png".to_string(),
            elapsed_ms: 5,
            eta_ms: Some(5),
        });
        assert!(reporter.bar.lock().unwrap().is_some());
        reporter.finish(ProcessingStage::Thumbnails, 2, 0, 10);
        assert!(reporter.bar.lock().unwrap().is_none());
    }

    #[test]
    fn test_report_before_start_is_ignored() {
        let reporter = IndicatifProgressReporter::new();
        reporter.finish(ProcessingStage::Cleanup, 0, 0, 0);
        assert!(reporter.bar.lock().unwrap().is_none());
    }
}
