//! Progress reporting service
//!
//! Batch runners report item-level progress through `ProgressReporter`, so the
//! CLI can draw a bar while library callers and tests stay silent.

use instant::Instant;
use tracing::info;

/// Batch operation being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Compositing mockups for planned jobs
    Compositing,
    /// Re-encoding thumbnails
    Thumbnails,
    /// Removing stale files from a thumbnail tree
    Cleanup,
    /// Copying a canonical tree into a legacy location
    Materializing,
}

impl ProcessingStage {
    /// Get a human-readable description of the processing stage
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            ProcessingStage::Compositing => "Compositing mockups",
            ProcessingStage::Thumbnails => "Normalizing thumbnails",
            ProcessingStage::Cleanup => "Cleaning thumbnail tree",
            ProcessingStage::Materializing => "Materializing legacy tree",
        }
    }
}

/// Progress update for one finished item
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub stage: ProcessingStage,
    /// Items finished so far, including this one
    pub completed: usize,
    pub total: usize,
    pub failed: usize,
    /// Display name of the item just finished
    pub item: String,
    pub elapsed_ms: u64,
    /// Estimated time remaining, once at least one item finished
    pub eta_ms: Option<u64>,
}

impl ProgressUpdate {
    /// Percentage complete (0-100)
    #[must_use]
    pub fn percentage(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed.min(self.total) * 100) / self.total) as u8
    }
}

/// Trait for reporting progress during batch operations
pub trait ProgressReporter: Send + Sync {
    /// A stage is starting with `total` items
    fn start(&self, stage: ProcessingStage, total: usize);

    /// One item finished
    fn report_progress(&self, update: &ProgressUpdate);

    /// The stage finished
    fn finish(&self, stage: ProcessingStage, completed: usize, failed: usize, elapsed_ms: u64);
}

/// No-op progress reporter that discards all progress updates
#[derive(Debug, Default)]
pub struct NoOpProgressReporter;

impl ProgressReporter for NoOpProgressReporter {
    fn start(&self, _stage: ProcessingStage, _total: usize) {}

    fn report_progress(&self, _update: &ProgressUpdate) {}

    fn finish(&self, _stage: ProcessingStage, _completed: usize, _failed: usize, _elapsed_ms: u64) {}
}

/// Progress reporter that writes `tracing` events
#[derive(Debug)]
pub struct ConsoleProgressReporter {
    verbose: bool,
}

impl ConsoleProgressReporter {
    /// Create a new console progress reporter
    ///
    /// Per-item lines are only emitted when `verbose` is set.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl ProgressReporter for ConsoleProgressReporter {
    fn start(&self, stage: ProcessingStage, total: usize) {
        info!(total, "{}", stage.description());
    }

    fn report_progress(&self, update: &ProgressUpdate) {
        if self.verbose {
            info!(
                "[{}%] {}/{} {} ({}ms elapsed)",
                update.percentage(),
                update.completed,
                update.total,
                update.item,
                update.elapsed_ms
            );
        }
    }

    fn finish(&self, stage: ProcessingStage, completed: usize, failed: usize, elapsed_ms: u64) {
        info!(completed, failed, elapsed_ms, "{} finished", stage.description());
    }
}

/// Progress tracker that manages timing and progress reporting
pub struct ProgressTracker {
    reporter: Box<dyn ProgressReporter>,
    stage: ProcessingStage,
    start_time: Instant,
    total: usize,
    completed: usize,
    failed: usize,
}

impl ProgressTracker {
    /// Start tracking `total` items of `stage`
    #[must_use]
    pub fn new(reporter: Box<dyn ProgressReporter>, stage: ProcessingStage, total: usize) -> Self {
        reporter.start(stage, total);
        Self {
            reporter,
            stage,
            start_time: Instant::now(),
            total,
            completed: 0,
            failed: 0,
        }
    }

    /// Tracker that reports nothing
    #[must_use]
    pub fn no_op(stage: ProcessingStage, total: usize) -> Self {
        Self::new(Box::new(NoOpProgressReporter), stage, total)
    }

    /// Record one finished item
    pub fn item_done(&mut self, item: &str, ok: bool) {
        self.completed += 1;
        if !ok {
            self.failed += 1;
        }
        let elapsed_ms = self.elapsed_ms();
        let remaining = self.total.saturating_sub(self.completed) as u64;
        let eta_ms = (self.completed > 0).then(|| elapsed_ms / self.completed as u64 * remaining);

        self.reporter.report_progress(&ProgressUpdate {
            stage: self.stage,
            completed: self.completed,
            total: self.total,
            failed: self.failed,
            item: item.to_string(),
            elapsed_ms,
            eta_ms,
        });
    }

    /// Report completion
    pub fn finish(&self) {
        self.reporter
            .finish(self.stage, self.completed, self.failed, self.elapsed_ms());
    }

    /// Get the elapsed time since tracking started
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed
    }
}

impl std::fmt::Debug for ProgressTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressTracker")
            .field("stage", &self.stage)
            .field("total", &self.total)
            .field("completed", &self.completed)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Default, Clone)]
    struct RecordingReporter {
        updates: Arc<Mutex<Vec<ProgressUpdate>>>,
        finished: Arc<Mutex<Option<(usize, usize)>>>,
    }

    impl ProgressReporter for RecordingReporter {
        fn start(&self, _stage: ProcessingStage, _total: usize) {}

        fn report_progress(&self, update: &ProgressUpdate) {
            self.updates.lock().unwrap().push(update.clone());
        }

        fn finish(&self, _stage: ProcessingStage, completed: usize, failed: usize, _elapsed_ms: u64) {
            *self.finished.lock().unwrap() = Some((completed, failed));
        }
    }

    #[test]
    fn test_tracker_counts_items() {
        let reporter = RecordingReporter::default();
        let mut tracker =
            ProgressTracker::new(Box::new(reporter.clone()), ProcessingStage::Compositing, 3);

        tracker.item_done("cube/darth/blanc/white", true);
        tracker.item_done("cube/darth/blanc/black", false);
        tracker.item_done("cube/darth/negre/white", true);
        tracker.finish();

        let updates = reporter.updates.lock().unwrap();
        assert_eq!(updates.len(), 3);
        assert_eq!(updates[1].failed, 1);
        assert_eq!(updates[2].percentage(), 100);
        assert_eq!(*reporter.finished.lock().unwrap(), Some((3, 1)));
    }

    #[test]
    fn test_percentage_of_empty_stage() {
        let update = ProgressUpdate {
            stage: ProcessingStage::Thumbnails,
            completed: 0,
            total: 0,
            failed: 0,
            item: String::new(),
            elapsed_ms: 0,
            eta_ms: None,
        };
        assert_eq!(update.percentage(), 100);
    }
}
