//! Service layer
//!
//! Infrastructure concerns (file I/O, encoding, progress) kept apart from the
//! pixel and planning logic.

pub mod format;
pub mod io;
pub mod progress;

pub use format::OutputFormatHandler;
pub use io::{write_atomic, ImageIOService};
pub use progress::{
    ConsoleProgressReporter, NoOpProgressReporter, ProcessingStage, ProgressReporter,
    ProgressTracker, ProgressUpdate,
};
