//! Tracing configuration module for structured logging
//!
//! The library only emits events and spans; the CLI installs the subscriber.
//! Log lines always go to stderr so stdout carries nothing but the JSON report.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TracingFormat {
    /// Human-readable compact output with colors (default for CLI)
    Console,
    /// Compact output without ANSI colors for CI logs
    Compact,
    /// JSON lines
    #[cfg(feature = "tracing-json")]
    Json,
}

/// Tracing configuration builder
#[derive(Debug)]
pub struct TracingConfig {
    /// Verbosity level (`-v` count)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Filter directive string (overrides verbosity if set)
    pub env_filter: Option<String>,
    /// Session ID for correlation
    pub session_id: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            verbosity: 0,
            format: TracingFormat::Console,
            env_filter: None,
            session_id: None,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity level (0-3+)
    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Set a custom filter such as `mockup_pipeline=debug`
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }

    /// Initialize the global subscriber
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match &self.env_filter {
            Some(directives) => EnvFilter::try_new(directives)?,
            None => EnvFilter::try_new(self.verbosity_to_filter())?,
        };

        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false)
                    .with_target(false)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .with_writer(std::io::stderr)
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        if let Some(session_id) = &self.session_id {
            events::session_started(session_id);
        }

        Ok(())
    }
}

/// Initialize tracing with CLI defaults and a fresh session id
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8, filter: Option<&str>, format: TracingFormat) -> anyhow::Result<String> {
    let session_id = uuid::Uuid::new_v4().to_string();

    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_session_id(session_id.clone());
    if let Some(filter) = filter {
        config = config.with_env_filter(filter);
    }
    config.init()?;
    Ok(session_id)
}

/// Span creation helpers for common operations
pub mod spans {
    use crate::config::ThumbnailKind;
    use crate::types::CompositingJob;
    use std::path::Path;
    use tracing::{Level, Span};

    /// Span for one CLI invocation
    pub fn session(session_id: &str, command: &str) -> Span {
        tracing::span!(Level::INFO, "session", session_id = %session_id, command = %command)
    }

    /// Span for a batch run
    pub fn batch(job_count: usize, dry_run: bool) -> Span {
        tracing::span!(Level::INFO, "batch", job_count, dry_run)
    }

    /// Span for one compositing job
    pub fn job(job: &CompositingJob) -> Span {
        tracing::span!(
            Level::DEBUG,
            "job",
            collection = %job.collection,
            design = %job.design,
            ink = %job.ink,
            color = %job.color
        )
    }

    /// Span for background segmentation of one file
    pub fn segmentation(input: &Path) -> Span {
        tracing::span!(Level::INFO, "segmentation", input = %input.display())
    }

    /// Span for a thumbnail normalizer run
    pub fn thumbnails(kind: ThumbnailKind, root: &Path) -> Span {
        tracing::span!(Level::INFO, "thumbnails", kind = %kind, root = %root.display())
    }

    /// Span for filesystem reconciliation
    pub fn reconcile(operation: &str, root: &Path) -> Span {
        tracing::span!(Level::INFO, "reconcile", operation = %operation, root = %root.display())
    }
}

/// Event helpers for common logging patterns
pub mod events {
    use std::path::Path;
    use tracing::{debug, info, warn};

    pub fn session_started(session_id: &str) {
        info!(session_id = %session_id, "Mockup pipeline session started");
    }

    /// A per-item failure that was recorded and did not abort the run
    pub fn soft_failure(item: &str, error: &str) {
        warn!(item = %item, error = %error, "Item failed, continuing");
    }

    /// Size change of a re-encoded file
    pub fn byte_delta(path: &Path, before: u64, after: Option<u64>) {
        match after {
            Some(after) => debug!(
                path = %path.display(),
                before,
                after,
                delta = after as i64 - before as i64,
                "Re-encoded"
            ),
            None => debug!(path = %path.display(), before, "Would re-encode"),
        }
    }
}
