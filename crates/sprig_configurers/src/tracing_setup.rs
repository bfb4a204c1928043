//! Subscriber installation for container logs.
//!
//! The container reports its lifecycle through `tracing` events and spans:
//! one `post_process` span per hook, `info` events at phase boundaries,
//! `debug` events for registrations and constructions. [`TracingSetup`]
//! installs a `tracing_subscriber` registry that prints them.
//!
//! # Example
//!
//! ```
//! use sprig_configurers::tracing_setup::{TracingFormat, TracingSetup};
//! use tracing::Level;
//!
//! TracingSetup::new()
//!     .with_level(Level::DEBUG)
//!     .with_format(TracingFormat::Compact)
//!     .with_env_filter("sprig_container=debug,sprig_configurers=info")
//!     .init();
//! ```

use serde::{Deserialize, Serialize};
use tracing::{Level, Subscriber};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

// ─────────────────────────────────────────────────────────────────────────────
// TracingFormat
// ─────────────────────────────────────────────────────────────────────────────

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TracingFormat {
    /// Multi-line, human-readable output (default).
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

// ─────────────────────────────────────────────────────────────────────────────
// TracingSetup
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for the global `tracing` subscriber.
///
/// Installing is best effort: if a global subscriber already exists, the
/// existing one stays and [`init`](Self::init) returns `false`.
#[derive(Debug, Clone)]
pub struct TracingSetup {
    level: Level,
    format: TracingFormat,
    /// Directives such as `sprig_container=debug`.
    env_filter: Option<String>,
    span_events: bool,
}

impl Default for TracingSetup {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: TracingFormat::Pretty,
            env_filter: None,
            span_events: false,
        }
    }
}

impl TracingSetup {
    /// Info level, pretty output, no span events.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum level used when no filter directives are given.
    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Sets the output format.
    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets filter directives (`target=level,...`). Invalid directives fall
    /// back to the configured level.
    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Prints span open/close events, which shows each hook's duration.
    #[must_use]
    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// The configured level.
    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    /// The configured format.
    #[must_use]
    pub fn format(&self) -> TracingFormat {
        self.format
    }

    /// Builds the filter, reporting whether the directives were usable.
    fn filter(&self) -> (EnvFilter, bool) {
        match &self.env_filter {
            Some(directives) => match EnvFilter::try_new(directives) {
                Ok(filter) => (filter, true),
                Err(_) => (EnvFilter::new(self.level.as_str()), false),
            },
            None => (EnvFilter::new(self.level.as_str()), true),
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        let span_events = if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let layer = tracing_subscriber::fmt::layer();
        match self.format {
            TracingFormat::Pretty => layer.pretty().with_span_events(span_events).boxed(),
            TracingFormat::Compact => layer.compact().with_span_events(span_events).boxed(),
            TracingFormat::Json => layer.json().with_span_events(span_events).boxed(),
        }
    }

    /// Installs the subscriber globally.
    ///
    /// Returns `false` if another global subscriber was already installed.
    pub fn init(&self) -> bool {
        let (filter, directives_ok) = self.filter();
        let installed = tracing_subscriber::registry()
            .with(filter)
            .with(self.fmt_layer())
            .try_init()
            .is_ok();

        if !directives_ok {
            tracing::warn!(
                directives = ?self.env_filter,
                level = %self.level,
                "invalid filter directives, using level"
            );
        }
        if installed {
            tracing::debug!(level = %self.level, format = ?self.format, "tracing initialized");
        }
        installed
    }
}
