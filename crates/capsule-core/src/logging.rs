//! Structured logging for processes hosting a capsule store
//!
//! The store itself only emits `tracing` events and spans: mutations open an
//! `#[instrument]` span carrying the capsule id or filter, and hot paths emit
//! [`trace_time!`] events. A host installs a subscriber once with [`init`] or
//! the flag-shaped [`init_tracing`].

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable that overrides the computed log filter
pub const LOG_ENV_VAR: &str = "CAPSULE_LOG";

const CRATE_TARGET: &str = "capsule_core";

/// Emit a trace event with the elapsed time of a store operation.
///
/// ```rust,ignore
/// let start = Instant::now();
/// trace_time!(start, "search", total = total, rows = items.len());
/// ```
#[macro_export]
macro_rules! trace_time {
    ($start:expr, $operation:expr $(, $field:ident = $value:expr)* $(,)?) => {
        tracing::trace!(
            operation = $operation,
            elapsed_ms = $start.elapsed().as_secs_f64() * 1000.0,
            $($field = $value,)*
            "store operation timed"
        );
    };
}

/// Output encoding for log lines on stderr
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

/// Subscriber settings chosen by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// `EnvFilter` directive, used unless `CAPSULE_LOG` is set
    pub directive: String,
    pub format: LogFormat,
    /// Log when each store operation span closes, with its busy and idle time
    pub span_timing: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self::from_flags(false, None)
    }
}

impl LogOptions {
    /// Options from the usual `--verbose` / `--log-level` pair. An explicit
    /// level wins over `verbose`.
    pub fn from_flags(verbose: bool, log_level: Option<&str>) -> Self {
        let directive = match (verbose, log_level) {
            (_, Some(level)) => directive_for(level),
            (true, None) => directive_for("debug"),
            (false, None) => directive_for("warn"),
        };
        Self {
            directive,
            format: LogFormat::Compact,
            span_timing: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_span_timing(mut self, span_timing: bool) -> Self {
        self.span_timing = span_timing;
        self
    }
}

/// Expand a bare level (`debug`) to this crate's target. Full directives
/// (`capsule_core=trace,rusqlite=warn`) pass through unchanged.
pub fn directive_for(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("{}={}", CRATE_TARGET, level)
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(options: &LogOptions) -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .or_else(|_| EnvFilter::try_new(&options.directive))?;
    let spans = if options.span_timing {
        FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let registry = tracing_subscriber::registry().with(filter);
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_span_events(spans);

    match options.format {
        LogFormat::Json => registry.with(layer.json()).try_init()?,
        LogFormat::Compact => registry.with(layer.compact().with_target(false)).try_init()?,
    }

    Ok(())
}

/// Install the global subscriber from command-line style flags
pub fn init_tracing(
    verbose: bool,
    log_level: Option<&str>,
    log_json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = if log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    init(&LogOptions::from_flags(verbose, log_level).with_format(format))
}
