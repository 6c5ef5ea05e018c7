//! Structured logging utilities for Stowage
//!
//! All logs go to stderr so stdout stays free for workflow commands
//! (`::set-output`, `::error::`) and command output.
//!
//! # Log Format Conventions
//!
//! - `operation`: The protocol step ("restore", "compute", "save")
//! - `status`: The result status ("hit", "miss", "success", "exists", "error")
//! - `store`: The backend name ("local", "github-actions")
//! - `key`: The cache key involved (exact key, or the matched key on a hit)
//!
//! # Examples
//!
//! ```rust
//! use tracing::info;
//!
//! info!(
//!     operation = "restore",
//!     status = "hit",
//!     store = "local",
//!     key = "Linux-psmodules-0A1B",
//!     "Cache hit"
//! );
//! ```

use std::io::{self, IsTerminal};
use std::fmt as std_fmt;
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Formatter printing `<timestamp> LEVEL(stowage): fields message`
struct StowageFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for StowageFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:5}(stowage)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(stowage): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, for interactive terminals
    Pretty,
    /// Plain text, the default on CI runners
    Compact,
    /// JSON lines, for log aggregation systems
    Json,
}

impl LogFormat {
    /// Resolve from `STOWAGE_LOG_FORMAT`, defaulting by the `CI` variable
    pub fn from_env() -> Self {
        Self::resolve(
            std::env::var("STOWAGE_LOG_FORMAT").ok().as_deref(),
            std::env::var("CI").is_ok(),
        )
    }

    pub fn resolve(requested: Option<&str>, ci: bool) -> Self {
        match requested.map(str::to_lowercase).as_deref() {
            Some("json") => Self::Json,
            Some("compact") => Self::Compact,
            Some("pretty") => Self::Pretty,
            _ if ci => Self::Compact,
            _ => Self::Pretty,
        }
    }
}

/// Initialize the global tracing subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: Set log level (e.g., "debug", "info", "warn")
/// - `STOWAGE_LOG_FORMAT`: Set format ("pretty", "compact", "json")
/// - `CI`: If set, defaults to compact format
///
/// # Examples
///
/// ```bash
/// # Pretty format with debug logs
/// RUST_LOG=debug stowage gitversion
///
/// # JSON format for log aggregation
/// STOWAGE_LOG_FORMAT=json stowage install-modules
///
/// # Compact format in CI
/// CI=true stowage key Linux dotnet tools
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .init(),
        format => {
            let with_ansi = format == LogFormat::Pretty && io::stderr().is_terminal();
            registry
                .with(
                    fmt::layer()
                        .event_format(StowageFormatter { with_ansi })
                        .with_writer(io::stderr),
                )
                .init()
        }
    }
}

/// Operation names for consistent logging
pub mod operations {
    pub const RESTORE: &str = "restore";
    pub const COMPUTE: &str = "compute";
    pub const SAVE: &str = "save";
}

/// Status values for consistent logging
pub mod status {
    pub const HIT: &str = "hit";
    pub const MISS: &str = "miss";
    pub const SUCCESS: &str = "success";
    pub const EXISTS: &str = "exists";
    pub const ERROR: &str = "error";
}
