//! Logging infrastructure - structured tracing for bridge events
//!
//! Uses `tracing` for structured, contextual logging:
//! - Level and format configurable from the environment or `BridgeConfig`
//! - Zero-cost when disabled
//! - Console or rolling-file output
//!
//! Event helpers use stable targets (`wrapper`, `cache`, `gray`, `transplant`,
//! `generation`, `heap`) so filters like `gcbridge=info,gray=trace` work.

use crate::config::LoggingSection;
use once_cell::sync::OnceCell;
use std::io;
use std::path::Path;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Keeps the non-blocking file writer alive for the life of the process
static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    /// Log file path; console output when `None`
    pub log_path: Option<String>,
    pub json_format: bool,
    /// Show span enter/close events
    pub show_spans: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            log_path: None,
            json_format: false,
            show_spans: false,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        // GCBRIDGE_LOG_LEVEL: trace, debug, info, warn, error
        if let Ok(level) = std::env::var("GCBRIDGE_LOG_LEVEL") {
            config.level = parse_level(&level);
        }

        if let Ok(path) = std::env::var("GCBRIDGE_LOG_FILE") {
            config.log_path = Some(path);
        }

        config.json_format = std::env::var("GCBRIDGE_LOG_JSON").is_ok();
        config.show_spans = std::env::var("GCBRIDGE_LOG_SPANS").is_ok();

        config
    }

    /// Minimal logging for hot collection paths
    pub fn performance() -> Self {
        Self {
            level: Level::ERROR,
            ..Self::default()
        }
    }

    /// Verbose logging with span events
    pub fn debug() -> Self {
        Self {
            level: Level::TRACE,
            log_path: None,
            json_format: false,
            show_spans: true,
        }
    }
}

impl From<&LoggingSection> for LogConfig {
    fn from(section: &LoggingSection) -> Self {
        Self {
            level: parse_level(&section.level),
            json_format: section.json,
            ..Self::default()
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Initialize logging with configuration from the environment
pub fn init() {
    init_with_config(LogConfig::from_env());
}

/// Initialize logging with custom configuration (idempotent)
pub fn init_with_config(config: LogConfig) {
    LOGGER_INITIALIZED.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}", config.level).to_lowercase())
        });

        let span_events = if config.show_spans {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };

        let layer = match &config.log_path {
            Some(path) => {
                let path = Path::new(path);
                let dir = path.parent().unwrap_or_else(|| Path::new("."));
                let file = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "gcbridge.log".to_string());
                let (writer, guard) =
                    tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file));
                let _ = FILE_GUARD.set(guard);
                fmt_layer(writer, &config, span_events)
            }
            None => fmt_layer(io::stdout, &config, span_events),
        };

        // Another subscriber may already own the global slot (test harnesses)
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(layer)
            .try_init();
    });
}

fn fmt_layer<S, W>(
    writer: W,
    config: &LogConfig,
    span_events: FmtSpan,
) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_span_events(span_events)
        .with_target(true)
        .with_thread_ids(cfg!(debug_assertions))
        .with_line_number(cfg!(debug_assertions));

    if config.json_format {
        layer.json().boxed()
    } else {
        layer.boxed()
    }
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

// ============================================================================
// Bridge event helpers
// ============================================================================

/// Log wrapper creation
#[inline]
pub fn log_wrapper_created(native: crate::native::NativeId, domain: crate::heap::DomainId, kind: &str) {
    debug!(
        target: "wrapper",
        native = %native,
        domain = %domain,
        kind,
        "wrapper created"
    );
}

/// Log a cache lookup that returned nothing
#[inline]
pub fn log_cache_miss(native: crate::native::NativeId, domain: crate::heap::DomainId, reason: &str) {
    trace!(
        target: "cache",
        native = %native,
        domain = %domain,
        reason,
        "wrapper cache miss"
    );
}

/// Log the end of a recursive gray walk
#[inline]
pub fn log_gray_walk(visited: usize, unmarked: usize) {
    trace!(
        target: "gray",
        visited,
        unmarked,
        "gray walk complete"
    );
}

/// Log an incremental reference barrier fired in place of an unmark
#[inline]
pub fn log_barrier(index: u32) {
    trace!(target: "gray", cell = index, "incremental reference barrier");
}

/// Log a completed transplant
pub fn log_transplant(from: u32, to: u32, domain: crate::heap::DomainId) {
    debug!(
        target: "transplant",
        from,
        to,
        domain = %domain,
        "object transplanted"
    );
}

/// Log a refused transplant
pub fn log_transplant_failed(object: u32, error: &crate::error::TransplantError) {
    warn!(
        target: "transplant",
        object,
        error = %error,
        "transplant refused, original left untouched"
    );
}

/// Log the start of a collection pass
pub fn log_pass_begin(generation: u64) {
    debug!(target: "generation", generation, "collection pass started");
}

/// Log a sweep of the simulated heap
pub fn log_sweep(reclaimed: usize, live: usize) {
    debug!(
        target: "heap",
        reclaimed,
        live,
        "sweep complete"
    );
}

/// Macro for timing a block of code
///
/// Usage:
/// ```ignore
/// time_block!("operation_name", {
///     // code to time
/// });
/// ```
#[macro_export]
macro_rules! time_block {
    ($name:expr, $block:block) => {{
        let _span = tracing::debug_span!($name).entered();
        let start = std::time::Instant::now();
        let result = $block;
        tracing::debug!(
            operation = $name,
            duration_us = start.elapsed().as_micros() as u64,
            "operation complete"
        );
        result
    }};
}
