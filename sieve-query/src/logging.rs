//! Logging setup for Sieve.
//!
//! Output is controlled by environment variables:
//!
//! - `SIEVE_DEBUG=true|1|yes` - enable debug logging
//! - `SIEVE_LOG_LEVEL=trace|debug|info|warn|error` - set a specific level
//! - `SIEVE_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! use sieve_query::logging;
//!
//! // Call once at startup; later calls are no-ops.
//! logging::init();
//! ```
//!
//! Library code uses the plain `tracing` macros. [`sieve_debug!`](crate::sieve_debug)
//! logs only when `SIEVE_DEBUG` is set, for messages too chatty for `debug`.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

/// Check whether `SIEVE_DEBUG` enables debug logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var("SIEVE_DEBUG")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

/// The level from `SIEVE_LOG_LEVEL`.
///
/// Falls back to "debug" when `SIEVE_DEBUG` is enabled, otherwise "warn".
pub fn get_log_level() -> &'static str {
    let fallback = if is_debug_enabled() { "debug" } else { "warn" };
    match env::var("SIEVE_LOG_LEVEL") {
        Ok(level) => match level.to_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "info" => "info",
            "warn" => "warn",
            "error" => "error",
            _ => fallback,
        },
        Err(_) => fallback,
    }
}

/// The format from `SIEVE_LOG_FORMAT`, defaulting to "json".
pub fn get_log_format() -> &'static str {
    env::var("SIEVE_LOG_FORMAT")
        .map(|f| match f.to_lowercase().as_str() {
            "pretty" => "pretty",
            "compact" => "compact",
            _ => "json",
        })
        .unwrap_or("json")
}

/// Install the global subscriber.
///
/// Does nothing unless `SIEVE_DEBUG` or `SIEVE_LOG_LEVEL` is set, or when
/// built without the `tracing-subscriber` feature (bring your own
/// subscriber in that case).
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("SIEVE_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "sieve={},sieve_query={},sieve_filters={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level = level, format = get_log_format(), "Sieve logging initialized");
            }
        }
    });
}

/// Log at debug level only when `SIEVE_DEBUG` is enabled.
#[macro_export]
macro_rules! sieve_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}
