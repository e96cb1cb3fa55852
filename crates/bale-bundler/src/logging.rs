//! Logging utilities for bale-bundler
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: bale emits tracing events - install your own subscriber.
//! For application developers: use these convenience functions.
//!
//! The chosen level applies to bale's own crates; every other crate only
//! reports warnings and errors unless `RUST_LOG` says otherwise.

use std::sync::Once;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Crates whose events follow the chosen level.
const BALE_CRATES: &[&str] = &["bale_graph", "bale_bundler"];

/// Log level for bale output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// No logging output
    Silent,
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Errors, warnings, and info (default)
    #[default]
    Info,
    /// Adds per-target and per-graph progress
    Debug,
    /// Everything, including per-module analysis
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    fn as_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Silent => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Filter directives: bale crates at this level, the rest capped at `warn`.
    fn directives(&self) -> String {
        let others = self.as_level_filter().min(LevelFilter::WARN);
        let mut directives = vec![others.to_string().to_lowercase()];
        directives.extend(
            BALE_CRATES
                .iter()
                .map(|krate| format!("{krate}={}", self.as_str())),
        );
        directives.join(",")
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn install(filter: EnvFilter) {
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false).without_time())
        .init();
}

/// Initialize bale logging with specified level
///
/// A set `RUST_LOG` replaces the level-derived directives.
///
/// # Thread Safety
///
/// This function installs a global subscriber and should only be called once
/// per process. It is safe to call from multiple threads - only the first
/// call will take effect.
///
/// # Example
///
/// ```rust,no_run
/// use bale_bundler::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Info);
/// ```
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(level.directives()));
        install(filter);
    });
}

/// Initialize logging from RUST_LOG environment variable
///
/// Falls back to Info level if RUST_LOG is not set or invalid.
///
/// # Example
///
/// ```rust,no_run
/// use bale_bundler::logging::init_logging_from_env;
///
/// init_logging_from_env();
/// ```
pub fn init_logging_from_env() {
    init_logging(LogLevel::Info);
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [LogLevel; 6] = [
        LogLevel::Silent,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("silent".parse::<LogLevel>().unwrap(), LogLevel::Silent);
        assert_eq!("INFO".parse::<LogLevel>().unwrap(), LogLevel::Info);
        assert!("verbose".parse::<LogLevel>().is_err());
        for level in ALL {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
    }

    #[test]
    fn test_level_filters() {
        let filters: Vec<LevelFilter> = ALL.iter().map(LogLevel::as_level_filter).collect();
        assert_eq!(
            filters,
            vec![
                LevelFilter::OFF,
                LevelFilter::ERROR,
                LevelFilter::WARN,
                LevelFilter::INFO,
                LevelFilter::DEBUG,
                LevelFilter::TRACE,
            ]
        );
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_directives_scope_the_level_to_bale() {
        assert_eq!(
            LogLevel::Debug.directives(),
            "warn,bale_graph=debug,bale_bundler=debug"
        );
        assert_eq!(
            LogLevel::Error.directives(),
            "error,bale_graph=error,bale_bundler=error"
        );
        assert_eq!(LogLevel::Silent.directives(), "off,bale_graph=off,bale_bundler=off");
        for level in ALL {
            assert!(level.directives().parse::<EnvFilter>().is_ok());
        }
    }
}
