//! Logging setup shared by the providers and the CLI.
//!
//! Providers never touch global logger state. Each instance carries its own
//! [`tracing::Span`] and the per-instance log level is turned into an
//! `EnvFilter` directive by whoever installs the subscriber.

use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Crates whose logs are kept at `warn` unless debugging is requested.
const DEPENDENCY_TARGETS: &[&str] = &["reqwest", "hyper", "hyper_util", "h2", "rustls"];

/// Log level selectable per provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Follow the global level.
    #[default]
    Global,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Global,
        LogLevel::Error,
        LogLevel::Warn,
        LogLevel::Info,
        LogLevel::Debug,
        LogLevel::Trace,
    ];

    /// Parse a config value, falling back to `Global` for unknown input.
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ERROR" => LogLevel::Error,
            "WARN" | "WARNING" => LogLevel::Warn,
            "INFO" => LogLevel::Info,
            "DEBUG" => LogLevel::Debug,
            "TRACE" => LogLevel::Trace,
            _ => LogLevel::Global,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Global => "GLOBAL",
            LogLevel::Error => "ERROR",
            LogLevel::Warn => "WARN",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
        }
    }

    fn directive(&self) -> &'static str {
        match self {
            LogLevel::Global | LogLevel::Info => "info",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    fn is_verbose(&self) -> bool {
        matches!(self, LogLevel::Debug | LogLevel::Trace)
    }
}

/// Build the filter directive for a given level.
///
/// The crate itself logs at `level`; HTTP dependencies stay at `warn`
/// unless the level is `DEBUG` or `TRACE`.
pub fn filter_directive(level: LogLevel) -> String {
    let dependency_level = if level.is_verbose() {
        level.directive()
    } else {
        "warn"
    };

    let mut parts = vec![
        "warn".to_string(),
        format!("{}={}", env!("CARGO_CRATE_NAME"), level.directive()),
    ];
    parts.extend(
        DEPENDENCY_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, dependency_level)),
    );
    parts.join(",")
}

/// Install a global fmt subscriber for `level`.
///
/// `RUST_LOG` takes precedence when set. Calling this twice is harmless.
pub fn init(level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Span that scopes all logging of one provider instance.
pub fn provider_span(domain: &str, instance_id: &str) -> Span {
    tracing::info_span!("provider", domain = %domain, instance_id = %instance_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse("WARNING"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("GLOBAL"), LogLevel::Global);
        assert_eq!(LogLevel::parse("nonsense"), LogLevel::Global);
    }

    #[test]
    fn test_dependencies_silenced_unless_debug() {
        let info = filter_directive(LogLevel::Info);
        assert!(info.contains("musicbridge=info"));
        assert!(info.contains("reqwest=warn"));

        let debug = filter_directive(LogLevel::Debug);
        assert!(debug.contains("musicbridge=debug"));
        assert!(debug.contains("reqwest=debug"));
    }

    #[test]
    fn test_directive_is_valid_filter() {
        for level in LogLevel::ALL {
            assert!(EnvFilter::try_new(filter_directive(level)).is_ok());
        }
    }
}
