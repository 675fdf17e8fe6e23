//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Filter used when nothing is configured.
pub const DEFAULT_FILTER: &str = "mnemos=info,warn";

/// Filter used with `--verbose`.
pub const VERBOSE_FILTER: &str = "mnemos=debug,info";

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable, multi-line.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    /// Parses a format name, defaulting to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    /// Line format.
    pub format: LogFormat,
    /// Level filter.
    pub filter: EnvFilter,
    /// Append to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl LoggingConfig {
    /// Resolves settings. Precedence for the filter: configured directive,
    /// then `rust_log`, then the verbose or default directive.
    ///
    /// An unparsable directive falls back to the default.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool, rust_log: Option<&str>) -> Self {
        let fallback = if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
        let directive = settings
            .filter
            .as_deref()
            .or(rust_log)
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(fallback);
        let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new(fallback));

        Self {
            format: settings.format.as_deref().map(LogFormat::parse).unwrap_or_default(),
            filter,
            file: settings.file.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(LogFormat::parse("JSON"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("xml"), LogFormat::Pretty);
    }

    #[test]
    fn test_filter_precedence() {
        let settings = LoggingSettings {
            filter: Some("mnemos=trace".to_string()),
            ..LoggingSettings::default()
        };
        let config = LoggingConfig::from_settings(&settings, true, Some("error"));
        assert_eq!(config.filter.to_string(), "mnemos=trace");

        let config = LoggingConfig::from_settings(&LoggingSettings::default(), false, Some("error"));
        assert_eq!(config.filter.to_string(), "error");

        let config = LoggingConfig::from_settings(&LoggingSettings::default(), true, None);
        assert!(config.filter.to_string().contains("mnemos=debug"));
    }

    #[test]
    fn test_bad_directive_falls_back() {
        let settings = LoggingSettings {
            filter: Some("mnemos=loud".to_string()),
            format: Some("json".to_string()),
            file: None,
        };
        let config = LoggingConfig::from_settings(&settings, false, None);
        assert_eq!(config.format, LogFormat::Json);
        assert!(config.filter.to_string().contains("mnemos=info"));
    }
}
