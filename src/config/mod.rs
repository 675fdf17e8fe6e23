//! Configuration management.
//!
//! Settings come from, in increasing precedence: built-in defaults, one TOML
//! file, then `MNEMOS_*` environment variables. The file is the first that
//! exists of:
//!
//! 1. The `--config` path
//! 2. `MNEMOS_CONFIG_PATH`
//! 3. Platform config dir (`~/Library/Application Support/mnemos/` on macOS)
//! 4. `~/.config/mnemos/config.toml`
//!
//! An explicitly named file that is missing or malformed is an error. A
//! malformed file found by discovery is logged and skipped.

use crate::filter::FilterConfig;
use crate::llm::LlmHttpConfig;
use crate::review::ScorerResilienceConfig;
use crate::services::{DEFAULT_STORE_THRESHOLD, RetrievalConfig};
use crate::models::{DEFAULT_RETRIEVE_LIMIT, DEFAULT_SIMILARITY_THRESHOLD};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the database file inside the data directory.
pub const DATABASE_FILE: &str = "mnemos.db";

/// Main configuration for mnemos.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MnemosConfig {
    /// Directory holding the database.
    pub data_dir: PathBuf,
    /// Storage acceptance.
    pub consensus: ConsensusSettings,
    /// Retrieval defaults and tuning.
    pub retrieval: RetrievalSettings,
    /// Trivial filter thresholds.
    pub filter: FilterConfig,
    /// Which scoring panels to use and how to guard them.
    pub scorers: ScorerSettings,
    /// LLM provider for the LLM panels.
    pub llm: LlmConfig,
    /// Log output.
    pub logging: LoggingSettings,
    /// Prometheus exporter.
    pub metrics: MetricsSettings,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Storage acceptance settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsensusSettings {
    /// Minimum consensus score for a draft to be stored.
    pub threshold: f64,
}

impl Default for ConsensusSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_STORE_THRESHOLD,
        }
    }
}

/// Retrieval settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RetrievalSettings {
    /// Result count when the caller gives none.
    pub default_limit: usize,
    /// Candidates fetched per requested result.
    pub overfetch_factor: usize,
    /// Dedup threshold when the caller asks for dedup without one.
    pub similarity_threshold: f64,
    /// Relevance calls allowed in flight.
    pub max_concurrent_scoring: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        let tuning = RetrievalConfig::default();
        Self {
            default_limit: DEFAULT_RETRIEVE_LIMIT,
            overfetch_factor: tuning.overfetch_factor,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_concurrent_scoring: tuning.max_concurrent_scoring,
        }
    }
}

impl RetrievalSettings {
    /// Pipeline tuning.
    #[must_use]
    pub const fn pipeline_config(&self) -> RetrievalConfig {
        RetrievalConfig {
            overfetch_factor: self.overfetch_factor,
            max_concurrent_scoring: self.max_concurrent_scoring,
        }
    }
}

/// Scoring panel implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScorerBackend {
    /// Local rule-based scorers.
    #[default]
    Heuristic,
    /// LLM reviewers.
    Llm,
}

impl ScorerBackend {
    /// Parses a backend name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" | "local" => Some(Self::Heuristic),
            "llm" => Some(Self::Llm),
            _ => None,
        }
    }
}

/// Scorer selection and resilience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScorerSettings {
    /// Which panels to build.
    pub backend: ScorerBackend,
    /// Per-call deadline in milliseconds.
    pub timeout_ms: u64,
    /// Consecutive failures before a scorer's circuit opens.
    pub breaker_failure_threshold: u32,
    /// How long an open circuit waits before a trial call, in milliseconds.
    pub breaker_reset_ms: u64,
}

impl Default for ScorerSettings {
    fn default() -> Self {
        let resilience = ScorerResilienceConfig::default();
        Self {
            backend: ScorerBackend::default(),
            timeout_ms: duration_ms(resilience.timeout),
            breaker_failure_threshold: resilience.breaker_failure_threshold,
            breaker_reset_ms: duration_ms(resilience.breaker_reset),
        }
    }
}

impl ScorerSettings {
    /// Resilience wrapper settings.
    #[must_use]
    pub fn resilience(&self) -> ScorerResilienceConfig {
        ScorerResilienceConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            breaker_failure_threshold: self.breaker_failure_threshold,
            breaker_reset: Duration::from_millis(self.breaker_reset_ms),
            ..ScorerResilienceConfig::default()
        }
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// LLM provider selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// Anthropic Messages API.
    #[default]
    Anthropic,
    /// Local Ollama server.
    Ollama,
}

impl LlmProviderKind {
    /// Parses a provider name, defaulting to Anthropic.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "ollama" | "local" => Self::Ollama,
            _ => Self::Anthropic,
        }
    }
}

/// LLM configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LlmConfig {
    /// Provider to use.
    pub provider: LlmProviderKind,
    /// Model override.
    pub model: Option<String>,
    /// API key override; providers fall back to their own env vars.
    pub api_key: Option<String>,
    /// Endpoint override.
    pub base_url: Option<String>,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let http = LlmHttpConfig::default();
        Self {
            provider: LlmProviderKind::default(),
            model: None,
            api_key: None,
            base_url: None,
            timeout_ms: http.timeout_ms,
            connect_timeout_ms: http.connect_timeout_ms,
        }
    }
}

impl LlmConfig {
    /// HTTP timeouts for the provider client.
    #[must_use]
    pub const fn http_config(&self) -> LlmHttpConfig {
        LlmHttpConfig {
            timeout_ms: self.timeout_ms,
            connect_timeout_ms: self.connect_timeout_ms,
        }
    }
}

/// Logging settings as written in the file; resolved by observability.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// `EnvFilter` directive.
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    pub file: Option<PathBuf>,
}

/// Prometheus exporter settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSettings {
    /// Whether to install the exporter.
    pub enabled: bool,
    /// HTTP listener port.
    pub port: u16,
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 9090,
        }
    }
}

impl Default for MnemosConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            consensus: ConsensusSettings::default(),
            retrieval: RetrievalSettings::default(),
            filter: FilterConfig::default(),
            scorers: ScorerSettings::default(),
            llm: LlmConfig::default(),
            logging: LoggingSettings::default(),
            metrics: MetricsSettings::default(),
            source: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".mnemos"),
        |dirs| dirs.data_local_dir().join("mnemos"),
    )
}

/// Configuration file as it appears on disk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// `[consensus]`.
    pub consensus: Option<ConfigFileConsensus>,
    /// `[retrieval]`.
    pub retrieval: Option<ConfigFileRetrieval>,
    /// `[filter]`.
    pub filter: Option<ConfigFileFilter>,
    /// `[scorers]`.
    pub scorers: Option<ConfigFileScorers>,
    /// `[llm]`.
    pub llm: Option<ConfigFileLlm>,
    /// `[logging]`.
    pub logging: Option<ConfigFileLogging>,
    /// `[metrics]`.
    pub metrics: Option<ConfigFileMetrics>,
}

/// `[consensus]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileConsensus {
    /// Acceptance threshold.
    pub threshold: Option<f64>,
}

/// `[retrieval]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileRetrieval {
    /// Default result count.
    pub default_limit: Option<usize>,
    /// Candidate over-fetch multiplier.
    pub overfetch_factor: Option<usize>,
    /// Default dedup threshold.
    pub similarity_threshold: Option<f64>,
    /// Concurrent relevance calls.
    pub max_concurrent_scoring: Option<usize>,
}

/// `[filter]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileFilter {
    /// Minimum trimmed length.
    pub min_chars: Option<usize>,
    /// Minimum alphabetic words.
    pub min_words: Option<usize>,
    /// Rejection cache size.
    pub rejection_cache_capacity: Option<usize>,
    /// Rejection memory in seconds.
    pub rejection_ttl_secs: Option<u64>,
}

/// `[scorers]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileScorers {
    /// `heuristic` or `llm`.
    pub backend: Option<String>,
    /// Per-call deadline.
    pub timeout_ms: Option<u64>,
    /// Failures before the circuit opens.
    pub breaker_failure_threshold: Option<u32>,
    /// Open-circuit wait.
    pub breaker_reset_ms: Option<u64>,
}

/// `[llm]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Endpoint.
    pub base_url: Option<String>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
}

/// `[logging]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileLogging {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Filter directive.
    pub filter: Option<String>,
    /// Log file.
    pub file: Option<String>,
}

/// `[metrics]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFileMetrics {
    /// Install the exporter.
    pub enabled: Option<bool>,
    /// Listener port.
    pub port: Option<u16>,
}

impl MnemosConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        Self::load_with_env(explicit, |key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` for environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicitly named file cannot be read or parsed.
    pub fn load_with_env(
        explicit: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let named = explicit
            .map(Path::to_path_buf)
            .or_else(|| non_empty(lookup("MNEMOS_CONFIG_PATH")).map(PathBuf::from));

        let mut config = match named {
            Some(path) => Self::load_from_file(&path)?,
            None => Self::discover(),
        };
        config.apply_env(&lookup);
        Ok(config)
    }

    /// Loads configuration from a file path, without env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parses TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid config file.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Self::from_config_file(file)
    }

    fn discover() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default();
        };

        let candidates = [
            base_dirs.config_dir().join("mnemos").join("config.toml"),
            base_dirs
                .home_dir()
                .join(".config")
                .join("mnemos")
                .join("config.toml"),
        ];

        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Skipping config file"),
            }
        }

        Self::default()
    }

    fn from_config_file(file: ConfigFile) -> Result<Self> {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = expand_home(&data_dir);
        }
        if let Some(consensus) = file.consensus {
            if let Some(v) = consensus.threshold {
                config.consensus.threshold = v;
            }
        }
        if let Some(retrieval) = file.retrieval {
            if let Some(v) = retrieval.default_limit {
                config.retrieval.default_limit = v;
            }
            if let Some(v) = retrieval.overfetch_factor {
                config.retrieval.overfetch_factor = v;
            }
            if let Some(v) = retrieval.similarity_threshold {
                config.retrieval.similarity_threshold = v;
            }
            if let Some(v) = retrieval.max_concurrent_scoring {
                config.retrieval.max_concurrent_scoring = v;
            }
        }
        if let Some(filter) = file.filter {
            if let Some(v) = filter.min_chars {
                config.filter.min_chars = v;
            }
            if let Some(v) = filter.min_words {
                config.filter.min_words = v;
            }
            if let Some(v) = filter.rejection_cache_capacity {
                config.filter.rejection_cache_capacity = v;
            }
            if let Some(v) = filter.rejection_ttl_secs {
                config.filter.rejection_ttl = Duration::from_secs(v);
            }
        }
        if let Some(scorers) = file.scorers {
            if let Some(backend) = scorers.backend {
                config.scorers.backend = ScorerBackend::parse(&backend).ok_or_else(|| {
                    Error::InvalidInput(format!("unknown scorer backend '{backend}'"))
                })?;
            }
            if let Some(v) = scorers.timeout_ms {
                config.scorers.timeout_ms = v;
            }
            if let Some(v) = scorers.breaker_failure_threshold {
                config.scorers.breaker_failure_threshold = v;
            }
            if let Some(v) = scorers.breaker_reset_ms {
                config.scorers.breaker_reset_ms = v;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProviderKind::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key;
            config.llm.base_url = llm.base_url;
            if let Some(v) = llm.timeout_ms {
                config.llm.timeout_ms = v;
            }
            if let Some(v) = llm.connect_timeout_ms {
                config.llm.connect_timeout_ms = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging.format = logging.format;
            config.logging.filter = logging.filter;
            config.logging.file = logging.file.as_deref().map(expand_home);
        }
        if let Some(metrics) = file.metrics {
            if let Some(v) = metrics.enabled {
                config.metrics.enabled = v;
            }
            if let Some(v) = metrics.port {
                config.metrics.port = v;
            }
        }

        Ok(config)
    }

    /// Applies `MNEMOS_*` overrides. Unparsable values are ignored.
    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) {
        let get = |key: &str| non_empty(lookup(key));

        if let Some(v) = get("MNEMOS_DATA_DIR") {
            self.data_dir = expand_home(&v);
        }
        if let Some(v) = get("MNEMOS_CONSENSUS_THRESHOLD").and_then(|v| v.parse().ok()) {
            self.consensus.threshold = v;
        }
        if let Some(v) = get("MNEMOS_SCORER_BACKEND").and_then(|v| ScorerBackend::parse(&v)) {
            self.scorers.backend = v;
        }
        if let Some(v) = get("MNEMOS_SCORER_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.scorers.timeout_ms = v;
        }
        if let Some(v) = get("MNEMOS_LLM_PROVIDER") {
            self.llm.provider = LlmProviderKind::parse(&v);
        }
        if let Some(v) = get("MNEMOS_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("MNEMOS_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = get("MNEMOS_LOG_FORMAT") {
            self.logging.format = Some(v);
        }
        if let Some(v) = get("MNEMOS_LOG_FILTER") {
            self.logging.filter = Some(v);
        }
        if let Some(v) = get("MNEMOS_LOG_FILE") {
            self.logging.file = Some(expand_home(&v));
        }
        if let Some(v) = get("MNEMOS_METRICS_ENABLED") {
            self.metrics.enabled = parse_bool(&v);
        }
        if let Some(v) = get("MNEMOS_METRICS_PORT").and_then(|v| v.parse().ok()) {
            self.metrics.port = v;
        }
    }

    /// Copy with secrets masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.llm.api_key.is_some() {
            config.llm.api_key = Some("***".to_string());
        }
        config
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::OperationFailed {
            operation: "serialize_config".to_string(),
            cause: e.to_string(),
        })
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = directories::BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
