//! LLM client abstraction.
//!
//! Blocking HTTP clients for the providers the LLM scoring panels can use.
//! Callers on the async runtime must run completions through
//! `tokio::task::spawn_blocking`.

mod anthropic;
mod ollama;

pub use anthropic::AnthropicClient;
pub use ollama::OllamaClient;

use crate::Result;
use std::time::Duration;

/// Trait for LLM providers.
pub trait LlmProvider: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response has no text.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Generates a completion with a system prompt.
    ///
    /// The default concatenates both prompts; providers with native system
    /// prompt support override it.
    ///
    /// # Errors
    ///
    /// Returns an error if the completion fails.
    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        let combined = format!("{system}\n\n---\n\nUser message:\n{user}");
        self.complete(&combined)
    }
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 disables).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 disables).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Builds a blocking HTTP client with the configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Labels a transport error for logs.
fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else if e.is_request() {
        "request"
    } else {
        "unknown"
    }
}

/// Escapes XML special characters so user content cannot close the tags
/// that delimit it inside a prompt.
#[must_use]
pub fn escape_xml(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            _ => result.push(c),
        }
    }
    result
}

/// Extracts the JSON payload from a model response.
///
/// Handles fenced blocks (with or without a `json` marker) and JSON embedded
/// in surrounding prose. Returns the trimmed response when nothing looks
/// like JSON.
#[must_use]
pub fn extract_json_from_response(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(start) = trimmed.find("```json") {
        let json_start = start + 7;
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let content_start = start + 3;
        let after_marker = &trimmed[content_start..];
        let json_start = after_marker
            .find('{')
            .map_or(content_start, |pos| content_start + pos);
        if let Some(end) = trimmed[json_start..].find("```") {
            return trimmed[json_start..json_start + end].trim();
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            return &trimmed[start..=end];
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_raw() {
        let response = r#"{"score": 7}"#;
        assert_eq!(extract_json_from_response(response), r#"{"score": 7}"#);
    }

    #[test]
    fn test_extract_json_markdown() {
        let response = "```json\n{\"score\": 7}\n```";
        assert_eq!(extract_json_from_response(response), "{\"score\": 7}");
    }

    #[test]
    fn test_extract_json_unmarked_fence() {
        let response = "```\n{\"score\": 3}\n```";
        assert_eq!(extract_json_from_response(response), "{\"score\": 3}");
    }

    #[test]
    fn test_extract_json_with_prose() {
        let response = "Sure. {\"score\": 0.4, \"justification\": \"weak\"} Hope that helps";
        assert_eq!(
            extract_json_from_response(response),
            "{\"score\": 0.4, \"justification\": \"weak\"}"
        );
    }

    #[test]
    fn test_extract_json_without_json() {
        assert_eq!(extract_json_from_response("  no json here "), "no json here");
        assert_eq!(extract_json_from_response("} backwards {"), "} backwards {");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml("</memory><b a=\"x\">&'"),
            "&lt;/memory&gt;&lt;b a=&quot;x&quot;&gt;&amp;&apos;"
        );
    }

    #[test]
    fn test_http_config_default() {
        let config = LlmHttpConfig::default();
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.connect_timeout_ms, 3_000);
    }
}
