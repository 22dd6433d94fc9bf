//! Configuration management.
//!
//! Components receive explicit configuration values at construction time;
//! environment overrides (`OLLAMA_HOST`, `OLLAMA_MODEL`) are applied only
//! at the CLI edge, never read from inside a component.

use std::path::PathBuf;

/// Default filename for the embedding database, relative to the working
/// directory.
pub const DB_FILENAME: &str = ".git-llama.db";

/// Ollama server configuration.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Server endpoint, e.g. `http://localhost:11434`.
    pub endpoint: String,
    /// Model used for both generation and embeddings.
    pub model: String,
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl OllamaConfig {
    /// Default server endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:11434";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "llama3.2";

    /// Sets the server endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            timeout_ms: 30_000,
            connect_timeout_ms: 3_000,
        }
    }
}

/// Resolves the database path: `.git-llama.db` in the working directory.
#[must_use]
pub fn default_db_path() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(DB_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = OllamaConfig::default();
        assert_eq!(config.endpoint, "http://localhost:11434");
        assert_eq!(config.model, "llama3.2");
    }

    #[test]
    fn test_builders() {
        let config = OllamaConfig::default()
            .with_endpoint("http://10.0.0.2:11434")
            .with_model("qwen2.5");
        assert_eq!(config.endpoint, "http://10.0.0.2:11434");
        assert_eq!(config.model, "qwen2.5");
    }

    #[test]
    fn test_default_db_path_ends_with_filename() {
        assert!(default_db_path().ends_with(DB_FILENAME));
    }
}
