//! Ollama API client.
//!
//! Blocking HTTP plumbing for the three capabilities the CLI consumes:
//! text generation, embedding generation, and model dimension lookup.

mod ollama;

pub use ollama::OllamaClient;

use crate::config::OllamaConfig;
use std::time::Duration;

/// Builds a blocking HTTP client with the configured timeouts.
pub(crate) fn build_http_client(config: &OllamaConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build Ollama HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}
