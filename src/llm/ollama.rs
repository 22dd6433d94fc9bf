//! Ollama (local) client.

use super::build_http_client;
use crate::config::OllamaConfig;
use crate::vector::Vector;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Ollama local LLM client.
///
/// Wraps the `/api/generate`, `/api/embed`, and `/api/show` endpoints.
/// No retry policy: a failed request surfaces to the caller.
pub struct OllamaClient {
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl OllamaClient {
    /// Creates a new client from explicit configuration.
    #[must_use]
    pub fn new(config: &OllamaConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            client: build_http_client(config),
        }
    }

    /// Returns the model this client targets.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Checks if the Ollama server is reachable.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.client
            .get(format!("{}/api/tags", self.endpoint))
            .send()
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    /// Generates a response for the given prompt.
    ///
    /// Backticks are stripped from the response, since models fence
    /// commands in them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the request fails or the
    /// response cannot be parsed.
    pub fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response: GenerateResponse =
            self.post_json("/api/generate", "ollama_generate", &request)?;

        Ok(response.response.replace('`', ""))
    }

    /// Generates an embedding vector for the given text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the request fails or the API
    /// returns no embedding.
    pub fn embed(&self, text: &str) -> Result<Vector> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };

        let mut response: EmbedResponse = self.post_json("/api/embed", "ollama_embed", &request)?;

        if response.embeddings.is_empty() {
            return Err(Error::OperationFailed {
                operation: "ollama_embed".to_string(),
                cause: "API returned no embeddings".to_string(),
            });
        }
        Ok(Vector::new(response.embeddings.swap_remove(0)))
    }

    /// Looks up the embedding dimensionality of the model.
    ///
    /// Reads the `<family>.embedding_length` entry from the model info
    /// returned by `/api/show`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::OperationFailed`] if the request fails or the
    /// model info carries no embedding length.
    pub fn model_dimension(&self) -> Result<usize> {
        let request = ShowRequest {
            model: self.model.clone(),
        };

        let response: ShowResponse = self.post_json("/api/show", "ollama_show", &request)?;

        response
            .model_info
            .iter()
            .find(|(key, _)| key.ends_with(".embedding_length"))
            .and_then(|(_, value)| value.as_u64())
            .and_then(|dim| usize::try_from(dim).ok())
            .ok_or_else(|| Error::OperationFailed {
                operation: "ollama_show".to_string(),
                cause: format!("model '{}' reports no embedding length", self.model),
            })
    }

    /// Posts a JSON request and parses the JSON response.
    fn post_json<Req, Resp>(&self, path: &str, operation: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize,
        Resp: serde::de::DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{path}", self.endpoint))
            .json(request)
            .send()
            .map_err(|e| {
                let error_kind = if e.is_timeout() {
                    "timeout"
                } else if e.is_connect() {
                    "connect"
                } else if e.is_request() {
                    "request"
                } else {
                    "unknown"
                };
                tracing::error!(
                    model = %self.model,
                    error = %e,
                    error_kind = error_kind,
                    "Ollama request failed"
                );
                Error::OperationFailed {
                    operation: operation.to_string(),
                    cause: format!("{error_kind} error: {e}"),
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                model = %self.model,
                status = %status,
                body = %body,
                "Ollama API returned error status"
            );
            return Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: format!("API returned status: {status} - {body}"),
            });
        }

        response.json().map_err(|e| {
            tracing::error!(model = %self.model, error = %e, "Failed to parse Ollama response");
            Error::OperationFailed {
                operation: operation.to_string(),
                cause: e.to_string(),
            }
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: String,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct ShowRequest {
    model: String,
}

#[derive(Deserialize)]
struct ShowResponse {
    #[serde(default)]
    model_info: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OllamaConfig;

    #[test]
    fn test_client_carries_configured_model() {
        let config = OllamaConfig::default().with_model("qwen2.5");
        let client = OllamaClient::new(&config);
        assert_eq!(client.model(), "qwen2.5");
    }

    #[test]
    fn test_embed_response_shape() {
        let json = r#"{"model":"llama3.2","embeddings":[[0.1,0.2,0.3]]}"#;
        let response: EmbedResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.embeddings[0].len(), 3);
    }

    #[test]
    fn test_show_response_embedding_length_lookup() {
        let json = r#"{"model_info":{"general.architecture":"llama","llama.embedding_length":3072}}"#;
        let response: ShowResponse = serde_json::from_str(json).unwrap();
        let dim = response
            .model_info
            .iter()
            .find(|(key, _)| key.ends_with(".embedding_length"))
            .and_then(|(_, value)| value.as_u64());
        assert_eq!(dim, Some(3072));
    }

    #[test]
    fn test_show_response_without_model_info() {
        let response: ShowResponse = serde_json::from_str("{}").unwrap();
        assert!(response.model_info.is_empty());
    }

    #[test]
    fn test_generate_request_serialization() {
        let request = GenerateRequest {
            model: "llama3.2".to_string(),
            prompt: "list branches".to_string(),
            stream: false,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""stream":false"#));
    }

    #[test]
    fn test_unreachable_server_is_unavailable() {
        // Port 1 is never an Ollama server
        let config = OllamaConfig {
            endpoint: "http://127.0.0.1:1".to_string(),
            connect_timeout_ms: 200,
            timeout_ms: 200,
            ..OllamaConfig::default()
        };
        let client = OllamaClient::new(&config);
        assert!(!client.is_available());
        assert!(client.generate("git status").is_err());
    }
}
