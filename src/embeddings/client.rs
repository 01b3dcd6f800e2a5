//! Embedding API clients for various providers

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use super::Embedder;
use crate::config::AppConfig;
use crate::errors::NexusError;
use crate::errors::Result;

/// Supported embedding providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Google Gemini `embedContent` API
    #[default]
    Gemini,
    /// `OpenAI` embeddings API
    #[serde(rename = "openai")]
    OpenAI,
    /// Ollama local embeddings
    Ollama,
}

/// Client for generating embeddings from various providers
pub struct EmbeddingClient {
    provider: EmbeddingProvider,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    dimension: Option<usize>,
    client: Client,
}

impl EmbeddingClient {
    /// Create a new embedding client
    ///
    /// # Errors
    /// - HTTP client build errors (invalid configuration)
    pub fn new(
        provider: EmbeddingProvider,
        model: String,
        endpoint: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| NexusError::HttpError(e.to_string()))?;

        Ok(Self {
            provider,
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            dimension: None,
            client,
        })
    }

    /// Reject embeddings whose length differs from `dimension`
    #[must_use]
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    /// Build from the `[embeddings]` section and the shared credential
    ///
    /// # Errors
    /// - Missing credential for providers that need one
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = match config.embeddings.provider {
            EmbeddingProvider::Ollama => None,
            EmbeddingProvider::Gemini | EmbeddingProvider::OpenAI => {
                Some(config.api_key()?.to_string())
            }
        };

        Self::new(
            config.embeddings.provider,
            config.embeddings.model.clone(),
            config.embeddings.endpoint.clone(),
            api_key,
            config.embedding_timeout(),
        )
        .map(|client| client.with_dimension(config.embeddings.dimension))
    }

    pub const fn provider(&self) -> EmbeddingProvider {
        self.provider
    }

    /// Generate embedding for a single text
    ///
    /// # Errors
    /// - API request failures (network errors, timeouts, authentication failures)
    /// - Invalid API responses (malformed JSON, empty embedding, wrong dimension)
    pub async fn generate(&self, text: &str) -> Result<Vec<f32>> {
        let embedding = match self.provider {
            EmbeddingProvider::Gemini => self.generate_gemini(text).await?,
            EmbeddingProvider::OpenAI => self.generate_openai(text).await?,
            EmbeddingProvider::Ollama => self.generate_ollama(text).await?,
        };

        check_embedding(embedding, self.dimension)
    }

    fn require_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(NexusError::MissingCredential)
    }

    /// Generate embedding using Gemini `embedContent`
    async fn generate_gemini(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self.require_key()?;

        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }

        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }

        #[derive(Serialize)]
        struct GeminiRequest<'a> {
            model: String,
            content: Content<'a>,
        }

        #[derive(Deserialize)]
        struct GeminiResponse {
            embedding: GeminiEmbedding,
        }

        #[derive(Deserialize)]
        struct GeminiEmbedding {
            values: Vec<f32>,
        }

        let url = format!("{}/models/{}:embedContent", self.endpoint, self.model);
        debug!("Calling Gemini embeddings API: {}", url);

        let request = GeminiRequest {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part { text }],
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| NexusError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NexusError::EmbeddingError(format!(
                "Gemini API error ({status}): {error_text}"
            )));
        }

        let result: GeminiResponse = response
            .json()
            .await
            .map_err(|e| NexusError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        Ok(result.embedding.values)
    }

    /// Generate embedding using `OpenAI` API
    async fn generate_openai(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self.require_key()?;

        #[derive(Serialize)]
        struct OpenAIRequest<'a> {
            input: &'a str,
            model: &'a str,
        }

        #[derive(Deserialize)]
        struct OpenAIResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(Deserialize)]
        struct EmbeddingData {
            embedding: Vec<f32>,
        }

        let url = format!("{}/embeddings", self.endpoint);
        debug!("Calling OpenAI embeddings API: {}", url);

        let request = OpenAIRequest {
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(&request)
            .send()
            .await
            .map_err(|e| NexusError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NexusError::EmbeddingError(format!(
                "OpenAI API error ({status}): {error_text}"
            )));
        }

        let result: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| NexusError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        result
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| NexusError::EmbeddingError("No embedding in response".to_string()))
    }

    /// Generate embedding using Ollama API
    async fn generate_ollama(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct OllamaRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct OllamaResponse {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.endpoint);
        debug!("Calling Ollama embeddings API: {}", url);

        let request = OllamaRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| NexusError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NexusError::EmbeddingError(format!(
                "Ollama API error ({status}): {error_text}"
            )));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| NexusError::EmbeddingError(format!("Failed to parse response: {e}")))?;

        Ok(result.embedding)
    }
}

/// A mismatched vector would silently score 0 against every cached entry
fn check_embedding(embedding: Vec<f32>, expected: Option<usize>) -> Result<Vec<f32>> {
    if embedding.is_empty() {
        return Err(NexusError::EmbeddingError(
            "Provider returned an empty embedding".to_string(),
        ));
    }
    match expected {
        Some(dimension) if embedding.len() != dimension => Err(NexusError::EmbeddingError(format!(
            "Embedding dimension mismatch: expected {dimension}, got {}",
            embedding.len()
        ))),
        _ => Ok(embedding),
    }
}

impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.generate(text).await
    }
}
