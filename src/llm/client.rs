//! Gemini `generateContent` client

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use super::Generation;
use super::GenerationRequest;
use super::Generator;
use super::GroundingChunk;
use crate::config::AppConfig;
use crate::errors::NexusError;
use crate::errors::Result;

/// LLM service backed by the Gemini REST API
pub struct LlmService {
    endpoint: String,
    model: String,
    api_key: String,
    client: Client,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<RawGroundingChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct RawGroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Default, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

impl GenerateResponse {
    fn into_generation(self) -> Generation {
        let Some(candidate) = self.candidates.into_iter().next() else {
            return Generation::default();
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        let grounding = candidate
            .grounding_metadata
            .map(|m| {
                m.grounding_chunks
                    .into_iter()
                    .map(|chunk| {
                        let web = chunk.web.unwrap_or_default();
                        GroundingChunk {
                            title: web.title,
                            uri: web.uri,
                        }
                    })
                    .collect()
            })
            .unwrap_or_default();

        Generation {
            text: (!text.is_empty()).then_some(text),
            grounding,
        }
    }
}

impl LlmService {
    /// Create from the `[llm]` section
    ///
    /// # Errors
    /// - Missing credential
    /// - HTTP client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        Self::with_params(
            config.llm.endpoint.clone(),
            config.llm.model.clone(),
            config.api_key()?.to_string(),
            config.llm_timeout(),
        )
    }

    pub fn with_params(
        endpoint: String,
        model: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NexusError::HttpError(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model,
            api_key,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Call `generateContent`, enabling the Google Search tool on request
    pub async fn generate_content(&self, request: &GenerationRequest) -> Result<Generation> {
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        debug!(
            "Calling Gemini generateContent ({} chars, web_search={})",
            request.prompt.len(),
            request.web_search
        );

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: &request.prompt,
                }],
            }],
            tools: if request.web_search {
                vec![json!({ "google_search": {} })]
            } else {
                Vec::new()
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| NexusError::HttpError(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NexusError::LlmError(format!(
                "Gemini API error ({status}): {error_text}"
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| NexusError::LlmError(format!("Failed to parse response: {e}")))?;

        Ok(parsed.into_generation())
    }
}

impl Generator for LlmService {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self.generate_content(request).await
    }
}
