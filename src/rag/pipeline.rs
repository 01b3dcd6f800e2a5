//! Answer pipeline: Retrieve -> Generate internally -> Fall back to web search

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::AppConfig;
use crate::embeddings::CacheSnapshot;
use crate::embeddings::Embedder;
use crate::embeddings::EmbeddingCache;
use crate::embeddings::EmbeddingClient;
use crate::errors::with_timeout;
use crate::errors::NexusError;
use crate::errors::Result;
use crate::llm::prompts::build_internal_prompt;
use crate::llm::prompts::build_web_search_prompt;
use crate::llm::prompts::SEARCH_NEEDED;
use crate::llm::Generation;
use crate::llm::GenerationRequest;
use crate::llm::Generator;
use crate::llm::LlmService;
use crate::models::AnswerResult;
use crate::models::Citation;
use crate::models::QueryContext;
use crate::models::SourceType;
use crate::rag::ContextAssembler;
use crate::rag::PromptContext;
use crate::rag::Retriever;
use crate::rag::SearchResult;
use crate::store::DocumentStore;

/// Answer used when the web stage returns no text
pub const NO_WEB_ANSWER: &str = "Xin lỗi, tôi không thể tìm thấy thông tin.";

/// Answer used when the web stage itself fails
pub const WEB_FAILURE_ANSWER: &str = "Đã xảy ra lỗi khi tìm kiếm thông tin.";

/// Citation title for grounding sources that carry no title
pub const DEFAULT_WEB_SOURCE_TITLE: &str = "Web Result";

/// Retrieval method for the pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMethod {
    /// Keyword search using title/content term matching
    Lexical,
    /// Semantic search using cached embeddings
    Vector,
    /// Vector when the cache has entries, lexical otherwise
    #[default]
    Auto,
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lexical => f.write_str("lexical"),
            Self::Vector => f.write_str("vector"),
            Self::Auto => f.write_str("auto"),
        }
    }
}

/// Stages of a single query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Retrieving,
    GeneratingInternal,
    DoneInternal,
    GeneratingExternal,
    DoneExternal,
    Failed,
}

impl PipelineState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::DoneInternal | Self::DoneExternal | Self::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Retrieving => "RETRIEVING",
            Self::GeneratingInternal => "GENERATING_INTERNAL",
            Self::DoneInternal => "DONE_INTERNAL",
            Self::GeneratingExternal => "GENERATING_EXTERNAL",
            Self::DoneExternal => "DONE_EXTERNAL",
            Self::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Result of the internal generation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalOutcome {
    /// Trimmed answer text grounded in the internal documents
    Answered(String),
    /// The model signalled `SEARCH_NEEDED` or returned no text
    Insufficient,
    /// The generation call failed or timed out
    Failed(String),
}

impl InternalOutcome {
    /// Classify a finished internal generation call
    pub fn from_generation(outcome: Result<Generation>) -> Self {
        match outcome {
            Ok(generation) => {
                let text = generation.text.as_deref().map(str::trim).unwrap_or_default();
                if text.is_empty() || text.contains(SEARCH_NEEDED) {
                    Self::Insufficient
                } else {
                    Self::Answered(text.to_string())
                }
            }
            Err(e) => Self::Failed(e.to_string()),
        }
    }
}

/// Answer plus what the pipeline did to produce it
#[derive(Debug, Clone)]
pub struct RagResponse {
    pub result: AnswerResult,
    pub retrieved: Vec<SearchResult>,
    pub final_state: PipelineState,
}

/// Build the external-provenance answer from a web-grounded generation
pub fn web_answer(generation: Generation) -> AnswerResult {
    let answer = generation
        .text
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| NO_WEB_ANSWER.to_string());

    let sources = generation
        .grounding
        .into_iter()
        .filter_map(|chunk| {
            let link = chunk.uri.filter(|uri| !uri.is_empty())?;
            let title = chunk
                .title
                .filter(|title| !title.is_empty())
                .unwrap_or_else(|| DEFAULT_WEB_SOURCE_TITLE.to_string());
            Some(Citation { title, link })
        })
        .collect();

    AnswerResult {
        answer,
        source_type: SourceType::External,
        sources,
    }
}

/// The fixed degraded answer for a failed web stage
pub fn web_failure_answer() -> AnswerResult {
    AnswerResult {
        answer: WEB_FAILURE_ANSWER.to_string(),
        source_type: SourceType::External,
        sources: Vec::new(),
    }
}

fn transition(state: &mut PipelineState, next: PipelineState) {
    debug!("Pipeline state {} -> {}", state, next);
    if next.is_terminal() {
        info!("Query finished in state {}", next);
    }
    *state = next;
}

/// Complete RAG service
pub struct RagService<E = EmbeddingClient, G = LlmService> {
    embedder: E,
    generator: G,
    cache: Arc<EmbeddingCache>,
    retriever: Retriever,
    context_assembler: ContextAssembler,
    method: RetrievalMethod,
    credential_configured: bool,
    llm_timeout: Duration,
}

impl RagService {
    /// Create a new RAG service backed by the configured HTTP capabilities
    ///
    /// # Errors
    /// - Missing API credential
    /// - HTTP client build errors
    pub fn new(config: &AppConfig) -> Result<Self> {
        config.api_key()?;
        let embedder = EmbeddingClient::from_config(config)?;
        let generator = LlmService::new(config)?;
        let cache = Arc::new(EmbeddingCache::from_config(config));
        info!(
            "RAG service using model {} with {} retrieval",
            generator.model(),
            config.retrieval.method
        );

        Ok(Self::from_services(config, embedder, generator, cache))
    }
}

impl<E: Embedder, G: Generator> RagService<E, G> {
    /// Create from existing capabilities and a shared cache
    pub fn from_services(config: &AppConfig, embedder: E, generator: G, cache: Arc<EmbeddingCache>) -> Self {
        Self {
            embedder,
            generator,
            cache,
            retriever: Retriever::from_config(config),
            context_assembler: ContextAssembler::new(config.retrieval.history_turns),
            method: config.retrieval.method,
            credential_configured: config.has_api_key(),
            llm_timeout: config.llm_timeout(),
        }
    }

    #[must_use]
    pub fn with_method(mut self, method: RetrievalMethod) -> Self {
        self.method = method;
        self
    }

    #[must_use]
    pub fn with_retriever(mut self, retriever: Retriever) -> Self {
        self.retriever = retriever;
        self
    }

    pub const fn method(&self) -> RetrievalMethod {
        self.method
    }

    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub const fn cache(&self) -> &Arc<EmbeddingCache> {
        &self.cache
    }

    fn require_credential(&self) -> Result<()> {
        if self.credential_configured {
            Ok(())
        } else {
            Err(NexusError::MissingCredential)
        }
    }

    /// Bring the embedding cache in line with the store, rebuilding if stale
    ///
    /// # Errors
    /// - Missing API credential
    pub async fn ensure_index(&self, store: &DocumentStore) -> Result<Arc<CacheSnapshot>> {
        self.require_credential()?;
        Ok(self.cache.ensure_fresh(&self.embedder, store.documents()).await)
    }

    /// Rebuild the embedding cache unconditionally
    ///
    /// # Errors
    /// - Missing API credential
    pub async fn reindex(&self, store: &DocumentStore) -> Result<Arc<CacheSnapshot>> {
        self.require_credential()?;
        Ok(self
            .cache
            .invalidate_and_rebuild(&self.embedder, store.documents())
            .await)
    }

    /// Retrieve permitted documents for a query with the configured method
    ///
    /// # Errors
    /// - Missing API credential
    pub async fn retrieve(&self, query: &QueryContext, store: &DocumentStore) -> Result<Vec<SearchResult>> {
        self.require_credential()?;
        Ok(self.retrieve_permitted(query, store).await)
    }

    async fn retrieve_permitted(&self, query: &QueryContext, store: &DocumentStore) -> Vec<SearchResult> {
        let permitted = store.permitted_for(query.department);
        debug!(
            "{} of {} documents visible to {}",
            permitted.len(),
            store.len(),
            query.department.key()
        );

        match self.method {
            RetrievalMethod::Lexical => self.retriever.keyword_search(&query.query, &permitted),
            RetrievalMethod::Vector => {
                let snapshot = self.cache.ensure_fresh(&self.embedder, store.documents()).await;
                match self
                    .retriever
                    .semantic_search(&query.query, &permitted, &snapshot, &self.embedder)
                    .await
                {
                    Ok(results) => results,
                    Err(e) => {
                        warn!("Semantic search failed, continuing with no documents: {}", e);
                        Vec::new()
                    }
                }
            }
            RetrievalMethod::Auto => {
                let snapshot = self.cache.ensure_fresh(&self.embedder, store.documents()).await;
                self.retriever
                    .auto_search(&query.query, &permitted, &snapshot, &self.embedder)
                    .await
            }
        }
    }

    /// Answer a query
    ///
    /// Generation failures never surface here; they degrade into an
    /// external-provenance answer.
    ///
    /// # Errors
    /// - Missing API credential, checked before any capability call
    pub async fn answer(&self, query: &QueryContext, store: &DocumentStore) -> Result<AnswerResult> {
        Ok(self.answer_with_details(query, store).await?.result)
    }

    /// Answer a query, also reporting retrieved documents and the final state
    ///
    /// # Errors
    /// - Missing API credential, checked before any capability call
    pub async fn answer_with_details(&self, query: &QueryContext, store: &DocumentStore) -> Result<RagResponse> {
        self.require_credential()?;
        info!(
            "Processing query from {} ({} method): {}",
            query.department.key(),
            self.method,
            query.query
        );

        let mut state = PipelineState::Retrieving;
        let retrieved = self.retrieve_permitted(query, store).await;
        debug!("Retrieved {} documents", retrieved.len());

        transition(&mut state, PipelineState::GeneratingInternal);
        let context = self.context_assembler.assemble(&retrieved, &query.history);

        match self.generate_internal(query, &context).await {
            InternalOutcome::Answered(answer) => {
                transition(&mut state, PipelineState::DoneInternal);
                let sources = retrieved.iter().map(|r| r.document.citation()).collect();
                return Ok(RagResponse {
                    result: AnswerResult {
                        answer,
                        source_type: SourceType::Internal,
                        sources,
                    },
                    retrieved,
                    final_state: state,
                });
            }
            InternalOutcome::Insufficient => {
                info!("Internal documents insufficient, falling back to web search");
            }
            InternalOutcome::Failed(reason) => {
                warn!("Internal generation failed, falling back to web search: {}", reason);
            }
        }

        transition(&mut state, PipelineState::GeneratingExternal);
        let result = match self.generate_external(query).await {
            Ok(generation) => {
                transition(&mut state, PipelineState::DoneExternal);
                web_answer(generation)
            }
            Err(e) => {
                warn!("Web search failed: {}", e);
                transition(&mut state, PipelineState::Failed);
                web_failure_answer()
            }
        };

        Ok(RagResponse {
            result,
            retrieved,
            final_state: state,
        })
    }

    async fn generate_internal(&self, query: &QueryContext, context: &PromptContext) -> InternalOutcome {
        let prompt = build_internal_prompt(&query.query, query.department, context);
        let request = GenerationRequest::internal(prompt);
        let outcome = with_timeout(
            "internal generation",
            self.llm_timeout,
            self.generator.generate(&request),
        )
        .await;
        InternalOutcome::from_generation(outcome)
    }

    async fn generate_external(&self, query: &QueryContext) -> Result<Generation> {
        let request = GenerationRequest::web_search(build_web_search_prompt(&query.query));
        with_timeout("web search generation", self.llm_timeout, self.generator.generate(&request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::GroundingChunk;

    #[test]
    fn test_internal_outcome_classification() {
        assert_eq!(
            InternalOutcome::from_generation(Ok(Generation::text("  Giờ làm việc từ 8:30.  "))),
            InternalOutcome::Answered("Giờ làm việc từ 8:30.".to_string())
        );
        assert_eq!(
            InternalOutcome::from_generation(Ok(Generation::text("SEARCH_NEEDED"))),
            InternalOutcome::Insufficient
        );
        assert_eq!(
            InternalOutcome::from_generation(Ok(Generation::text("Xin lỗi. \"SEARCH_NEEDED\""))),
            InternalOutcome::Insufficient
        );
        assert_eq!(
            InternalOutcome::from_generation(Ok(Generation::default())),
            InternalOutcome::Insufficient
        );
        assert!(matches!(
            InternalOutcome::from_generation(Err(NexusError::LlmError("500".to_string()))),
            InternalOutcome::Failed(_)
        ));
    }

    #[test]
    fn test_web_answer_defaults_and_link_filter() {
        let generation = Generation {
            text: None,
            grounding: vec![
                GroundingChunk {
                    title: Some("VnExpress".to_string()),
                    uri: Some("https://vnexpress.net/a".to_string()),
                },
                GroundingChunk {
                    title: None,
                    uri: Some("https://example.com/b".to_string()),
                },
                GroundingChunk {
                    title: Some("No link".to_string()),
                    uri: Some(String::new()),
                },
                GroundingChunk::default(),
            ],
        };

        let result = web_answer(generation);
        assert_eq!(result.answer, NO_WEB_ANSWER);
        assert_eq!(result.source_type, SourceType::External);
        assert_eq!(
            result.sources,
            vec![
                Citation {
                    title: "VnExpress".to_string(),
                    link: "https://vnexpress.net/a".to_string(),
                },
                Citation {
                    title: DEFAULT_WEB_SOURCE_TITLE.to_string(),
                    link: "https://example.com/b".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_failure_answer_shape() {
        let result = web_failure_answer();
        assert_eq!(result.answer, WEB_FAILURE_ANSWER);
        assert_eq!(result.source_type, SourceType::External);
        assert!(result.sources.is_empty());
    }

    #[test]
    fn test_state_display_and_terminality() {
        assert_eq!(PipelineState::GeneratingInternal.to_string(), "GENERATING_INTERNAL");
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::GeneratingExternal.is_terminal());
    }

    #[test]
    fn test_retrieval_method_serde() {
        let method: RetrievalMethod = serde_json::from_str("\"lexical\"").unwrap();
        assert_eq!(method, RetrievalMethod::Lexical);
        assert_eq!(RetrievalMethod::default(), RetrievalMethod::Auto);
    }
}
