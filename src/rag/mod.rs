//! RAG (Retrieval-Augmented Generation) module
//!
//! This module answers employee questions from the internal knowledge base:
//! - Department-scoped document visibility
//! - Keyword and embedding-similarity retrieval
//! - Context assembly from retrieved documents and recent conversation
//! - Two-stage generation: internal answer first, web-grounded fallback second
//!
//! # Examples
//!
//! ```rust,no_run
//! use nexusrag::config::AppConfig;
//! use nexusrag::models::{Department, QueryContext};
//! use nexusrag::rag::RagService;
//! use nexusrag::store::DocumentStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let store = DocumentStore::load(&config)?;
//!     let service = RagService::new(&config)?;
//!
//!     let query = QueryContext::new("giờ làm việc", Department::Hr);
//!     let answer = service.answer(&query, &store).await?;
//!     println!("[{}] {}", answer.source_type, answer.answer);
//!     for source in &answer.sources {
//!         println!("  - {} ({})", source.title, source.link);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod context;
pub mod permissions;
pub mod pipeline;
pub mod retriever;

pub use context::ContextAssembler;
pub use context::PromptContext;
pub use permissions::filter_permitted;
pub use pipeline::InternalOutcome;
pub use pipeline::PipelineState;
pub use pipeline::RagResponse;
pub use pipeline::RagService;
pub use pipeline::RetrievalMethod;
pub use retriever::Retriever;

use crate::models::Document;

/// Retrieved document with its relevance score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document: Document,
    /// Keyword points, cosine similarity, or 0 for fallback picks
    pub score: f32,
    pub match_type: MatchType,
}

/// How a search result was selected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    /// Vector similarity match
    Semantic,
    /// Query term match on title or content
    Keyword,
    /// Picked in store order because nothing could be scored
    Fallback,
}
