//! Embeddings module
//!
//! This module provides everything the vector side of retrieval needs:
//! - The `Embedder` capability and an HTTP client for Gemini, OpenAI and Ollama
//! - Cosine similarity
//! - The process-wide embedding cache with coalesced, all-or-nothing rebuilds
//!
//! # Examples
//!
//! ```rust,no_run
//! use nexusrag::config::AppConfig;
//! use nexusrag::embeddings::{EmbeddingCache, EmbeddingClient};
//! use nexusrag::store::DocumentStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AppConfig::load()?;
//!     let client = EmbeddingClient::from_config(&config)?;
//!     let cache = EmbeddingCache::from_config(&config);
//!     let store = DocumentStore::load(&config)?;
//!
//!     let snapshot = cache.ensure_fresh(&client, store.documents()).await;
//!     println!("Cached {} document vectors", snapshot.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod client;
pub mod similarity;

use std::future::Future;
use std::sync::Arc;

pub use cache::CacheSnapshot;
pub use cache::EmbeddingCache;
pub use cache::FreshnessPolicy;
pub use client::EmbeddingClient;
pub use client::EmbeddingProvider;
pub use similarity::cosine_similarity;

use crate::errors::Result;

/// Relevance floor recommended for vector matches; only enforced when configured
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.4;

/// Text to dense vector capability
pub trait Embedder: Send + Sync {
    /// Embed a single text. May fail (rate limit, auth, network).
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;
}

impl<T: Embedder> Embedder for Arc<T> {
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send {
        (**self).embed(text)
    }
}
