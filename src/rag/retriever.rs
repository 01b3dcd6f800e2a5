//! Retrieval module for keyword and semantic search

use std::time::Duration;

use tracing::debug;
use tracing::warn;

use crate::config::AppConfig;
use crate::config::RetrievalConfig;
use crate::embeddings::cosine_similarity;
use crate::embeddings::CacheSnapshot;
use crate::embeddings::Embedder;
use crate::errors::with_timeout;
use crate::errors::Result;
use crate::models::Document;
use crate::rag::MatchType;
use crate::rag::SearchResult;

/// Terms of this many characters or fewer are ignored by keyword search
pub const MIN_TERM_CHARS: usize = 3;

const TITLE_MATCH_POINTS: u32 = 2;
const CONTENT_MATCH_POINTS: u32 = 1;

/// Lower-cased whitespace-separated query terms longer than [`MIN_TERM_CHARS`]
pub fn query_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .filter(|term| term.chars().count() > MIN_TERM_CHARS)
        .map(str::to_string)
        .collect()
}

/// +2 per term found in the title, +1 per term found in the content (case-insensitive substring)
pub fn keyword_score(document: &Document, terms: &[String]) -> u32 {
    let title = document.name.to_lowercase();
    let content = document.content.to_lowercase();

    terms
        .iter()
        .map(|term| {
            let mut points = 0;
            if content.contains(term.as_str()) {
                points += CONTENT_MATCH_POINTS;
            }
            if title.contains(term.as_str()) {
                points += TITLE_MATCH_POINTS;
            }
            points
        })
        .sum()
}

/// Retriever for keyword and semantic search over permitted documents
#[derive(Debug, Clone)]
pub struct Retriever {
    lexical_top_k: usize,
    vector_top_k: usize,
    fallback_top_k: usize,
    min_similarity: Option<f32>,
    embedding_timeout: Duration,
}

impl Retriever {
    /// Create a new retriever
    pub fn new(config: &RetrievalConfig, embedding_timeout: Duration) -> Self {
        Self {
            lexical_top_k: config.lexical_top_k,
            vector_top_k: config.vector_top_k,
            fallback_top_k: config.fallback_top_k,
            min_similarity: config.min_similarity,
            embedding_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(&config.retrieval, config.embedding_timeout())
    }

    /// Override the similarity floor; `None` keeps plain top-k
    #[must_use]
    pub const fn with_min_similarity(mut self, min_similarity: Option<f32>) -> Self {
        self.min_similarity = min_similarity;
        self
    }

    pub const fn min_similarity(&self) -> Option<f32> {
        self.min_similarity
    }

    /// First documents in store order, used when nothing can be scored
    fn fallback(&self, permitted: &[&Document]) -> Vec<SearchResult> {
        permitted
            .iter()
            .take(self.fallback_top_k)
            .map(|doc| SearchResult {
                document: (*doc).clone(),
                score: 0.0,
                match_type: MatchType::Fallback,
            })
            .collect()
    }

    /// Keyword search using weighted title/content term matching
    pub fn keyword_search(&self, query: &str, permitted: &[&Document]) -> Vec<SearchResult> {
        let terms = query_terms(query);
        if terms.is_empty() {
            debug!("No usable query terms, returning first {} documents", self.fallback_top_k);
            return self.fallback(permitted);
        }

        let mut scored: Vec<(u32, &Document)> = permitted
            .iter()
            .map(|doc| (keyword_score(doc, &terms), *doc))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Stable: equal scores keep store order
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(self.lexical_top_k);

        for (score, doc) in &scored {
            debug!("Keyword match {} score={}", doc.id, score);
        }

        scored
            .into_iter()
            .map(|(score, doc)| SearchResult {
                document: doc.clone(),
                score: score as f32,
                match_type: MatchType::Keyword,
            })
            .collect()
    }

    /// Rank permitted, cached documents by cosine similarity to `query_embedding`
    pub fn rank_by_similarity(
        &self,
        query_embedding: &[f32],
        permitted: &[&Document],
        snapshot: &CacheSnapshot,
    ) -> Vec<SearchResult> {
        let mut ranked: Vec<(f32, &Document)> = permitted
            .iter()
            .filter_map(|doc| {
                snapshot
                    .get(&doc.id)
                    .map(|vector| (cosine_similarity(query_embedding, vector), *doc))
            })
            .filter(|(similarity, _)| self.min_similarity.map_or(true, |floor| *similarity >= floor))
            .collect();

        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        ranked.truncate(self.vector_top_k);

        for (similarity, doc) in &ranked {
            debug!("Semantic match {} similarity={:.4}", doc.id, similarity);
        }

        ranked
            .into_iter()
            .map(|(similarity, doc)| SearchResult {
                document: doc.clone(),
                score: similarity,
                match_type: MatchType::Semantic,
            })
            .collect()
    }

    /// Semantic search using the cached document embeddings
    ///
    /// # Errors
    /// - Query embedding failures (provider errors, timeouts)
    pub async fn semantic_search<E: Embedder>(
        &self,
        query: &str,
        permitted: &[&Document],
        snapshot: &CacheSnapshot,
        embedder: &E,
    ) -> Result<Vec<SearchResult>> {
        if snapshot.is_empty() {
            debug!("Embedding cache is empty, returning first {} documents", self.fallback_top_k);
            return Ok(self.fallback(permitted));
        }

        debug!("Performing semantic search: {}", query);
        let query_embedding =
            with_timeout("query embedding", self.embedding_timeout, embedder.embed(query)).await?;

        Ok(self.rank_by_similarity(&query_embedding, permitted, snapshot))
    }

    /// Semantic search when the cache has entries, keyword search otherwise or on failure
    pub async fn auto_search<E: Embedder>(
        &self,
        query: &str,
        permitted: &[&Document],
        snapshot: &CacheSnapshot,
        embedder: &E,
    ) -> Vec<SearchResult> {
        if snapshot.is_empty() {
            return self.keyword_search(query, permitted);
        }

        match self.semantic_search(query, permitted, snapshot, embedder).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Semantic search failed, falling back to keyword search: {}", e);
                self.keyword_search(query, permitted)
            }
        }
    }
}

impl Default for Retriever {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
