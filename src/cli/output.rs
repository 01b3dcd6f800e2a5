//! CLI output formatting utilities
//!
//! This module provides consistent output formatting for the `nexusrag` CLI

use crate::embeddings::cache::CacheStats;
use crate::models::AnswerResult;
use crate::models::Department;
use crate::models::Document;
use crate::models::SourceType;
use crate::rag::MatchType;
use crate::rag::PipelineState;
use crate::rag::RetrievalMethod;
use crate::rag::Retriever;
use crate::rag::SearchResult;
use crate::AppConfig;

/// Safely truncate a string at character boundary (not byte boundary)
///
/// # Returns
/// Truncated string with "..." suffix if truncated, otherwise the original string
#[must_use]
pub fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        s.to_string()
    }
}

/// Provenance badge shown above every answer
#[must_use]
pub const fn source_badge(source_type: SourceType) -> &'static str {
    match source_type {
        SourceType::Internal => "📁 Internal documents",
        SourceType::External => "🌐 Web search",
    }
}

/// Print an answer with its provenance badge and citations
pub fn print_answer(answer: &AnswerResult) {
    println!("[{}]", source_badge(answer.source_type));
    println!();
    println!("{}", answer.answer);

    if !answer.sources.is_empty() {
        println!();
        println!("📚 Sources:");
        for (idx, source) in answer.sources.iter().enumerate() {
            println!("  {}. {} - {}", idx + 1, source.title, source.link);
        }
    }
}

/// Print retrieval details for `ask --details`
pub fn print_retrieval_details(
    method: RetrievalMethod,
    retriever: &Retriever,
    results: &[SearchResult],
    final_state: PipelineState,
) {
    match retriever.min_similarity() {
        Some(floor) => println!("🔍 Method: {method}, similarity floor {floor}"),
        None => println!("🔍 Method: {method}, no similarity floor"),
    }
    println!("🔍 Retrieved {} documents (final state: {final_state}):", results.len());
    for (idx, result) in results.iter().enumerate() {
        let how = match result.match_type {
            MatchType::Semantic => format!("similarity {:.3}", result.score),
            MatchType::Keyword => format!("keyword score {}", result.score),
            MatchType::Fallback => "fallback".to_string(),
        };
        println!("  {}. {} [{}] ({how})", idx + 1, result.document.name, result.document.id);
    }
    println!();
}

/// Print the documents a department can see
pub fn print_document_list(department: Department, documents: &[&Document]) {
    println!(
        "📋 {} documents visible to {} ({}):",
        documents.len(),
        department.label(),
        department.key()
    );
    for doc in documents {
        println!(
            "  - {} | {} | {} | {}",
            doc.id,
            doc.name,
            doc.department.label(),
            doc.web_view_link
        );
        println!("      {}", truncate_str(&doc.content, 80));
    }
}

pub fn print_cache_stats(stats: &CacheStats) {
    println!("🧠 Embedding cache:");
    println!("  Freshness: {:?}", stats.policy);
    println!("  Generation: {}", stats.generation);
    println!("  Documents at last rebuild: {}", stats.document_count);
    println!("  Cached vectors: {}", stats.entries);
    println!("  Omitted: {}", stats.document_count.saturating_sub(stats.entries));
    println!("  Rebuilds this run: {}", stats.rebuilds);
}

pub fn print_config(config: &AppConfig) {
    println!("📋 Nexus Configuration:");
    println!();

    println!("📝 Logging:");
    println!("  Level: {}", config.logging.level);
    println!("  Backtrace: {}", config.logging.backtrace);
    println!();

    println!("🤖 LLM:");
    println!("  Endpoint: {}", config.llm.endpoint);
    println!("  Model: {}", config.llm.model);
    println!("  API key: {}", config.masked_api_key());
    println!("  Timeout: {}s", config.llm.timeout_secs);
    println!();

    println!("🧠 Embeddings:");
    println!("  Provider: {:?}", config.embeddings.provider);
    println!("  Endpoint: {}", config.embeddings.endpoint);
    println!("  Model: {}", config.embeddings.model);
    println!("  Dimension: {}", config.embeddings.dimension);
    println!("  Timeout: {}s", config.embeddings.timeout_secs);
    println!("  Rebuild concurrency: {}", config.embeddings.rebuild_concurrency);
    println!();

    println!("🔍 Retrieval:");
    println!("  Method: {}", config.retrieval.method);
    println!("  Lexical top-k: {}", config.retrieval.lexical_top_k);
    println!("  Vector top-k: {}", config.retrieval.vector_top_k);
    println!("  Fallback top-k: {}", config.retrieval.fallback_top_k);
    match config.retrieval.min_similarity {
        Some(floor) => println!("  Min similarity: {floor}"),
        None => println!("  Min similarity: (not applied)"),
    }
    println!("  History turns: {}", config.retrieval.history_turns);
    println!();

    println!("📦 Cache:");
    println!("  Freshness: {:?}", config.cache.freshness);
    println!();

    println!("📚 Knowledge base:");
    match &config.knowledge_base.path {
        Some(path) => println!("  File: {}", path.display()),
        None => println!("  Built-in seed documents"),
    }
}

pub fn print_info(msg: &str) {
    println!("ℹ️  {msg}");
}

pub fn print_success(msg: &str) {
    println!("✅ {msg}");
}

pub fn print_warning(msg: &str) {
    println!("⚠️  {msg}");
}

pub fn print_error(msg: &str) {
    eprintln!("❌ {msg}");
}
