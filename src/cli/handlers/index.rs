//! Embedding cache and knowledge base handlers

use std::time::Instant;

use crate::cli::output::print_cache_stats;
use crate::cli::output::print_document_list;
use crate::cli::output::print_info;
use crate::cli::output::print_success;
use crate::cli::output::print_warning;
use crate::models::Department;
use crate::rag::RagService;
use crate::store::DocumentStore;
use crate::AppConfig;
use crate::Result;

/// Rebuild the embedding cache for the configured knowledge base
pub async fn handle_index_command(config: &AppConfig, force: bool) -> Result<()> {
    let store = DocumentStore::load(config)?;
    let service = RagService::new(config)?;

    print_info(&format!(
        "Indexing {} documents with {} ({:?})",
        store.len(),
        config.embeddings.model,
        config.embeddings.provider
    ));

    let started = Instant::now();
    let snapshot = if force {
        service.reindex(&store).await?
    } else {
        service.ensure_index(&store).await?
    };

    let omitted = store.len().saturating_sub(snapshot.len());
    if omitted > 0 {
        print_warning(&format!(
            "{omitted} documents could not be embedded and are excluded from vector search"
        ));
    }
    print_success(&format!(
        "Cache generation {} ready with {} vectors in {:.2}s",
        snapshot.generation(),
        snapshot.len(),
        started.elapsed().as_secs_f64()
    ));
    println!();
    print_cache_stats(&service.cache().stats().await);

    Ok(())
}

/// List the documents a department is permitted to see
pub fn handle_docs_command(config: &AppConfig, department: Department) -> Result<()> {
    let store = DocumentStore::load(config)?;
    let permitted = store.permitted_for(department);
    print_document_list(department, &permitted);
    Ok(())
}
