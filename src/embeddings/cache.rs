//! Process-wide embedding cache
//!
//! The cache maps document id to its embedding. Readers always get an
//! immutable [`CacheSnapshot`]; a rebuild embeds every document concurrently
//! and then swaps in a whole new snapshot, so no reader ever sees a partially
//! built generation. A mutex serialises rebuilds, and callers that queued
//! behind a rebuild re-check freshness before starting their own.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use futures::stream::StreamExt;
use futures::stream::{self};
use serde::Deserialize;
use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;
use tokio::sync::Mutex;
use tokio::sync::RwLock;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::Embedder;
use crate::config::AppConfig;
use crate::errors::with_timeout;
use crate::models::Document;

const DEFAULT_REBUILD_CONCURRENCY: usize = 16;
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// How the cache decides whether it still matches the document store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreshnessPolicy {
    /// Fresh while the cache holds one vector per stored document.
    /// Content edits that keep the count unchanged go unnoticed.
    #[default]
    DocumentCount,
    /// Also requires a SHA-256 over every document's id, name and content to be unchanged
    ContentHash,
}

/// Freshness key of a document list under a given policy
#[derive(Debug, Clone, PartialEq, Eq)]
struct FreshnessKey {
    document_count: usize,
    fingerprint: Option<String>,
}

impl FreshnessKey {
    fn compute(policy: FreshnessPolicy, documents: &[Document]) -> Self {
        let fingerprint = match policy {
            FreshnessPolicy::DocumentCount => None,
            FreshnessPolicy::ContentHash => Some(content_fingerprint(documents)),
        };
        Self {
            document_count: documents.len(),
            fingerprint,
        }
    }

    /// Entry count must equal the store size, so documents omitted after a
    /// failed embedding are retried by the next refresh
    fn matches(&self, snapshot: &CacheSnapshot) -> bool {
        snapshot.len() == self.document_count && snapshot.fingerprint == self.fingerprint
    }
}

/// Hex SHA-256 over the ordered (id, name, content) of every document
pub fn content_fingerprint(documents: &[Document]) -> String {
    let mut hasher = Sha256::new();
    for doc in documents {
        for field in [&doc.id, &doc.name, &doc.content] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hex::encode(hasher.finalize())
}

/// One fully built cache generation
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    generation: u64,
    document_count: usize,
    fingerprint: Option<String>,
    vectors: HashMap<String, Vec<f32>>,
}

impl CacheSnapshot {
    fn empty() -> Self {
        Self {
            generation: 0,
            document_count: 0,
            fingerprint: None,
            vectors: HashMap::new(),
        }
    }

    /// Monotonic rebuild counter, 0 before the first rebuild
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Store size recorded when the rebuild producing this snapshot started
    pub const fn document_count(&self) -> usize {
        self.document_count
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn get(&self, document_id: &str) -> Option<&[f32]> {
        self.vectors.get(document_id).map(Vec::as_slice)
    }

    pub fn contains(&self, document_id: &str) -> bool {
        self.vectors.contains_key(document_id)
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub policy: FreshnessPolicy,
    pub generation: u64,
    pub entries: usize,
    pub document_count: usize,
    pub rebuilds: u64,
}

/// Embedding cache shared by every query flow
pub struct EmbeddingCache {
    current: RwLock<Arc<CacheSnapshot>>,
    rebuild_lock: Mutex<()>,
    rebuilds: AtomicU64,
    policy: FreshnessPolicy,
    concurrency: usize,
    call_timeout: Duration,
}

impl EmbeddingCache {
    pub fn new(policy: FreshnessPolicy, concurrency: usize, call_timeout: Duration) -> Self {
        Self {
            current: RwLock::new(Arc::new(CacheSnapshot::empty())),
            rebuild_lock: Mutex::new(()),
            rebuilds: AtomicU64::new(0),
            policy,
            concurrency: concurrency.max(1),
            call_timeout,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.cache.freshness,
            config.embeddings.rebuild_concurrency,
            config.embedding_timeout(),
        )
    }

    /// Current generation; never a half-built one
    pub async fn snapshot(&self) -> Arc<CacheSnapshot> {
        Arc::clone(&*self.current.read().await)
    }

    pub async fn is_fresh(&self, documents: &[Document]) -> bool {
        let key = FreshnessKey::compute(self.policy, documents);
        key.matches(&*self.snapshot().await)
    }

    /// Number of rebuilds executed since creation
    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::SeqCst)
    }

    pub async fn stats(&self) -> CacheStats {
        let snapshot = self.snapshot().await;
        CacheStats {
            policy: self.policy,
            generation: snapshot.generation,
            entries: snapshot.len(),
            document_count: snapshot.document_count,
            rebuilds: self.rebuild_count(),
        }
    }

    /// Rebuild if stale, returning the snapshot matching `documents`.
    ///
    /// Concurrent callers against a stale cache run exactly one rebuild; the
    /// others wait for it and return its result.
    pub async fn ensure_fresh<E: Embedder>(
        &self,
        embedder: &E,
        documents: &[Document],
    ) -> Arc<CacheSnapshot> {
        let key = FreshnessKey::compute(self.policy, documents);

        let current = self.snapshot().await;
        if key.matches(&current) {
            return current;
        }

        let _guard = self.rebuild_lock.lock().await;

        // A rebuild may have finished while this caller was queued
        let current = self.snapshot().await;
        if key.matches(&current) {
            debug!(
                "Embedding cache already rebuilt (generation {}), skipping",
                current.generation
            );
            return current;
        }

        self.rebuild_locked(embedder, documents, key).await
    }

    /// Discard the current generation and rebuild unconditionally
    pub async fn invalidate_and_rebuild<E: Embedder>(
        &self,
        embedder: &E,
        documents: &[Document],
    ) -> Arc<CacheSnapshot> {
        let key = FreshnessKey::compute(self.policy, documents);
        let _guard = self.rebuild_lock.lock().await;
        self.rebuild_locked(embedder, documents, key).await
    }

    /// Caller must hold `rebuild_lock`
    async fn rebuild_locked<E: Embedder>(
        &self,
        embedder: &E,
        documents: &[Document],
        key: FreshnessKey,
    ) -> Arc<CacheSnapshot> {
        let started = Instant::now();
        let previous_generation = self.snapshot().await.generation;
        info!(
            "Rebuilding embedding cache for {} documents (concurrency {})",
            documents.len(),
            self.concurrency
        );

        let call_timeout = self.call_timeout;
        let results: Vec<_> = stream::iter(documents.iter())
            .map(move |doc| async move {
                let text = doc.embedding_text();
                let outcome = with_timeout(
                    "document embedding",
                    call_timeout,
                    embedder.embed(&text),
                )
                .await;
                (doc.id.as_str(), outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut vectors = HashMap::with_capacity(results.len());
        let mut omitted = 0usize;
        for (id, outcome) in results {
            match outcome {
                Ok(vector) => {
                    vectors.insert(id.to_string(), vector);
                }
                Err(e) => {
                    omitted += 1;
                    warn!("Embedding failed for document {}, omitting from cache: {}", id, e);
                }
            }
        }

        let snapshot = Arc::new(CacheSnapshot {
            generation: previous_generation + 1,
            document_count: key.document_count,
            fingerprint: key.fingerprint,
            vectors,
        });

        *self.current.write().await = Arc::clone(&snapshot);
        self.rebuilds.fetch_add(1, Ordering::SeqCst);

        info!(
            "Embedding cache generation {} ready: {} entries, {} omitted, {:.2}s",
            snapshot.generation,
            snapshot.len(),
            omitted,
            started.elapsed().as_secs_f64()
        );

        snapshot
    }
}

impl Default for EmbeddingCache {
    fn default() -> Self {
        Self::new(
            FreshnessPolicy::default(),
            DEFAULT_REBUILD_CONCURRENCY,
            DEFAULT_CALL_TIMEOUT,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::AtomicUsize;

    use tokio::sync::Notify;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::errors::NexusError;
    use crate::errors::Result;
    use crate::store::seed_documents;

    /// Embeds text as [len, 1.0], failing for texts containing `fail_marker`
    /// and for every text while `outage` is set
    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_marker: Option<&'static str>,
        outage: AtomicBool,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_marker: None,
                outage: AtomicBool::new(false),
            }
        }

        fn failing_on(marker: &'static str) -> Self {
            Self {
                fail_marker: Some(marker),
                ..Self::new()
            }
        }
    }

    impl Embedder for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.outage.load(Ordering::SeqCst) {
                return Err(NexusError::HttpError("connection refused".to_string()));
            }
            if self.fail_marker.is_some_and(|m| text.contains(m)) {
                return Err(NexusError::EmbeddingError("rate limited".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    /// Blocks every embed call until the gate opens, announcing each start
    struct GatedEmbedder {
        started: Notify,
        gate: Semaphore,
    }

    impl Embedder for GatedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.started.notify_one();
            let _permit = self
                .gate
                .acquire()
                .await
                .map_err(|e| NexusError::EmbeddingError(e.to_string()))?;
            Ok(vec![text.len() as f32, 2.0])
        }
    }

    #[tokio::test]
    async fn test_new_cache_is_empty_generation_zero() {
        let cache = EmbeddingCache::default();
        let snapshot = cache.snapshot().await;
        assert_eq!(snapshot.generation(), 0);
        assert!(snapshot.is_empty());
        assert!(cache.is_fresh(&[]).await);
        assert!(!cache.is_fresh(&seed_documents()).await);
    }

    #[tokio::test]
    async fn test_ensure_fresh_builds_once() {
        let cache = EmbeddingCache::default();
        let embedder = CountingEmbedder::new();
        let docs = seed_documents();

        let first = cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(first.len(), docs.len());
        assert_eq!(first.generation(), 1);

        let second = cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(second.generation(), 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), docs.len());
        assert_eq!(cache.rebuild_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_document_is_omitted_and_retried() {
        let cache = EmbeddingCache::default();
        let embedder = CountingEmbedder::failing_on("Giao_an_co_vua");
        let docs = seed_documents();

        let snapshot = cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(snapshot.len(), docs.len() - 1);
        assert!(!snapshot.contains("chess-1"));
        assert_eq!(snapshot.document_count(), docs.len());
        assert!(!cache.is_fresh(&docs).await);

        // Fewer entries than documents keeps the cache stale
        let retried = cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(cache.rebuild_count(), 2);
        assert_eq!(retried.generation(), 2);
        assert_eq!(retried.len(), docs.len() - 1);
    }

    #[tokio::test]
    async fn test_cache_recovers_after_provider_outage() {
        let cache = EmbeddingCache::default();
        let embedder = CountingEmbedder::new();
        embedder.outage.store(true, Ordering::SeqCst);
        let docs = seed_documents();

        let during = cache.ensure_fresh(&embedder, &docs).await;
        assert!(during.is_empty());
        assert_eq!(during.generation(), 1);

        embedder.outage.store(false, Ordering::SeqCst);
        let after = cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(after.len(), docs.len());
        assert_eq!(after.generation(), 2);
        assert!(cache.is_fresh(&docs).await);

        cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(cache.rebuild_count(), 2);
    }

    #[tokio::test]
    async fn test_readers_see_previous_generation_during_rebuild() {
        let cache = EmbeddingCache::default();
        let docs = seed_documents();
        cache.ensure_fresh(&CountingEmbedder::new(), &docs).await;

        let gated = GatedEmbedder {
            started: Notify::new(),
            gate: Semaphore::new(0),
        };

        let (rebuilt, ()) = tokio::join!(cache.invalidate_and_rebuild(&gated, &docs), async {
            gated.started.notified().await;

            let during = cache.snapshot().await;
            assert_eq!(during.generation(), 1);
            assert_eq!(during.len(), docs.len());
            assert_eq!(during.get("gen-1").unwrap()[1], 1.0);

            gated.gate.add_permits(docs.len());
        });

        assert_eq!(rebuilt.generation(), 2);
        let after = cache.snapshot().await;
        assert_eq!(after.generation(), 2);
        assert!(docs.iter().all(|d| after.get(&d.id).unwrap()[1] == 2.0));
    }

    #[tokio::test]
    async fn test_count_change_triggers_full_rebuild() {
        let cache = EmbeddingCache::default();
        let embedder = CountingEmbedder::new();
        let mut docs = seed_documents();

        cache.ensure_fresh(&embedder, &docs).await;
        docs.pop();
        let snapshot = cache.ensure_fresh(&embedder, &docs).await;

        assert_eq!(snapshot.generation(), 2);
        assert_eq!(snapshot.len(), docs.len());
        assert!(!snapshot.contains("online-1"));
    }

    #[tokio::test]
    async fn test_content_edit_ignored_by_count_policy() {
        let cache = EmbeddingCache::new(FreshnessPolicy::DocumentCount, 4, DEFAULT_CALL_TIMEOUT);
        let embedder = CountingEmbedder::new();
        let mut docs = seed_documents();

        cache.ensure_fresh(&embedder, &docs).await;
        docs[0].content.push_str(" Thứ 7 nghỉ.");
        assert!(cache.is_fresh(&docs).await);
    }

    #[tokio::test]
    async fn test_content_edit_detected_by_hash_policy() {
        let cache = EmbeddingCache::new(FreshnessPolicy::ContentHash, 4, DEFAULT_CALL_TIMEOUT);
        let embedder = CountingEmbedder::new();
        let mut docs = seed_documents();

        cache.ensure_fresh(&embedder, &docs).await;
        assert!(cache.is_fresh(&docs).await);

        docs[0].content.push_str(" Thứ 7 nghỉ.");
        assert!(!cache.is_fresh(&docs).await);

        let snapshot = cache.ensure_fresh(&embedder, &docs).await;
        assert_eq!(snapshot.generation(), 2);
        assert_eq!(snapshot.get("gen-1").unwrap()[0], docs[0].embedding_text().len() as f32);
        assert_eq!(cache.stats().await.policy, FreshnessPolicy::ContentHash);
    }

    #[tokio::test]
    async fn test_invalidate_and_rebuild_always_rebuilds() {
        let cache = EmbeddingCache::default();
        let embedder = CountingEmbedder::new();
        let docs = seed_documents();

        cache.ensure_fresh(&embedder, &docs).await;
        let snapshot = cache.invalidate_and_rebuild(&embedder, &docs).await;
        assert_eq!(snapshot.generation(), 2);
        assert_eq!(cache.stats().await.rebuilds, 2);
    }

    #[test]
    fn test_fingerprint_is_order_and_boundary_sensitive() {
        let docs = seed_documents();
        let mut reversed = docs.clone();
        reversed.reverse();
        assert_ne!(content_fingerprint(&docs), content_fingerprint(&reversed));

        let mut a = docs[..1].to_vec();
        let mut b = docs[..1].to_vec();
        a[0].name = "ab".to_string();
        a[0].content = "c".to_string();
        b[0].name = "a".to_string();
        b[0].content = "bc".to_string();
        assert_ne!(content_fingerprint(&a), content_fingerprint(&b));
    }
}
