//! Search engine
//!
//! Owns the corpus snapshot and the embedding engine, and turns a free-text
//! query into ranked passages. Builds and rebuilds are serialized; searches
//! read an immutable snapshot and never observe a half-built index.

use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::chunk::{Chunk, SearchResult};
use crate::config::RetrievalConfig;
use crate::corpus::{Corpus, CorpusStats, IndexPhase};
use crate::embedding::{EmbeddingEngine, EmbeddingPipeline, EmbeddingProvider, EmbeddingReport};
use crate::error::{Result, RetrievalError};
use crate::loader;

/// Convert an index distance to a relevance score in (0, 1].
///
/// Non-increasing in distance and 1.0 at distance 0. In `f32` distances
/// below roughly `6e-8` also round to 1.0, so a score of 1.0 means an exact
/// or near-exact match.
pub fn relevance_score(distance: f32) -> f32 {
    1.0 / (1.0 + distance.max(0.0))
}

/// Retrieval service over one corpus
pub struct SearchEngine {
    config: RetrievalConfig,
    engine: Arc<EmbeddingEngine>,
    corpus: RwLock<Corpus>,
    build_lock: tokio::sync::Mutex<()>,
    searched: AtomicBool,
}

impl SearchEngine {
    /// Engine with an empty, unbuilt corpus
    pub fn new(config: RetrievalConfig, provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self::with_chunks(config, provider, Vec::new())
    }

    /// Engine over already loaded chunks; the index is built on
    /// [`rebuild`](Self::rebuild) or lazily on the first search
    pub fn with_chunks(
        config: RetrievalConfig,
        provider: Arc<dyn EmbeddingProvider>,
        chunks: Vec<Chunk>,
    ) -> Self {
        let engine = EmbeddingEngine::with_cache_capacity(provider, config.query_cache_capacity);
        Self {
            config,
            engine: Arc::new(engine),
            corpus: RwLock::new(Corpus::unbuilt(chunks)),
            build_lock: tokio::sync::Mutex::new(()),
            searched: AtomicBool::new(false),
        }
    }

    /// Load the corpus directory and, unless deferred, embed and index it
    pub async fn open(config: RetrievalConfig, provider: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        config.validate()?;
        if provider.dimension() != config.dimension {
            log::warn!(
                "Provider {} declares {}d embeddings, config expects {}d; using provider dimension",
                provider.model(),
                provider.dimension(),
                config.dimension
            );
        }

        let report = loader::load_directory(&config.data_dir, &config.file_suffix)?;
        let defer = config.defer_index_build;
        let engine = Self::with_chunks(config, provider, report.chunks);

        if defer {
            log::info!("Index build deferred until first search");
        } else {
            engine.rebuild().await;
        }
        Ok(engine)
    }

    /// Embed chunks that still lack a vector and rebuild the index
    pub async fn rebuild(&self) -> IndexPhase {
        let _guard = self.build_lock.lock().await;
        let chunks = self.begin_build().chunks().to_vec();
        self.build_locked(chunks).await
    }

    /// Reload every corpus file and rebuild from scratch.
    ///
    /// On a directory error the current corpus stays in service.
    pub async fn reload(&self) -> Result<IndexPhase> {
        let _guard = self.build_lock.lock().await;
        let previous = self.begin_build();
        let report = match loader::load_directory(&self.config.data_dir, &self.config.file_suffix) {
            Ok(report) => report,
            Err(e) => {
                *self.corpus.write() = previous;
                return Err(e);
            }
        };
        self.engine.clear_cache();
        Ok(self.build_locked(report.chunks).await)
    }

    /// Mark the corpus as building and return the snapshot being replaced
    fn begin_build(&self) -> Corpus {
        let mut corpus = self.corpus.write();
        let previous = corpus.clone();
        *corpus = previous.with_phase(IndexPhase::Building);
        previous
    }

    async fn build_locked(&self, mut chunks: Vec<Chunk>) -> IndexPhase {
        let report = self.embed_missing(&mut chunks).await;
        if !report.is_clean() {
            log::warn!("Embedding pass degraded: {:?}", report);
        }

        let corpus = Corpus::built(chunks, &self.config.index);
        let phase = corpus.phase();
        *self.corpus.write() = corpus;
        log::info!("Corpus ready: phase {:?}", phase);
        phase
    }

    async fn embed_missing(&self, chunks: &mut [Chunk]) -> EmbeddingReport {
        EmbeddingPipeline::new(
            Arc::clone(&self.engine),
            self.config.batch_size,
            self.config.max_concurrent_batches,
        )
        .run(chunks)
        .await
    }

    /// Ranked results for `query`, at most `k`.
    ///
    /// Never fails: an unavailable index or provider yields an empty list.
    pub async fn search(&self, query: &str, k: usize) -> Vec<SearchResult> {
        match self.try_search(query, k).await {
            Ok(results) => results,
            Err(e) => {
                log::warn!("Search failed, returning no results: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`search`](Self::search), but reports a failed query embedding
    /// as [`RetrievalError::ProviderUnavailable`].
    pub async fn try_search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let first_search = !self.searched.swap(true, Ordering::SeqCst);
        let mut corpus = self.snapshot();

        if corpus.is_empty() {
            log::info!("No documents loaded; cannot search");
            return Ok(Vec::new());
        }

        if corpus.phase() == IndexPhase::Building {
            // Wait for the running build to swap its snapshot in
            drop(self.build_lock.lock().await);
            corpus = self.snapshot();
        }

        if corpus.index().is_none() {
            let retry_empty = first_search && corpus.phase() == IndexPhase::Empty;
            if corpus.phase() != IndexPhase::Empty || retry_empty {
                corpus = self.lazy_build(retry_empty).await;
            }
        }

        let index = match corpus.require_index() {
            Ok(index) => index,
            Err(e) => {
                log::info!("{}; returning no results", e);
                return Ok(Vec::new());
            }
        };

        let query_embedding = self.engine.embed_query(query).await.map_err(|e| {
            log::warn!("Error generating query embedding: {}", e);
            RetrievalError::provider_unavailable(e.to_string())
        })?;

        let neighbors = index.search(&query_embedding, k)?;
        let chunks = corpus.chunks();
        let mut seen = HashSet::new();
        let mut results = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            match chunks.get(neighbor.chunk) {
                Some(chunk) => {
                    if seen.insert(neighbor.chunk) {
                        results.push(SearchResult::from_chunk(
                            chunk,
                            relevance_score(neighbor.distance),
                        ));
                    }
                }
                None => log::warn!(
                    "Index returned invalid ordinal {} (chunk {}); skipping",
                    neighbor.ordinal,
                    neighbor.chunk
                ),
            }
        }

        // Stable: equal scores keep index order
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(results)
    }

    async fn lazy_build(&self, retry_empty: bool) -> Corpus {
        let _guard = self.build_lock.lock().await;
        let current = self.snapshot();
        let needed = match current.phase() {
            IndexPhase::Unbuilt | IndexPhase::Building => true,
            IndexPhase::Empty => retry_empty,
            IndexPhase::Ready => false,
        };
        if !needed {
            return current;
        }

        log::info!("Computing embeddings and initializing index");
        let chunks = current.chunks().to_vec();
        *self.corpus.write() = current.with_phase(IndexPhase::Building);
        self.build_locked(chunks).await;
        self.snapshot()
    }

    fn snapshot(&self) -> Corpus {
        self.corpus.read().clone()
    }

    pub fn phase(&self) -> IndexPhase {
        self.corpus.read().phase()
    }

    pub fn stats(&self) -> CorpusStats {
        self.corpus.read().stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::ChunkMetadata;
    use crate::config::IndexOptions;
    use crate::embedding::testing::StaticProvider;
    use std::fs;

    fn chunk(part: &str, section: &str, content: &str) -> Chunk {
        Chunk::new(
            content,
            ChunkMetadata {
                part: part.to_string(),
                section: section.to_string(),
                title: String::new(),
                parent_title: "PART 50".to_string(),
            },
        )
    }

    fn config() -> RetrievalConfig {
        RetrievalConfig {
            dimension: 2,
            batch_size: 2,
            ..Default::default()
        }
    }

    /// Three part-50 chunks at squared distances 0, 1 and 3 from "q"
    fn scenario_provider() -> StaticProvider {
        StaticProvider::new(2)
            .with_vector("q", vec![0.0, 0.0])
            .with_vector("exact", vec![0.0, 0.0])
            .with_vector("near", vec![1.0, 0.0])
            .with_vector("far", vec![1.0, 2.0_f32.sqrt()])
    }

    fn scenario_chunks() -> Vec<Chunk> {
        vec![
            chunk("50", "50.3", "far"),
            chunk("50", "50.1", "exact"),
            chunk("50", "50.2", "near"),
        ]
    }

    async fn built_engine(provider: Arc<StaticProvider>, chunks: Vec<Chunk>) -> SearchEngine {
        let engine = SearchEngine::with_chunks(config(), provider, chunks);
        engine.rebuild().await;
        engine
    }

    #[test]
    fn test_relevance_score_bounds() {
        assert_eq!(relevance_score(0.0), 1.0);
        assert_eq!(relevance_score(1.0), 0.5);
        assert!(relevance_score(3.0) < relevance_score(1.0));
        assert!(relevance_score(1e9) > 0.0);
        assert!(relevance_score(1e-3) < 1.0);
        // Below f32 resolution next to 1.0
        assert_eq!(relevance_score(1e-8), 1.0);
    }

    #[tokio::test]
    async fn test_three_chunk_scenario_top_two() {
        let engine = built_engine(Arc::new(scenario_provider()), scenario_chunks()).await;
        assert_eq!(engine.phase(), IndexPhase::Ready);

        let results = engine.search("q", 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.5);
        assert_eq!(results[0].content, "exact");
        assert_eq!(results[0].metadata.section, "50.1");
        assert_eq!(results[1].content, "near");

        let all = engine.search("q", 10).await;
        assert_eq!(all.len(), 3);
        assert!((all[2].score - 0.25).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_scores_sorted_and_bounded() {
        let chunks: Vec<Chunk> = (0..20)
            .map(|i| chunk("20", &format!("20.{}", i), &format!("passage {}", i)))
            .collect();
        let engine = built_engine(Arc::new(StaticProvider::new(2)), chunks).await;

        let results = engine.search("dose limits", 7).await;
        assert_eq!(results.len(), 7);
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(results.iter().all(|r| r.score > 0.0 && r.score <= 1.0));
    }

    #[tokio::test]
    async fn test_search_is_idempotent() {
        let engine = built_engine(Arc::new(scenario_provider()), scenario_chunks()).await;
        let first = engine.search("q", 3).await;
        let second = engine.search("q", 3).await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_empty_corpus_returns_nothing() {
        let provider = Arc::new(StaticProvider::new(2));
        let engine = SearchEngine::new(config(), provider.clone());

        assert!(engine.search("anything", 3).await.is_empty());
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_parseable_files_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("10cfr_part50_structured.json"), "[broken").unwrap();
        let config = RetrievalConfig {
            data_dir: dir.path().to_path_buf(),
            ..config()
        };

        let engine = SearchEngine::open(config, Arc::new(StaticProvider::new(2)))
            .await
            .unwrap();
        assert!(engine.search("anything", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = RetrievalConfig {
            data_dir: dir.path().join("missing"),
            ..config()
        };
        assert!(SearchEngine::open(config, Arc::new(StaticProvider::new(2)))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_never_more_than_indexed() {
        // batch_size 2: the batch holding "c2" and "c3" fails
        let provider = Arc::new(StaticProvider::new(2).failing_on("c3"));
        let chunks = (0..5).map(|i| chunk("50", "", &format!("c{}", i))).collect();
        let engine = built_engine(provider, chunks).await;

        assert_eq!(engine.stats().indexed, 3);
        let results = engine.search("anything", 10).await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.content != "c2" && r.content != "c3"));
    }

    #[tokio::test]
    async fn test_partial_failure_unaffected_chunks_still_retrieve() {
        let provider = Arc::new(
            StaticProvider::new(2)
                .with_vector("a", vec![10.0, 0.0])
                .with_vector("b", vec![0.0, 10.0])
                .with_vector("c", vec![-10.0, 0.0])
                .with_vector("d", vec![0.0, -10.0])
                .with_vector("find c", vec![-10.0, 0.0])
                .with_vector("find a", vec![10.0, 0.0])
                .failing_on("a"),
        );
        let chunks = vec![
            chunk("50", "1", "a"),
            chunk("50", "2", "b"),
            chunk("50", "3", "c"),
            chunk("50", "4", "d"),
        ];
        let engine = built_engine(provider, chunks).await;

        let results = engine.search("find c", 1).await;
        assert_eq!(results[0].content, "c");
        assert_eq!(results[0].score, 1.0);

        // The failed batch ("a", "b") is excluded from the index
        let results = engine.search("find a", 4).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.content != "a" && r.content != "b"));
    }

    #[tokio::test]
    async fn test_zero_fallback_excluded_unless_opted_in() {
        let provider = Arc::new(
            StaticProvider::new(2)
                .with_vector("origin", vec![0.0, 0.0])
                .with_vector("x", vec![3.0, 0.0])
                .with_max_response_len(1),
        );
        let chunks = vec![chunk("50", "1", "x"), chunk("50", "2", "zeroed")];

        let engine = built_engine(provider.clone(), chunks.clone()).await;
        let stats = engine.stats();
        assert_eq!(stats.zero_filled, 1);
        assert_eq!(stats.indexed, 1);
        let results = engine.search("origin", 2).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].content, "x");

        let config = RetrievalConfig {
            index: IndexOptions {
                include_fallback: true,
                ..Default::default()
            },
            ..config()
        };
        let engine = SearchEngine::with_chunks(config, provider, chunks);
        engine.rebuild().await;
        let results = engine.search("origin", 2).await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "zeroed");
        assert_eq!(results[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_rebuild_repairs_zero_filled_chunks() {
        let provider = Arc::new(
            StaticProvider::new(2)
                .with_vector("origin", vec![0.0, 0.0])
                .with_vector("x", vec![3.0, 0.0])
                .with_vector("y", vec![0.0, 1.0])
                .with_max_response_len(1),
        );
        let chunks = vec![chunk("50", "1", "x"), chunk("50", "2", "y")];
        let engine = built_engine(provider.clone(), chunks).await;
        assert_eq!(engine.stats().zero_filled, 1);
        assert_eq!(engine.stats().indexed, 1);

        provider.set_max_response_len(None);
        let calls = provider.calls();
        assert_eq!(engine.rebuild().await, IndexPhase::Ready);

        assert_eq!(provider.calls(), calls + 1);
        let stats = engine.stats();
        assert_eq!(stats.zero_filled, 0);
        assert_eq!(stats.indexed, 2);
        let results = engine.search("origin", 2).await;
        assert_eq!(results[0].content, "y");
        assert_eq!(results[0].score, 0.5);
    }

    #[tokio::test]
    async fn test_lazy_build_on_first_search() {
        let provider = Arc::new(scenario_provider());
        let engine = SearchEngine::with_chunks(config(), provider, scenario_chunks());
        assert_eq!(engine.phase(), IndexPhase::Unbuilt);

        let results = engine.search("q", 1).await;
        assert_eq!(results.len(), 1);
        assert_eq!(engine.phase(), IndexPhase::Ready);
    }

    #[tokio::test]
    async fn test_empty_index_retried_only_on_first_search() {
        let provider = Arc::new(scenario_provider());
        provider.set_unreachable(true);
        let engine = built_engine(provider.clone(), scenario_chunks()).await;
        assert_eq!(engine.phase(), IndexPhase::Empty);

        // First search after startup retries the build and still finds nothing
        assert!(engine.search("q", 3).await.is_empty());
        assert_eq!(engine.phase(), IndexPhase::Empty);
        let calls = provider.calls();

        // Later searches short-circuit without touching the provider
        provider.set_unreachable(false);
        assert!(engine.search("q", 3).await.is_empty());
        assert_eq!(provider.calls(), calls);

        // An explicit rebuild recovers
        assert_eq!(engine.rebuild().await, IndexPhase::Ready);
        assert_eq!(engine.search("q", 3).await.len(), 3);
    }

    #[tokio::test]
    async fn test_first_search_recovers_empty_index() {
        let provider = Arc::new(scenario_provider());
        provider.set_unreachable(true);
        let engine = built_engine(provider.clone(), scenario_chunks()).await;
        assert_eq!(engine.phase(), IndexPhase::Empty);

        provider.set_unreachable(false);
        assert_eq!(engine.search("q", 3).await.len(), 3);
        assert_eq!(engine.phase(), IndexPhase::Ready);
    }

    #[tokio::test]
    async fn test_query_embedding_failure() {
        let provider = Arc::new(scenario_provider());
        let engine = built_engine(provider.clone(), scenario_chunks()).await;
        provider.set_unreachable(true);

        assert!(engine.search("unseen query", 3).await.is_empty());
        assert!(matches!(
            engine.try_search("unseen query", 3).await,
            Err(RetrievalError::ProviderUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_replaces_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let doc = |text: &str| {
            format!(
                r#"{{"title": "PART 20", "sections": {{"20.1001": {{"title": "Purpose", "content": "{}"}}}}}}"#,
                text
            )
        };
        fs::write(dir.path().join("10cfr_part20_structured.json"), doc("old text")).unwrap();
        let config = RetrievalConfig {
            data_dir: dir.path().to_path_buf(),
            ..config()
        };
        let engine = SearchEngine::open(config, Arc::new(StaticProvider::new(2)))
            .await
            .unwrap();
        assert_eq!(engine.search("old text", 1).await[0].content, "old text");

        fs::write(dir.path().join("10cfr_part20_structured.json"), doc("new text")).unwrap();
        fs::write(dir.path().join("10cfr_part30_structured.json"), doc("other part")).unwrap();
        assert_eq!(engine.reload().await.unwrap(), IndexPhase::Ready);

        let stats = engine.stats();
        assert_eq!(stats.chunks, 2);
        assert_eq!(stats.parts.get("30"), Some(&1));
        let results = engine.search("new text", 1).await;
        assert_eq!(results[0].content, "new text");
        assert_eq!(results[0].score, 1.0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_searches_during_rebuild() {
        let chunks: Vec<Chunk> = (0..40)
            .map(|i| chunk("50", "", &format!("passage {}", i)))
            .collect();
        let engine = Arc::new(built_engine(Arc::new(StaticProvider::new(4)), chunks).await);

        let mut handles = Vec::new();
        for i in 0..16 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                if i % 5 == 0 {
                    engine.rebuild().await;
                    Vec::new()
                } else {
                    engine.search(&format!("query {}", i % 3), 5).await
                }
            }));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let results = handle.await.unwrap();
            if i % 5 != 0 {
                assert_eq!(results.len(), 5);
                assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
            }
        }
        assert_eq!(engine.phase(), IndexPhase::Ready);
    }
}
