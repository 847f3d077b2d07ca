//! Document retrieval system
//!
//! Embeds the question, runs a similarity query and optionally reranks the
//! candidates. Reranking problems never fail a request; the unranked
//! candidates are used instead.

use crate::embeddings::Embedder;
use crate::reranker::Reranker;
use crate::types::{RagResult, SearchResult};
use crate::vector_store::VectorIndex;
use cerebras_rag_core::RetrievalConfig;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Retrieved chunks plus the reason reranking was skipped, if it was
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub results: Vec<SearchResult>,
    pub rerank_fallback: Option<String>,
}

/// Finds the chunks relevant to a question
pub struct DocumentRetriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    reranker: Option<Arc<dyn Reranker>>,
    config: RetrievalConfig,
}

impl DocumentRetriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        reranker: Option<Arc<dyn Reranker>>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            reranker,
            config,
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Retrieve up to `top_k` chunks, or up to `rerank_top_n` when reranking succeeds
    pub async fn retrieve(&self, question: &str, use_reranking: bool) -> RagResult<Retrieval> {
        let start_time = Instant::now();
        let top_k = self.config.top_k;

        let pool_size = if use_reranking {
            top_k.max(self.config.rerank_candidates)
        } else {
            top_k
        };

        let vector = self.embedder.embed_query(question).await?;
        debug!(
            "Embedded question with {} ({} dimensions)",
            self.embedder.model_name(),
            vector.len()
        );
        let candidates = self.index.query(vector, pool_size).await?;
        debug!("Similarity search returned {} candidates", candidates.len());

        let retrieval = if use_reranking && !candidates.is_empty() {
            self.rerank(question, candidates).await
        } else {
            let mut results = candidates;
            results.truncate(top_k);
            Retrieval {
                results,
                rerank_fallback: None,
            }
        };

        info!(
            "Retrieved {} documents in {:?} (reranking: {})",
            retrieval.results.len(),
            start_time.elapsed(),
            use_reranking && retrieval.rerank_fallback.is_none()
        );

        Ok(retrieval)
    }

    async fn rerank(&self, question: &str, candidates: Vec<SearchResult>) -> Retrieval {
        let Some(reranker) = &self.reranker else {
            return self.fallback(
                candidates,
                "Reranking requested but no reranker is configured".to_string(),
            );
        };

        let documents: Vec<String> = candidates.iter().map(|r| r.chunk.text.clone()).collect();

        match reranker
            .rerank(question, &documents, self.config.rerank_top_n)
            .await
        {
            Ok(ranked) => {
                let mut results: Vec<SearchResult> = ranked
                    .into_iter()
                    .filter_map(|r| {
                        candidates.get(r.index).map(|c| SearchResult {
                            chunk: c.chunk.clone(),
                            score: r.relevance_score,
                        })
                    })
                    .collect();
                results.truncate(self.config.rerank_top_n);

                if results.is_empty() {
                    return self.fallback(
                        candidates,
                        "Reranker returned no usable results".to_string(),
                    );
                }

                Retrieval {
                    results,
                    rerank_fallback: None,
                }
            }
            Err(e) => self.fallback(candidates, format!("Reranking failed: {}", e)),
        }
    }

    fn fallback(&self, mut candidates: Vec<SearchResult>, reason: String) -> Retrieval {
        warn!("{}, using regular retrieval", reason);
        candidates.truncate(self.config.top_k);
        Retrieval {
            results: candidates,
            rerank_fallback: Some(reason),
        }
    }
}
