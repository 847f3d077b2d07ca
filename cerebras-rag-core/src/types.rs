//! Configuration data types

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level assistant configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub memory: MemoryConfig,
    pub logging: LoggingConfig,
}

/// OpenAI-compatible LLM gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier as known to the gateway
    pub model: String,
    /// Gateway base URL; `OPENROUTER_BASE_URL` overrides it
    pub base_url: String,
    pub temperature: f32,
    /// Completion token cap; 0 leaves it to the gateway
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Name of the Pinecone index holding the documentation chunks
    pub index_name: String,
    /// Namespace inside the index (empty = default namespace)
    pub namespace: String,
    /// Pinecone control plane URL used to resolve the index host
    pub control_plane_url: String,
    /// Metadata key holding the chunk text
    pub text_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of chunks returned by similarity search
    pub top_k: usize,
    /// Candidate pool size handed to the reranker (at least `top_k`)
    pub rerank_candidates: usize,
    /// Number of chunks kept after reranking
    pub rerank_top_n: usize,
    pub rerank_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Drop citations whose quote does not occur in the cited chunk
    pub verify_citations: bool,
    /// Accept unparseable structured output as a plain answer instead of failing
    pub structured_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Messages kept per thread; 0 keeps everything
    pub max_history_messages: usize,
    /// Token budget for prior conversation included in prompts
    pub max_context_tokens: usize,
    /// Persist threads as JSON files in this directory; in-memory when unset
    pub persist_dir: Option<PathBuf>,
    /// Thread used when the caller supplies none
    pub default_thread_id: String,
}
