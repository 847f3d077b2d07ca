//! Query embedding
//!
//! Questions are embedded with Cohere's v2 embed endpoint so they land in the
//! same vector space as the ingested documentation chunks.

use crate::http::{create_http_client, describe_error_response};
use crate::types::{RagError, RagResult};
use async_trait::async_trait;
use cerebras_rag_core::EmbeddingConfig;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

/// Turns a search query into a dense vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> RagResult<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Cohere embeddings client
pub struct CohereEmbedder {
    client: reqwest::Client,
    api_key: String,
    config: EmbeddingConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    texts: Vec<&'a str>,
    model: &'a str,
    input_type: &'a str,
    embedding_types: [&'a str; 1],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: EmbeddingsByType,
}

#[derive(Deserialize)]
struct EmbeddingsByType {
    #[serde(default)]
    float: Vec<Vec<f32>>,
}

impl CohereEmbedder {
    pub fn new(config: EmbeddingConfig, api_key: impl Into<String>) -> RagResult<Self> {
        Ok(Self {
            client: create_http_client()?,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v2/embed", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Embedder for CohereEmbedder {
    async fn embed_query(&self, text: &str) -> RagResult<Vec<f32>> {
        let start_time = Instant::now();

        let request = EmbedRequest {
            texts: vec![text],
            model: &self.config.model,
            input_type: "search_query",
            embedding_types: ["float"],
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Embedding(format!("Failed to reach embedding service: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Embedding(
                describe_error_response(response, "embed").await,
            ));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| RagError::Embedding(format!("Invalid embedding response: {}", e)))?;

        let vector = body
            .embeddings
            .float
            .into_iter()
            .next()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| RagError::Embedding("Embedding response contained no vectors".to_string()))?;

        debug!(
            "Embedded query with {} ({} dims) in {:?}",
            self.config.model,
            vector.len(),
            start_time.elapsed()
        );

        Ok(vector)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}
