//! Relevance reranking with Cohere's v2 rerank endpoint

use crate::http::{create_http_client, describe_error_response};
use crate::types::{RagError, RagResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One reranked document, pointing back into the input list
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct RerankResult {
    pub index: usize,
    pub relevance_score: f32,
}

/// Reorders candidate documents by relevance to a query
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Most relevant first, at most `top_n` entries
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> RagResult<Vec<RerankResult>>;
}

pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResult>,
}

impl CohereReranker {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> RagResult<Self> {
        Ok(Self {
            client: create_http_client()?,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Reranker for CohereReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> RagResult<Vec<RerankResult>> {
        let url = format!("{}/v2/rerank", self.base_url.trim_end_matches('/'));
        let request = RerankRequest {
            model: &self.model,
            query,
            documents,
            top_n,
        };

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Rerank(format!("Failed to reach rerank service: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Rerank(
                describe_error_response(response, "rerank").await,
            ));
        }

        let body: RerankResponse = response
            .json()
            .await
            .map_err(|e| RagError::Rerank(format!("Invalid rerank response: {}", e)))?;

        debug!(
            "Reranked {} documents with {}, kept {}",
            documents.len(),
            self.model,
            body.results.len()
        );

        Ok(body.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rerank_response_parsing() {
        let body: RerankResponse = serde_json::from_str(
            r#"{"id":"r","results":[{"index":3,"relevance_score":0.98},{"index":0,"relevance_score":0.4}],"meta":{}}"#,
        )
        .unwrap();
        assert_eq!(body.results[0].index, 3);
        assert!(body.results[0].relevance_score > body.results[1].relevance_score);
    }
}
