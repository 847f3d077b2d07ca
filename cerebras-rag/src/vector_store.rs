//! Vector index access
//!
//! The documentation chunks live in a hosted Pinecone index populated by an
//! external ingestion step. This module only reads from it.

use crate::http::{create_http_client, describe_error_response};
use crate::types::{DocumentChunk, RagError, RagResult, SearchResult};
use async_trait::async_trait;
use cerebras_rag_core::VectorStoreConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const PINECONE_API_VERSION: &str = "2024-07";

/// Index statistics relevant to readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexStats {
    pub total_vector_count: u64,
}

/// Read access to a vector index
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Statistics for the index, or `None` when the index does not exist
    async fn describe(&self) -> RagResult<Option<IndexStats>>;

    /// Nearest neighbours of `vector`, best first
    async fn query(&self, vector: Vec<f32>, top_k: usize) -> RagResult<Vec<SearchResult>>;

    fn index_name(&self) -> &str;
}

/// Pinecone REST client bound to one index
pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    config: VectorStoreConfig,
    /// Data plane host, resolved once through the control plane
    host: OnceCell<String>,
}

#[derive(Deserialize)]
struct IndexDescription {
    host: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    total_vector_count: u64,
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: Vec<f32>,
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}

#[derive(Deserialize)]
struct QueryMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

impl PineconeIndex {
    pub fn new(config: VectorStoreConfig, api_key: impl Into<String>) -> RagResult<Self> {
        Ok(Self {
            client: create_http_client()?,
            api_key: api_key.into(),
            config,
            host: OnceCell::new(),
        })
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", PINECONE_API_VERSION)
    }

    /// Resolve the data plane URL, `None` if the index is absent
    async fn data_plane_url(&self) -> RagResult<Option<String>> {
        if let Some(host) = self.host.get() {
            return Ok(Some(host.clone()));
        }

        let url = format!(
            "{}/indexes/{}",
            self.config.control_plane_url.trim_end_matches('/'),
            self.config.index_name
        );
        debug!("Describing Pinecone index at {}", url);

        let response = self
            .request(reqwest::Method::GET, &url)
            .send()
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to reach vector database: {}", e)))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(RagError::Retrieval(
                describe_error_response(response, "describe_index").await,
            ));
        }

        let description: IndexDescription = response
            .json()
            .await
            .map_err(|e| RagError::Retrieval(format!("Invalid index description: {}", e)))?;

        let host = normalize_host(&description.host);
        info!("Resolved index '{}' to {}", self.config.index_name, host);

        let _ = self.host.set(host.clone());
        Ok(Some(host))
    }

    async fn require_data_plane_url(&self) -> RagResult<String> {
        self.data_plane_url().await?.ok_or_else(|| {
            RagError::Retrieval(format!(
                "Pinecone index '{}' not found",
                self.config.index_name
            ))
        })
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    async fn describe(&self) -> RagResult<Option<IndexStats>> {
        let Some(host) = self.data_plane_url().await? else {
            return Ok(None);
        };

        let response = self
            .request(reqwest::Method::POST, &format!("{}/describe_index_stats", host))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to reach vector database: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Retrieval(
                describe_error_response(response, "describe_index_stats").await,
            ));
        }

        let stats: StatsResponse = response
            .json()
            .await
            .map_err(|e| RagError::Retrieval(format!("Invalid index stats: {}", e)))?;

        let total_vector_count = if self.config.namespace.is_empty() {
            stats.total_vector_count
        } else {
            stats
                .namespaces
                .get(&self.config.namespace)
                .map(|ns| ns.vector_count)
                .unwrap_or(0)
        };

        Ok(Some(IndexStats { total_vector_count }))
    }

    async fn query(&self, vector: Vec<f32>, top_k: usize) -> RagResult<Vec<SearchResult>> {
        let host = self.require_data_plane_url().await?;

        let request = QueryRequest {
            vector,
            top_k,
            include_metadata: true,
            namespace: &self.config.namespace,
        };

        let response = self
            .request(reqwest::Method::POST, &format!("{}/query", host))
            .json(&request)
            .send()
            .await
            .map_err(|e| RagError::Retrieval(format!("Failed to reach vector database: {}", e)))?;

        if !response.status().is_success() {
            return Err(RagError::Retrieval(
                describe_error_response(response, "query").await,
            ));
        }

        let body: QueryResponse = response
            .json()
            .await
            .map_err(|e| RagError::Retrieval(format!("Invalid query response: {}", e)))?;

        Ok(body
            .matches
            .into_iter()
            .map(|m| SearchResult {
                score: m.score,
                chunk: chunk_from_metadata(m.id, m.metadata, &self.config.text_key),
            })
            .collect())
    }

    fn index_name(&self) -> &str {
        &self.config.index_name
    }
}

fn normalize_host(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

/// Split index metadata into the chunk's well-known fields and the rest
fn chunk_from_metadata(
    id: String,
    mut metadata: HashMap<String, serde_json::Value>,
    text_key: &str,
) -> DocumentChunk {
    let mut take_string = |key: &str| match metadata.remove(key) {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) if !other.is_null() => Some(other.to_string()),
        _ => None,
    };

    let text = take_string(text_key).unwrap_or_default();
    let source = take_string("source");
    let title = take_string("title");
    let chunk_index = metadata.get("chunk_index").and_then(|v| v.as_u64());

    DocumentChunk {
        id,
        text,
        source,
        title,
        chunk_index,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_host() {
        assert_eq!(
            normalize_host("cerebras-docs-abc.svc.pinecone.io"),
            "https://cerebras-docs-abc.svc.pinecone.io"
        );
        assert_eq!(normalize_host("http://localhost:5080/"), "http://localhost:5080");
    }

    #[test]
    fn test_query_response_to_chunks() {
        let body: QueryResponse = serde_json::from_str(
            r#"{
                "matches": [
                    {"id": "doc-1", "score": 0.91, "metadata": {
                        "text": "Set the CEREBRAS_API_KEY environment variable.",
                        "source": "https://inference-docs.cerebras.ai/quickstart",
                        "title": "Quickstart",
                        "chunk_index": 3
                    }},
                    {"id": "doc-2", "score": 0.5}
                ],
                "namespace": ""
            }"#,
        )
        .unwrap();

        let chunks: Vec<DocumentChunk> = body
            .matches
            .into_iter()
            .map(|m| chunk_from_metadata(m.id, m.metadata, "text"))
            .collect();

        assert_eq!(chunks[0].title.as_deref(), Some("Quickstart"));
        assert_eq!(chunks[0].chunk_index, Some(3));
        assert!(chunks[0].metadata.contains_key("chunk_index"));
        assert!(!chunks[0].metadata.contains_key("text"));
        assert_eq!(chunks[1].text, "");
        assert_eq!(chunks[1].source_or_default(), "Unknown source");
    }

    #[test]
    fn test_stats_parsing() {
        let stats: StatsResponse = serde_json::from_str(
            r#"{"dimension":1024,"totalVectorCount":1234,"namespaces":{"docs":{"vectorCount":1200}}}"#,
        )
        .unwrap();
        assert_eq!(stats.total_vector_count, 1234);
        assert_eq!(stats.namespaces["docs"].vector_count, 1200);
    }

    #[test]
    fn test_query_request_uses_camel_case() {
        let json = serde_json::to_value(QueryRequest {
            vector: vec![0.1],
            top_k: 6,
            include_metadata: true,
            namespace: "",
        })
        .unwrap();
        assert_eq!(json["topK"], 6);
        assert_eq!(json["includeMetadata"], true);
    }
}
