//! Mock services shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cerebras_rag::{
    AgentServices, AssistantConfig, ChatModel, DocsAgent, DocumentChunk, Embedder,
    InMemoryConversationStore, IndexStats, PromptMessage, RagError, RagResult, RerankResult,
    Reranker, SearchResult, TextStream, VectorIndex,
};
use futures::stream;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct MockEmbedder;

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_query(&self, _text: &str) -> RagResult<Vec<f32>> {
        Ok(vec![0.1, 0.2, 0.3, 0.4])
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

pub enum IndexBehavior {
    Ready(u64),
    Missing,
    Unreachable,
}

pub struct MockIndex {
    behavior: IndexBehavior,
    docs: Vec<SearchResult>,
    pub requested_top_k: Mutex<Vec<usize>>,
}

impl MockIndex {
    pub fn new(behavior: IndexBehavior, docs: Vec<SearchResult>) -> Self {
        Self {
            behavior,
            docs,
            requested_top_k: Mutex::new(Vec::new()),
        }
    }

    pub fn with_docs(count: usize) -> Self {
        Self::new(IndexBehavior::Ready(1234), docs(count))
    }
}

#[async_trait]
impl VectorIndex for MockIndex {
    async fn describe(&self) -> RagResult<Option<IndexStats>> {
        match self.behavior {
            IndexBehavior::Ready(total_vector_count) => Ok(Some(IndexStats { total_vector_count })),
            IndexBehavior::Missing => Ok(None),
            IndexBehavior::Unreachable => {
                Err(RagError::Retrieval("connection refused".to_string()))
            }
        }
    }

    async fn query(&self, _vector: Vec<f32>, top_k: usize) -> RagResult<Vec<SearchResult>> {
        self.requested_top_k.lock().unwrap().push(top_k);
        Ok(self.docs.iter().take(top_k).cloned().collect())
    }

    fn index_name(&self) -> &str {
        "cerebras-docs"
    }
}

/// Reverses the candidates, or fails
pub struct MockReranker {
    pub fail: bool,
}

#[async_trait]
impl Reranker for MockReranker {
    async fn rerank(
        &self,
        _query: &str,
        documents: &[String],
        top_n: usize,
    ) -> RagResult<Vec<RerankResult>> {
        if self.fail {
            return Err(RagError::Rerank("HTTP 500".to_string()));
        }

        Ok((0..documents.len())
            .rev()
            .take(top_n)
            .enumerate()
            .map(|(rank, index)| RerankResult {
                index,
                relevance_score: 1.0 - rank as f32 * 0.1,
            })
            .collect())
    }
}

type Responder = Box<dyn Fn(&[PromptMessage]) -> String + Send + Sync>;

/// Chat model answering through a closure and recording every prompt
pub struct MockChatModel {
    responder: Responder,
    pub calls: Mutex<Vec<Vec<PromptMessage>>>,
}

impl MockChatModel {
    pub fn new(responder: impl Fn(&[PromptMessage]) -> String + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(response: &str) -> Self {
        let response = response.to_string();
        Self::new(move |_| response.clone())
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_call(&self) -> Vec<PromptMessage> {
        self.calls.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    async fn complete(&self, messages: Vec<PromptMessage>) -> RagResult<String> {
        let response = (self.responder)(&messages);
        self.calls.lock().unwrap().push(messages);
        Ok(response)
    }

    async fn stream(&self, messages: Vec<PromptMessage>) -> RagResult<TextStream> {
        let response = (self.responder)(&messages);
        self.calls.lock().unwrap().push(messages);

        let deltas: Vec<RagResult<String>> = response
            .split_inclusive(' ')
            .map(|piece| Ok(piece.to_string()))
            .collect();
        Ok(stream::iter(deltas).boxed())
    }

    fn model_name(&self) -> &str {
        "mock-model"
    }
}

pub fn docs(count: usize) -> Vec<SearchResult> {
    (0..count)
        .map(|i| SearchResult {
            chunk: DocumentChunk {
                id: format!("doc-{}", i),
                text: format!("Document {} explains authentication with an API key.", i),
                source: Some(format!("https://inference-docs.cerebras.ai/page-{}", i)),
                title: Some(format!("Page {}", i)),
                chunk_index: Some(i as u64),
                metadata: HashMap::new(),
            },
            score: 1.0 - i as f32 * 0.05,
        })
        .collect()
}

pub struct Harness {
    pub agent: DocsAgent,
    pub index: Arc<MockIndex>,
    pub model: Arc<MockChatModel>,
}

pub fn harness(
    config: AssistantConfig,
    index: MockIndex,
    reranker: Option<MockReranker>,
    model: MockChatModel,
) -> Harness {
    let index = Arc::new(index);
    let model = Arc::new(model);
    let store = InMemoryConversationStore::new((&config.memory).into());

    let agent = DocsAgent::with_services(
        config,
        AgentServices {
            embedder: Arc::new(MockEmbedder),
            index: index.clone(),
            reranker: reranker.map(|r| Arc::new(r) as Arc<dyn Reranker>),
            model: model.clone(),
            store: Box::new(store),
        },
    )
    .unwrap();

    Harness {
        agent,
        index,
        model,
    }
}

pub fn structured(answer: &str, citations: &[(i64, &str)]) -> String {
    serde_json::json!({
        "answer": answer,
        "citations": citations
            .iter()
            .map(|(id, quote)| serde_json::json!({"source_id": id, "quote": quote}))
            .collect::<Vec<_>>(),
    })
    .to_string()
}
