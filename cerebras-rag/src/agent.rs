//! The documentation assistant
//!
//! [`DocsAgent`] is an explicitly constructed context object that owns the
//! retriever, the answer generator and the conversation store. Each call runs
//! retrieval, optional reranking and generation sequentially on the caller's
//! task.

use crate::embeddings::{CohereEmbedder, Embedder};
use crate::generation::{strip_reasoning, AnswerGenerator, NO_DOCUMENTS_ANSWER};
use crate::llm_client::{ChatModel, SiumaiChatModel};
use crate::memory::{
    is_conversation_history_question, store_from_config, ConversationStore, HistoryPolicy,
};
use crate::reranker::{CohereReranker, Reranker};
use crate::retriever::DocumentRetriever;
use crate::token_counter::TokenCounter;
use crate::types::{
    AnswerEvent, AskOptions, ConversationMessage, IndexState, QuotedAnswer, RagError, RagResult,
    ThreadConfig, VectorStoreStatus,
};
use crate::vector_store::{PineconeIndex, VectorIndex};
use async_stream::stream;
use cerebras_rag_core::performance::measure_async;
use cerebras_rag_core::{
    log_operation_error, log_operation_start, log_operation_success, AssistantConfig, Credentials,
};
use futures::{Stream, StreamExt};
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

/// Service implementations the agent is assembled from
pub struct AgentServices {
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub reranker: Option<Arc<dyn Reranker>>,
    pub model: Arc<dyn ChatModel>,
    pub store: Box<dyn ConversationStore>,
}

pub struct DocsAgent {
    config: AssistantConfig,
    retriever: DocumentRetriever,
    generator: AnswerGenerator,
    memory: Box<dyn ConversationStore>,
    policy: HistoryPolicy,
    counter: TokenCounter,
    /// Vector count seen by the first successful initialization
    ready: OnceLock<u64>,
}

impl DocsAgent {
    /// Assemble an agent from explicit services
    pub fn with_services(config: AssistantConfig, services: AgentServices) -> RagResult<Self> {
        let counter = TokenCounter::new(&config.llm.model)?;
        let policy = HistoryPolicy::from(&config.memory);

        let retriever = DocumentRetriever::new(
            services.embedder,
            services.index,
            services.reranker,
            config.retrieval.clone(),
        );
        let generator = AnswerGenerator::new(services.model, config.generation.clone());

        Ok(Self {
            config,
            retriever,
            generator,
            memory: services.store,
            policy,
            counter,
            ready: OnceLock::new(),
        })
    }

    /// Build the hosted-service clients described by `config`
    pub async fn from_config(config: AssistantConfig, credentials: &Credentials) -> RagResult<Self> {
        config.validate()?;

        let embedder = Arc::new(CohereEmbedder::new(
            config.embedding.clone(),
            &credentials.embeddings_api_key,
        )?);
        let index = Arc::new(PineconeIndex::new(
            config.vector_store.clone(),
            &credentials.vector_db_api_key,
        )?);
        let reranker = Arc::new(CohereReranker::new(
            &config.embedding.base_url,
            &config.retrieval.rerank_model,
            &credentials.embeddings_api_key,
        )?);
        let model = Arc::new(
            SiumaiChatModel::new(
                config.llm.clone(),
                &credentials.llm_api_key,
                credentials.llm_base_url.as_deref(),
            )
            .await?,
        );
        let store = store_from_config(&config.memory).await?;

        info!(
            "Assistant configured with model {} and index '{}'",
            config.llm.model, config.vector_store.index_name
        );

        Self::with_services(
            config,
            AgentServices {
                embedder,
                index,
                reranker: Some(reranker),
                model,
                store,
            },
        )
    }

    /// Same as [`from_config`](Self::from_config) with credentials from the environment
    pub async fn from_env(config: AssistantConfig) -> RagResult<Self> {
        let credentials = Credentials::from_env()?;
        Self::from_config(config, &credentials).await
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn model_name(&self) -> &str {
        self.generator.model_name()
    }

    fn thread_id(&self, thread: Option<&ThreadConfig>) -> String {
        thread
            .map(|t| t.thread_id.clone())
            .unwrap_or_else(|| self.config.memory.default_thread_id.clone())
    }

    /// Connect to the vector index and check it holds data
    pub async fn initialize_vector_store(&self) -> VectorStoreStatus {
        if self.ready.get().is_some() {
            return VectorStoreStatus {
                success: true,
                message: "Already initialized".to_string(),
                state: IndexState::AlreadyInitialized,
            };
        }

        let index_name = self.retriever.index().index_name().to_string();
        log_operation_start!("initialize_vector_store", index = %index_name);

        let status = match self.retriever.index().describe().await {
            Err(e) => {
                log_operation_error!("initialize_vector_store", e);
                VectorStoreStatus {
                    success: false,
                    message: format!("Failed to connect to vector database: {}", e),
                    state: IndexState::Unreachable,
                }
            }
            Ok(None) => VectorStoreStatus {
                success: false,
                message: format!(
                    "Pinecone index '{}' not found! Please run the ingestion step to create and populate it first.",
                    index_name
                ),
                state: IndexState::NotFound,
            },
            Ok(Some(stats)) if stats.total_vector_count == 0 => VectorStoreStatus {
                success: false,
                message: format!(
                    "Pinecone index '{}' is empty! Please run the ingestion step to populate it first.",
                    index_name
                ),
                state: IndexState::Empty,
            },
            Ok(Some(stats)) => {
                let vector_count = *self.ready.get_or_init(|| stats.total_vector_count);
                log_operation_success!("initialize_vector_store", vector_count);
                VectorStoreStatus {
                    success: true,
                    message: format!(
                        "Connected successfully with {} vectors",
                        format_thousands(vector_count)
                    ),
                    state: IndexState::Ready { vector_count },
                }
            }
        };

        if !status.success {
            warn!("{}", status.message);
        }
        status
    }

    async fn ensure_ready(&self) -> RagResult<()> {
        if self.ready.get().is_some() {
            return Ok(());
        }

        let status = self.initialize_vector_store().await;
        if status.success {
            Ok(())
        } else {
            Err(RagError::Retrieval(status.message))
        }
    }

    /// Messages of a thread, oldest first
    pub async fn conversation_history(
        &self,
        thread: Option<&ThreadConfig>,
    ) -> RagResult<Vec<ConversationMessage>> {
        self.memory.load(&self.thread_id(thread)).await
    }

    pub async fn list_threads(&self) -> RagResult<Vec<String>> {
        self.memory.list_threads().await
    }

    pub async fn clear_history(&self, thread: Option<&ThreadConfig>) -> RagResult<()> {
        self.memory.clear(&self.thread_id(thread)).await
    }

    /// Append one exchange; a failure is reported, not raised
    async fn record_exchange(&self, thread_id: &str, question: &str, answer: &str) -> Option<String> {
        let messages = vec![
            ConversationMessage::user(question),
            ConversationMessage::assistant(answer),
        ];

        match self.memory.append(thread_id, messages).await {
            Ok(()) => None,
            Err(e) => {
                warn!(thread_id, "Failed to save exchange: {}", e);
                Some(format!("Failed to save to memory: {}", e))
            }
        }
    }

    fn prompt_history<'a>(&self, history: &'a [ConversationMessage]) -> &'a [ConversationMessage] {
        self.policy.context_window(history, &self.counter)
    }

    /// Answer a question and record the exchange in its thread
    pub async fn ask_question(&self, question: &str, options: &AskOptions) -> RagResult<QuotedAnswer> {
        let thread_id = self.thread_id(options.thread.as_ref());
        log_operation_start!(
            "ask_question",
            thread_id = %thread_id,
            citations = options.use_citations,
            reranking = options.use_reranking
        );

        let result = self.answer(question, options, &thread_id).await;
        match &result {
            Ok(answer) => {
                log_operation_success!("ask_question", citations = answer.citations.len());
                self.record_exchange(&thread_id, question, &answer.answer).await;
            }
            Err(e) => {
                log_operation_error!("ask_question", e);
            }
        }

        result
    }

    async fn answer(&self, question: &str, options: &AskOptions, thread_id: &str) -> RagResult<QuotedAnswer> {
        let history = self.memory.load(thread_id).await?;

        if is_conversation_history_question(question) {
            let answer = self.generator.answer_from_history(question, &history).await?;
            return Ok(QuotedAnswer::plain(answer));
        }

        if !options.use_citations {
            let answer = self
                .generator
                .generate_plain(question, self.prompt_history(&history))
                .await?;
            return Ok(QuotedAnswer::plain(answer));
        }

        self.ensure_ready().await?;
        let retrieval = measure_async(
            "retrieve",
            self.retriever.retrieve(question, options.use_reranking),
        )
        .await?;

        if retrieval.results.is_empty() {
            return Ok(QuotedAnswer::plain(NO_DOCUMENTS_ANSWER));
        }

        let generation = measure_async(
            "generate_with_citations",
            self.generator
                .generate_with_citations(question, &retrieval.results, self.prompt_history(&history)),
        )
        .await?;

        Ok(generation.answer)
    }

    /// Streaming variant of [`ask_question`](Self::ask_question).
    ///
    /// Failures end the stream with an [`AnswerEvent::Error`]; citation events
    /// always follow the answer they support.
    pub fn stream_response<'a>(
        &'a self,
        question: &'a str,
        options: &'a AskOptions,
    ) -> impl Stream<Item = AnswerEvent> + 'a {
        stream! {
            let thread_id = self.thread_id(options.thread.as_ref());
            log_operation_start!("stream_response", thread_id = %thread_id);

            let history = match self.memory.load(&thread_id).await {
                Ok(history) => history,
                Err(e) => {
                    yield AnswerEvent::error(format!("An error occurred: {}", e));
                    return;
                }
            };

            if is_conversation_history_question(question) {
                yield AnswerEvent::status("🔍 Searching conversation history...");
                match self.generator.answer_from_history(question, &history).await {
                    Ok(answer) => {
                        yield AnswerEvent::Answer { content: answer.clone() };
                        if let Some(warning) = self.record_exchange(&thread_id, question, &answer).await {
                            yield AnswerEvent::warning(warning);
                        }
                    }
                    Err(e) => {
                        yield AnswerEvent::error(format!("An error occurred: {}", e));
                    }
                }
                return;
            }

            if !options.use_citations {
                yield AnswerEvent::status("🤖 Generating response...");
                let mut deltas = match self
                    .generator
                    .stream_plain(question, self.prompt_history(&history))
                    .await
                {
                    Ok(deltas) => deltas,
                    Err(e) => {
                        yield AnswerEvent::error(format!("An error occurred: {}", e));
                        return;
                    }
                };

                let mut full_answer = String::new();
                while let Some(delta) = deltas.next().await {
                    match delta {
                        Ok(text) => {
                            full_answer.push_str(&text);
                            yield AnswerEvent::Answer { content: text };
                        }
                        Err(e) => {
                            yield AnswerEvent::error(format!("An error occurred: {}", e));
                            return;
                        }
                    }
                }

                let answer = strip_reasoning(&full_answer);
                if let Some(warning) = self.record_exchange(&thread_id, question, answer.trim()).await {
                    yield AnswerEvent::warning(warning);
                }
                return;
            }

            yield AnswerEvent::status("🔍 Retrieving relevant documentation...");
            if let Err(e) = self.ensure_ready().await {
                yield AnswerEvent::error(e.to_string());
                return;
            }

            let retrieval = match measure_async(
                "retrieve",
                self.retriever.retrieve(question, options.use_reranking),
            )
            .await
            {
                Ok(retrieval) => retrieval,
                Err(e) => {
                    yield AnswerEvent::error(format!("An error occurred: {}", e));
                    return;
                }
            };

            if let Some(reason) = &retrieval.rerank_fallback {
                yield AnswerEvent::warning(format!("{}, using regular retrieval", reason));
            }

            if retrieval.results.is_empty() {
                yield AnswerEvent::error(NO_DOCUMENTS_ANSWER);
                return;
            }

            yield AnswerEvent::status(format!(
                "📄 Retrieved {} relevant documents",
                retrieval.results.len()
            ));
            yield AnswerEvent::status("📝 Generating response with citations...");

            let generation = match measure_async(
                "generate_with_citations",
                self.generator
                    .generate_with_citations(question, &retrieval.results, self.prompt_history(&history)),
            )
            .await
            {
                Ok(generation) => generation,
                Err(e) => {
                    yield AnswerEvent::error(format!("An error occurred: {}", e));
                    return;
                }
            };

            for warning in &generation.warnings {
                yield AnswerEvent::warning(warning.clone());
            }

            yield AnswerEvent::Answer { content: generation.answer.answer.clone() };

            for citation in &generation.answer.citations {
                let Some(cited) = retrieval.results.get(citation.source_id) else {
                    continue;
                };
                let chunk = &cited.chunk;
                yield AnswerEvent::Citation {
                    source_id: citation.source_id,
                    quote: citation.quote.clone(),
                    title: chunk.title_or_default().to_string(),
                    url: chunk.source_or_default().to_string(),
                };
            }

            if let Some(warning) = self
                .record_exchange(&thread_id, question, &generation.answer.answer)
                .await
            {
                yield AnswerEvent::warning(warning);
            }

            log_operation_success!("stream_response", citations = generation.answer.citations.len());
        }
    }

    /// Collect a streamed answer; mostly useful in tests and scripts
    pub async fn stream_to_vec(&self, question: &str, options: &AskOptions) -> Vec<AnswerEvent> {
        self.stream_response(question, options).collect().await
    }
}

/// `1234567` becomes `1,234,567`
pub fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }

    out
}
