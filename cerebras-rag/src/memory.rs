//! Conversation memory
//!
//! Threads of user/assistant messages keyed by a caller-supplied id, kept in
//! memory or as one JSON document per thread on disk.

use crate::patterns;
use crate::token_counter::TokenCounter;
use crate::types::{ConversationMessage, ConversationThread, RagError, RagResult};
use async_trait::async_trait;
use cerebras_rag_core::MemoryConfig;
use chrono::Utc;
use regex::RegexSet;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Bounds on what a thread keeps and what of it reaches the prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryPolicy {
    /// Messages kept per thread, oldest evicted first; `None` keeps all
    pub max_messages: Option<usize>,
    /// Token budget for prior conversation sent to the model
    pub max_context_tokens: usize,
}

impl From<&MemoryConfig> for HistoryPolicy {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            max_messages: (config.max_history_messages > 0).then_some(config.max_history_messages),
            max_context_tokens: config.max_context_tokens,
        }
    }
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self::from(&MemoryConfig::default())
    }
}

impl HistoryPolicy {
    /// Drop the oldest messages beyond `max_messages`
    pub fn evict(&self, messages: &mut Vec<ConversationMessage>) {
        if let Some(max) = self.max_messages {
            if messages.len() > max {
                let excess = messages.len() - max;
                messages.drain(0..excess);
                debug!("Evicted {} old messages from thread", excess);
            }
        }
    }

    /// The most recent suffix of `messages` that fits the token budget
    pub fn context_window<'a>(
        &self,
        messages: &'a [ConversationMessage],
        counter: &TokenCounter,
    ) -> &'a [ConversationMessage] {
        let mut used = 0usize;
        let mut start = messages.len();

        for (i, message) in messages.iter().enumerate().rev() {
            let cost = counter.count_message_tokens(&message.content);
            if used + cost > self.max_context_tokens {
                break;
            }
            used += cost;
            start = i;
        }

        &messages[start..]
    }
}

/// Persistence for conversation threads
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Messages of a thread in order; empty for unknown threads
    async fn load(&self, thread_id: &str) -> RagResult<Vec<ConversationMessage>>;

    /// Append messages to a thread, creating it if needed
    async fn append(&self, thread_id: &str, messages: Vec<ConversationMessage>) -> RagResult<()>;

    async fn list_threads(&self) -> RagResult<Vec<String>>;

    async fn clear(&self, thread_id: &str) -> RagResult<()>;
}

/// Threads kept for the lifetime of the process
pub struct InMemoryConversationStore {
    threads: RwLock<HashMap<String, ConversationThread>>,
    policy: HistoryPolicy,
}

impl InMemoryConversationStore {
    pub fn new(policy: HistoryPolicy) -> Self {
        Self {
            threads: RwLock::new(HashMap::new()),
            policy,
        }
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, thread_id: &str) -> RagResult<Vec<ConversationMessage>> {
        let threads = self.threads.read().await;
        Ok(threads
            .get(thread_id)
            .map(|t| t.messages.clone())
            .unwrap_or_default())
    }

    async fn append(&self, thread_id: &str, messages: Vec<ConversationMessage>) -> RagResult<()> {
        let mut threads = self.threads.write().await;
        let thread = threads
            .entry(thread_id.to_string())
            .or_insert_with(|| ConversationThread::new(thread_id));

        thread.messages.extend(messages);
        thread.updated_at = Utc::now();
        self.policy.evict(&mut thread.messages);
        Ok(())
    }

    async fn list_threads(&self) -> RagResult<Vec<String>> {
        let threads = self.threads.read().await;
        let mut ids: Vec<String> = threads.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    async fn clear(&self, thread_id: &str) -> RagResult<()> {
        self.threads.write().await.remove(thread_id);
        Ok(())
    }
}

/// Threads stored as `<dir>/<thread>.json`
pub struct FileConversationStore {
    dir: PathBuf,
    policy: HistoryPolicy,
    lock: RwLock<()>,
}

impl FileConversationStore {
    pub async fn new(dir: impl Into<PathBuf>, policy: HistoryPolicy) -> RagResult<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        info!("Conversation history stored in {:?}", dir);

        Ok(Self {
            dir,
            policy,
            lock: RwLock::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn thread_path(&self, thread_id: &str) -> PathBuf {
        let file_stem: String = thread_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.json", file_stem))
    }

    async fn read_thread(&self, path: &Path) -> RagResult<Option<ConversationThread>> {
        match tokio::fs::read_to_string(path).await {
            Ok(data) => Ok(Some(serde_json::from_str(&data)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(RagError::Io(e)),
        }
    }
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    async fn load(&self, thread_id: &str) -> RagResult<Vec<ConversationMessage>> {
        let _guard = self.lock.read().await;
        Ok(self
            .read_thread(&self.thread_path(thread_id))
            .await?
            .filter(|t| t.thread_id == thread_id)
            .map(|t| t.messages)
            .unwrap_or_default())
    }

    async fn append(&self, thread_id: &str, messages: Vec<ConversationMessage>) -> RagResult<()> {
        let _guard = self.lock.write().await;
        let path = self.thread_path(thread_id);

        let mut thread = match self.read_thread(&path).await? {
            Some(existing) if existing.thread_id == thread_id => existing,
            Some(_) => {
                return Err(RagError::Memory(format!(
                    "Thread id '{}' collides with another thread's file {:?}",
                    thread_id, path
                )))
            }
            None => ConversationThread::new(thread_id),
        };

        thread.messages.extend(messages);
        thread.updated_at = Utc::now();
        self.policy.evict(&mut thread.messages);

        let data = serde_json::to_string_pretty(&thread)?;
        tokio::fs::write(&path, data).await?;

        debug!("Saved thread {} ({} messages)", thread_id, thread.messages.len());
        Ok(())
    }

    async fn list_threads(&self) -> RagResult<Vec<String>> {
        let _guard = self.lock.read().await;
        let mut ids = Vec::new();

        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(thread) = self.read_thread(&path).await? {
                ids.push(thread.thread_id);
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn clear(&self, thread_id: &str) -> RagResult<()> {
        let _guard = self.lock.write().await;
        match tokio::fs::remove_file(self.thread_path(thread_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::Io(e)),
        }
    }
}

/// Store selected by configuration: file-backed when `persist_dir` is set
pub async fn store_from_config(config: &MemoryConfig) -> RagResult<Box<dyn ConversationStore>> {
    let policy = HistoryPolicy::from(config);
    match &config.persist_dir {
        Some(dir) => Ok(Box::new(FileConversationStore::new(dir, policy).await?)),
        None => Ok(Box::new(InMemoryConversationStore::new(policy))),
    }
}

const HISTORY_PATTERNS: &[&str] = &[
    r"\bfirst message\b",
    r"\bearlier\b",
    r"\bprevious\b",
    r"\bwhat did i (say|ask|tell)\b",
    r"\bmy (first|last|previous) (message|question)\b",
    r"\bour conversation\b",
    r"\bhistory\b",
    r"\bbefore\b",
    r"\bremember when\b",
    r"\bi (said|asked|told)\b",
    r"\byou (said|told|answered)\b",
];

/// Whether the question is about the conversation rather than the docs
pub fn is_conversation_history_question(question: &str) -> bool {
    static PATTERNS: OnceLock<RegexSet> = OnceLock::new();
    let set = PATTERNS.get_or_init(|| patterns::regex_set(HISTORY_PATTERNS));

    set.is_match(&question.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn policy(max_messages: Option<usize>) -> HistoryPolicy {
        HistoryPolicy {
            max_messages,
            max_context_tokens: 4000,
        }
    }

    #[test]
    fn test_zero_cap_means_unbounded() {
        let mut config = MemoryConfig::default();
        assert_eq!(HistoryPolicy::from(&config).max_messages, Some(100));

        config.max_history_messages = 0;
        assert_eq!(HistoryPolicy::from(&config).max_messages, None);
    }

    #[test]
    fn test_history_question_detection() {
        assert!(is_conversation_history_question("What was my first message?"));
        assert!(is_conversation_history_question("What did I ask EARLIER?"));
        assert!(is_conversation_history_question("Summarize our conversation"));
        assert!(is_conversation_history_question("You said something about tokens"));
        assert!(!is_conversation_history_question(
            "How do I authenticate with the Cerebras API?"
        ));
        assert!(!is_conversation_history_question("Explain the histogram endpoint"));
    }

    #[tokio::test]
    async fn test_in_memory_store_keeps_order_and_evicts() {
        let store = InMemoryConversationStore::new(policy(Some(3)));

        store
            .append("t", vec![ConversationMessage::user("q1"), ConversationMessage::assistant("a1")])
            .await
            .unwrap();
        store
            .append("t", vec![ConversationMessage::user("q2"), ConversationMessage::assistant("a2")])
            .await
            .unwrap();

        let contents: Vec<String> = store
            .load("t")
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["a1", "q2", "a2"]);
        assert!(store.load("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileConversationStore::new(temp_dir.path(), policy(None))
            .await
            .unwrap();

        store
            .append("cli session/1", vec![ConversationMessage::user("hello")])
            .await
            .unwrap();
        store
            .append("cli session/1", vec![ConversationMessage::assistant("hi")])
            .await
            .unwrap();

        // A fresh store over the same directory sees the persisted thread
        let reopened = FileConversationStore::new(temp_dir.path(), policy(None))
            .await
            .unwrap();
        let messages = reopened.load("cli session/1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "hi");
        assert_eq!(reopened.list_threads().await.unwrap(), vec!["cli session/1"]);

        reopened.clear("cli session/1").await.unwrap();
        assert!(reopened.load("cli session/1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_store_rejects_colliding_ids() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileConversationStore::new(temp_dir.path(), policy(None))
            .await
            .unwrap();

        store.append("a/b", vec![ConversationMessage::user("x")]).await.unwrap();
        let err = store
            .append("a_b", vec![ConversationMessage::user("y")])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Memory(_)));
        assert!(store.load("a_b").await.unwrap().is_empty());
    }

    #[test]
    fn test_context_window_keeps_most_recent() {
        let counter = TokenCounter::new("cl100k_base").unwrap();
        let messages: Vec<ConversationMessage> = (0..10)
            .map(|i| ConversationMessage::user(format!("message number {}", i)))
            .collect();

        let per_message = counter.count_message_tokens("message number 0");
        let policy = HistoryPolicy {
            max_messages: None,
            max_context_tokens: per_message * 3,
        };

        let window = policy.context_window(&messages, &counter);
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].content, "message number 7");

        let none = HistoryPolicy {
            max_messages: None,
            max_context_tokens: 0,
        };
        assert!(none.context_window(&messages, &counter).is_empty());
    }
}
