//! Answer generation
//!
//! Builds prompts, calls the chat model and turns its output into a
//! [`QuotedAnswer`].

use crate::citations::{resolve_citations, ProposedCitation};
use crate::context::format_context;
use crate::llm_client::{ChatModel, PromptMessage, TextStream};
use crate::patterns;
use crate::types::{
    ConversationMessage, GenerationMode, MessageRole, QuotedAnswer, RagError, RagResult,
    SearchResult,
};
use cerebras_rag_core::GenerationConfig;
use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = r#"You are an expert assistant for Cerebras inference documentation.
Your job is to answer questions based ONLY on the provided documentation sources.

CITATION REQUIREMENTS:
- You MUST cite specific sources for each claim using the exact Source ID numbers provided
- Include VERBATIM quotes from the sources to support your answer
- If multiple sources support a point, cite all relevant ones
- NEVER make claims without proper citations

ANSWER REQUIREMENTS:
- Answer based ONLY on the provided sources - do not use external knowledge
- If the sources don't contain enough information, say so explicitly
- Be thorough but concise
- Use clear, professional language

OUTPUT FORMAT:
Respond with a single JSON object and nothing else:
{"answer": "<your answer>", "citations": [{"source_id": <integer Source ID>, "quote": "<verbatim quote from that source>"}]}

Sources:
"#;

/// Returned when the thread has no messages yet
pub const NO_HISTORY_ANSWER: &str =
    "I don't have any conversation history to reference. This appears to be the start of our conversation.";

/// Returned when retrieval finds nothing
pub const NO_DOCUMENTS_ANSWER: &str =
    "No relevant documents found. Please check if the vector database is populated.";

pub const STRUCTURED_FALLBACK_WARNING: &str =
    "Structured output could not be parsed; returning the raw answer without citations";

/// A generated answer plus non-fatal issues met on the way
#[derive(Debug, Clone)]
pub struct Generation {
    pub answer: QuotedAnswer,
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StructuredAnswer {
    answer: String,
    #[serde(default)]
    citations: Vec<ProposedCitation>,
}

/// Produces answers from retrieved context or conversation history
pub struct AnswerGenerator {
    model: Arc<dyn ChatModel>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn ChatModel>, config: GenerationConfig) -> Self {
        Self { model, config }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// Answer from `results` with citations into that batch
    pub async fn generate_with_citations(
        &self,
        question: &str,
        results: &[SearchResult],
        history: &[ConversationMessage],
    ) -> RagResult<Generation> {
        let messages = citation_messages(question, results, history);
        let raw = self.model.complete(messages).await?;

        match parse_structured_answer(&raw) {
            Ok(parsed) => {
                let proposed = parsed.citations.len();
                let citations =
                    resolve_citations(parsed.citations, results, self.config.verify_citations);
                debug!(
                    "Parsed structured answer with {}/{} usable citations",
                    citations.len(),
                    proposed
                );

                Ok(Generation {
                    answer: QuotedAnswer {
                        answer: parsed.answer,
                        citations,
                        mode: GenerationMode::Structured,
                    },
                    warnings: Vec::new(),
                })
            }
            Err(e) if self.config.structured_fallback => {
                warn!("{}: {}", STRUCTURED_FALLBACK_WARNING, e);
                Ok(Generation {
                    answer: QuotedAnswer {
                        answer: strip_reasoning(&raw).trim().to_string(),
                        citations: Vec::new(),
                        mode: GenerationMode::Unstructured,
                    },
                    warnings: vec![STRUCTURED_FALLBACK_WARNING.to_string()],
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Plain completion over prior conversation plus the question
    pub async fn generate_plain(
        &self,
        question: &str,
        history: &[ConversationMessage],
    ) -> RagResult<String> {
        let raw = self.model.complete(plain_messages(question, history)).await?;
        Ok(strip_reasoning(&raw).trim().to_string())
    }

    /// Streaming form of [`generate_plain`](Self::generate_plain)
    pub async fn stream_plain(
        &self,
        question: &str,
        history: &[ConversationMessage],
    ) -> RagResult<TextStream> {
        self.model.stream(plain_messages(question, history)).await
    }

    /// Answer a question about the conversation itself
    pub async fn answer_from_history(
        &self,
        question: &str,
        history: &[ConversationMessage],
    ) -> RagResult<String> {
        if history.is_empty() {
            return Ok(NO_HISTORY_ANSWER.to_string());
        }

        let prompt = history_prompt(question, history);
        let raw = self.model.complete(vec![PromptMessage::user(prompt)]).await?;
        Ok(strip_reasoning(&raw).trim().to_string())
    }
}

fn history_messages(history: &[ConversationMessage]) -> impl Iterator<Item = PromptMessage> + '_ {
    history.iter().map(|m| match m.role {
        MessageRole::User => PromptMessage::user(m.content.clone()),
        MessageRole::Assistant => PromptMessage::assistant(m.content.clone()),
    })
}

/// System prompt with sources, prior turns, then the question
pub fn citation_messages(
    question: &str,
    results: &[SearchResult],
    history: &[ConversationMessage],
) -> Vec<PromptMessage> {
    let system = format!("{}{}", SYSTEM_PROMPT, format_context(results));

    std::iter::once(PromptMessage::system(system))
        .chain(history_messages(history))
        .chain(std::iter::once(PromptMessage::user(question)))
        .collect()
}

/// Prior turns then the question
pub fn plain_messages(question: &str, history: &[ConversationMessage]) -> Vec<PromptMessage> {
    history_messages(history)
        .chain(std::iter::once(PromptMessage::user(question)))
        .collect()
}

/// Single prompt asking the model to answer from the transcript
pub fn history_prompt(question: &str, history: &[ConversationMessage]) -> String {
    let transcript = history
        .iter()
        .map(|m| format!("{}: {}", m.role.label(), m.content))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Based on our conversation history, please answer this question: {}\n\nConversation History:\n{}",
        question, transcript
    )
}

fn think_block() -> &'static Regex {
    static THINK: OnceLock<Regex> = OnceLock::new();
    THINK.get_or_init(|| patterns::regex(r"(?s)<think>.*?(?:</think>|$)"))
}

/// Remove `<think>` reasoning blocks some models emit before the answer
pub fn strip_reasoning(text: &str) -> String {
    think_block().replace_all(text, "").into_owned()
}

/// Parse the model's structured output.
///
/// Reasoning blocks are dropped and the first balanced JSON object with an
/// `answer` field is used, so Markdown code fences and surrounding prose are
/// tolerated.
fn parse_structured_answer(raw: &str) -> RagResult<StructuredAnswer> {
    let text = strip_reasoning(raw);

    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        // An unclosed brace in prose may precede the real object
        if let Some(len) = balanced_object_end(&text[start..]) {
            if let Ok(parsed) = serde_json::from_str::<StructuredAnswer>(&text[start..start + len]) {
                return Ok(parsed);
            }
        }
        search_from = start + 1;
    }

    let preview: String = text.trim().chars().take(120).collect();
    Err(RagError::MalformedOutput(format!(
        "expected a JSON object with an \"answer\" field, got: {}",
        preview
    )))
}

/// Byte length of the JSON object starting at `text[0] == '{'`, if it closes
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let parsed = parse_structured_answer(
            r#"{"answer": "Use an API key.", "citations": [{"source_id": 0, "quote": "API key"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.answer, "Use an API key.");
        assert_eq!(parsed.citations.len(), 1);
    }

    #[test]
    fn test_parse_with_reasoning_and_fences() {
        let raw = "<think>\nThe user wants {auth} info.\n</think>\n\nHere you go:\n```json\n{\"answer\": \"Send a {bearer} token.\", \"citations\": []}\n```";
        let parsed = parse_structured_answer(raw).unwrap();
        assert_eq!(parsed.answer, "Send a {bearer} token.");
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn test_parse_skips_unrelated_objects() {
        let raw = r#"Example: {"foo": 1} then {"answer": "ok"}"#;
        let parsed = parse_structured_answer(raw).unwrap();
        assert_eq!(parsed.answer, "ok");
    }

    #[test]
    fn test_parse_after_unclosed_brace() {
        let raw = "Templates use an opening { without a close. Answer:\n{\"answer\": \"ok\", \"citations\": []}";
        let parsed = parse_structured_answer(raw).unwrap();
        assert_eq!(parsed.answer, "ok");
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn test_parse_rejects_prose() {
        let err = parse_structured_answer("The answer is to use an API key.").unwrap_err();
        assert!(matches!(err, RagError::MalformedOutput(_)));

        let err = parse_structured_answer(r#"{"answer": "unterminated"#).unwrap_err();
        assert!(matches!(err, RagError::MalformedOutput(_)));
    }

    #[test]
    fn test_strip_unclosed_reasoning() {
        assert_eq!(strip_reasoning("<think>still thinking"), "");
        assert_eq!(strip_reasoning("a<think>x</think>b"), "ab");
    }

    #[test]
    fn test_history_prompt_format() {
        let history = vec![
            ConversationMessage::user("What models exist?"),
            ConversationMessage::assistant("Llama and Qwen."),
        ];
        assert_eq!(
            history_prompt("What was my first question?", &history),
            "Based on our conversation history, please answer this question: What was my first question?\n\nConversation History:\nHuman: What models exist?\nAssistant: Llama and Qwen."
        );
    }

    #[test]
    fn test_message_layout() {
        let history = vec![ConversationMessage::user("hi"), ConversationMessage::assistant("hello")];

        let plain = plain_messages("next", &history);
        assert_eq!(plain.len(), 3);
        assert_eq!(plain[2], PromptMessage::user("next"));

        let cited = citation_messages("next", &[], &history);
        assert_eq!(cited.len(), 4);
        assert!(cited[0].content.starts_with("You are an expert assistant"));
        assert_eq!(cited[1], PromptMessage::user("hi"));
        assert_eq!(cited[2], PromptMessage::assistant("hello"));
    }
}
