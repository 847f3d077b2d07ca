//! Citation resolution
//!
//! The model proposes `{source_id, quote}` pairs. Only pairs pointing into
//! the current retrieval batch survive; quote verification is opt-in.

use crate::context::clean_snippet;
use crate::types::{Citation, SearchResult};
use serde::Deserialize;
use tracing::warn;

/// A citation as proposed by the model, before validation
#[derive(Debug, Clone, Deserialize)]
pub struct ProposedCitation {
    /// Usually an integer, but models sometimes quote it
    #[serde(default)]
    pub source_id: serde_json::Value,
    #[serde(default)]
    pub quote: String,
}

impl ProposedCitation {
    fn source_index(&self) -> Option<usize> {
        match &self.source_id {
            serde_json::Value::Number(n) => n.as_u64().and_then(|v| usize::try_from(v).ok()),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Keep citations that reference a chunk in `results`.
///
/// With `verify_quotes`, a citation also needs its quote to occur in the cited
/// chunk once both are normalized.
pub fn resolve_citations(
    proposed: Vec<ProposedCitation>,
    results: &[SearchResult],
    verify_quotes: bool,
) -> Vec<Citation> {
    proposed
        .into_iter()
        .filter_map(|candidate| {
            let Some(source_id) = candidate.source_index().filter(|id| *id < results.len()) else {
                warn!(
                    source_id = %candidate.source_id,
                    batch_size = results.len(),
                    "Dropping citation outside the retrieval batch"
                );
                return None;
            };

            if verify_quotes && !quote_occurs_in(&candidate.quote, &results[source_id].chunk.text) {
                warn!(source_id, "Dropping citation whose quote is not in the cited source");
                return None;
            }

            Some(Citation {
                source_id,
                quote: candidate.quote,
            })
        })
        .collect()
}

fn normalize_for_match(text: &str) -> String {
    clean_snippet(text)
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether `quote` appears in `source`, ignoring case, punctuation and spacing
pub fn quote_occurs_in(quote: &str, source: &str) -> bool {
    let quote = normalize_for_match(quote);
    !quote.is_empty() && normalize_for_match(source).contains(&quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DocumentChunk;
    use std::collections::HashMap;

    fn batch(texts: &[&str]) -> Vec<SearchResult> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| SearchResult {
                chunk: DocumentChunk {
                    id: i.to_string(),
                    text: text.to_string(),
                    source: None,
                    title: None,
                    chunk_index: None,
                    metadata: HashMap::new(),
                },
                score: 1.0,
            })
            .collect()
    }

    fn proposed(source_id: serde_json::Value, quote: &str) -> ProposedCitation {
        ProposedCitation {
            source_id,
            quote: quote.to_string(),
        }
    }

    #[test]
    fn test_out_of_range_citations_are_dropped() {
        let results = batch(&["alpha", "beta"]);
        let citations = resolve_citations(
            vec![
                proposed(serde_json::json!(0), "alpha"),
                proposed(serde_json::json!(2), "gamma"),
                proposed(serde_json::json!(-1), "neg"),
                proposed(serde_json::json!("1"), "beta"),
                proposed(serde_json::Value::Null, "none"),
            ],
            &results,
            false,
        );

        assert_eq!(
            citations,
            vec![
                Citation {
                    source_id: 0,
                    quote: "alpha".to_string()
                },
                Citation {
                    source_id: 1,
                    quote: "beta".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_unverified_quotes_are_trusted() {
        let results = batch(&["The API key goes in the Authorization header."]);
        let citations = resolve_citations(
            vec![proposed(serde_json::json!(0), "something else entirely")],
            &results,
            false,
        );
        assert_eq!(citations.len(), 1);
    }

    #[test]
    fn test_verification_checks_quote_text() {
        let results = batch(&["The API key goes in the   Authorization header."]);
        let citations = resolve_citations(
            vec![
                proposed(serde_json::json!(0), "the api key goes in the authorization header"),
                proposed(serde_json::json!(0), "something else entirely"),
            ],
            &results,
            true,
        );
        assert_eq!(citations.len(), 1);
        assert!(citations[0].quote.starts_with("the api key"));
    }

    #[test]
    fn test_empty_quote_never_verifies() {
        assert!(!quote_occurs_in("", "anything"));
    }
}
