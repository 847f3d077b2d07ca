//! Prompt context formatting
//!
//! Each retrieved chunk is tagged with its position in the batch. Citations
//! refer back to chunks through that position, so formatting must be a pure
//! function of the chunk list.

use crate::patterns::regex as compile;
use crate::types::SearchResult;
use regex::{Captures, Regex};
use std::sync::OnceLock;

const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

struct CleanPatterns {
    spaced_letters: Regex,
    underscores: Regex,
    whitespace: Regex,
    open_paren: Regex,
    close_paren: Regex,
    punctuation: Regex,
}

fn patterns() -> &'static CleanPatterns {
    static PATTERNS: OnceLock<CleanPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| CleanPatterns {
        spaced_letters: compile(r"(?:\b[A-Za-z]\s){2,}\b[A-Za-z]"),
        underscores: compile(r"\s*_+\s*"),
        whitespace: compile(r"\s+"),
        open_paren: compile(r"\(\s+"),
        close_paren: compile(r"\s+\)"),
        punctuation: compile(r"\s*([:;,.$])\s*"),
    })
}

/// Normalize a scraped documentation snippet.
///
/// Joins spaced-out letters (`a p i` becomes `api`), turns underscore runs
/// into spaces, collapses whitespace, tightens bracket spacing, puts a single
/// space after `: ; , . $` and removes backslashes.
pub fn clean_snippet(text: &str) -> String {
    let p = patterns();

    let text = p.spaced_letters.replace_all(text, |caps: &Captures| {
        caps[0].chars().filter(|c| !c.is_whitespace()).collect::<String>()
    });
    let text = p.underscores.replace_all(&text, " ");
    let text = p.whitespace.replace_all(&text, " ");
    let text = p.open_paren.replace_all(&text, "(");
    let text = p.close_paren.replace_all(&text, ")");
    let text = p.punctuation.replace_all(&text, "${1} ");

    text.replace('\\', "").trim().to_string()
}

/// Render one chunk block
fn format_chunk(source_id: usize, result: &SearchResult) -> String {
    format!(
        "Source ID: {}\nDocument Title: {}\nSource: {}\nContent: {}",
        source_id,
        result.chunk.title_or_default(),
        result.chunk.source_or_default(),
        clean_snippet(&result.chunk.text)
    )
}

/// Join all chunks into the prompt's source block, numbered from 0
pub fn format_context(results: &[SearchResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format_chunk(i, result))
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR)
}
