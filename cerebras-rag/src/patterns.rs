//! Built-in regular expressions
//!
//! Every pattern compiled here is a constant of this crate; a compile
//! failure is a programming error and panics on first use.

use regex::{Regex, RegexSet};

pub(crate) fn regex(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(e) => panic!("invalid built-in pattern {pattern}: {e}"),
    }
}

pub(crate) fn regex_set(patterns: &[&str]) -> RegexSet {
    match RegexSet::new(patterns) {
        Ok(set) => set,
        Err(e) => panic!("invalid built-in pattern set: {e}"),
    }
}
