//! Query validation and normalization.

use std::collections::HashSet;

use crate::domain::errors::ValidationError;

/// Fewest queries a batch accepts.
pub const MIN_QUERIES: usize = 2;
/// Most queries a batch accepts.
pub const MAX_QUERIES: usize = 5;
/// Integration prompt limit, in characters.
pub const MAX_PROMPT_CHARS: usize = 1000;

/// Check query count and reject blank entries.
pub fn validate_queries<S: AsRef<str>>(queries: &[S]) -> Result<(), ValidationError> {
    if !(MIN_QUERIES..=MAX_QUERIES).contains(&queries.len()) {
        return Err(ValidationError::QueryCount {
            actual: queries.len(),
            min: MIN_QUERIES,
            max: MAX_QUERIES,
        });
    }

    if let Some(index) = queries.iter().position(|q| q.as_ref().trim().is_empty()) {
        return Err(ValidationError::EmptyQuery { number: index + 1 });
    }

    Ok(())
}

/// Reject blank prompts and prompts over [`MAX_PROMPT_CHARS`].
pub fn validate_integration_prompt(prompt: &str) -> Result<(), ValidationError> {
    if prompt.trim().is_empty() {
        return Err(ValidationError::EmptyPrompt);
    }

    let len = prompt.chars().count();
    if len > MAX_PROMPT_CHARS {
        return Err(ValidationError::PromptTooLong {
            len,
            max: MAX_PROMPT_CHARS,
        });
    }

    Ok(())
}

/// Split free text into queries: one per line, trimmed, blanks dropped,
/// at most `MAX_QUERIES` kept.
pub fn normalize_queries(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(MAX_QUERIES)
        .map(ToString::to_string)
        .collect()
}

/// Positions (zero-based) of queries that repeat an earlier one,
/// ignoring case and surrounding whitespace.
pub fn duplicate_queries<S: AsRef<str>>(queries: &[S]) -> Vec<usize> {
    let mut seen = HashSet::new();
    queries
        .iter()
        .enumerate()
        .filter(|(_, q)| !seen.insert(q.as_ref().trim().to_lowercase()))
        .map(|(index, _)| index)
        .collect()
}
