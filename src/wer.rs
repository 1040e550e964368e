//! Word error rate between a reference text and a hypothesis.
//!
//! Both texts go through the same normalization (lowercase, whitespace
//! collapse, strip, punctuation removal) before a word-level edit distance is
//! taken. The reference word count is the denominator, so argument order
//! matters.

use crate::error::{Result, SmartsumError};
use regex::Regex;
use std::sync::LazyLock;

// SAFETY: hardcoded pattern, always valid
#[allow(clippy::expect_used)]
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{P}").expect("hardcoded punctuation pattern"));

/// Breakdown of a WER computation.
#[derive(Debug, Clone, PartialEq)]
pub struct WerReport {
    pub reference_words: usize,
    pub hypothesis_words: usize,
    /// Substitutions + deletions + insertions of the best alignment.
    pub edits: usize,
    /// Error rate in percent, rounded to 2 decimals.
    pub wer: f64,
}

/// Normalize text into comparable word tokens.
pub fn normalize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    PUNCTUATION
        .replace_all(collapsed.trim(), "")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Score `hypothesis` against `reference`.
///
/// # Errors
/// Returns `SmartsumError::EmptyReference` if the reference normalizes to no
/// words, since the ratio has no denominator.
pub fn score(reference: &str, hypothesis: &str) -> Result<WerReport> {
    let reference_words = normalize(reference);
    if reference_words.is_empty() {
        return Err(SmartsumError::EmptyReference);
    }
    let hypothesis_words = normalize(hypothesis);

    let edits = strsim::generic_levenshtein(&reference_words, &hypothesis_words);
    let ratio = edits as f64 / reference_words.len() as f64;

    Ok(WerReport {
        reference_words: reference_words.len(),
        hypothesis_words: hypothesis_words.len(),
        edits,
        wer: round2(ratio * 100.0),
    })
}

/// Word error rate of `hypothesis` against `reference`, in percent.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> Result<f64> {
    let report = score(reference, hypothesis)?;
    log::debug!(
        "WER {}% ({} edits over {} reference words)",
        report.wer,
        report.edits,
        report.reference_words
    );
    Ok(report.wer)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
