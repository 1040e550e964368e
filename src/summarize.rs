//! Abstractive summaries of long texts.
//!
//! Summarization models accept a limited input, so text longer than the
//! profile's `max_input_words` is split into word-bounded chunks, each chunk
//! is summarized, and the partial summaries are joined. A joined summary that
//! is still longer than requested gets one more pass.

use crate::defaults;
use crate::engine::SummaryEngine;
use crate::error::Result;
use crate::record::{Record, RecordKind};
use crate::store::Store;
use std::collections::HashMap;
use std::sync::Arc;

/// Bounds and hints for one summarization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOptions {
    pub max_words: usize,
    pub min_words: usize,
    /// Language of the text; picks the profile. Falls back to the record's
    /// language when summarizing a stored record.
    pub language: Option<String>,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            max_words: defaults::SUMMARY_MAX_WORDS,
            min_words: defaults::SUMMARY_MIN_WORDS,
            language: None,
        }
    }
}

/// A summarization configuration: which model, and how much input it takes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryProfile {
    pub name: String,
    pub model: String,
    pub max_input_words: usize,
}

impl SummaryProfile {
    pub fn new(name: &str, model: &str, max_input_words: usize) -> Self {
        Self {
            name: name.to_string(),
            model: model.to_string(),
            max_input_words: max_input_words.max(1),
        }
    }
}

struct Backend {
    profile: SummaryProfile,
    engine: Arc<dyn SummaryEngine>,
}

/// Routes texts to a summarization profile by language and runs the
/// chunk, summarize, join, compress sequence.
pub struct Summarizer {
    default: Backend,
    backends: HashMap<String, Backend>,
    languages: HashMap<String, String>,
}

impl Summarizer {
    /// Summarizer whose every language uses `profile`.
    pub fn new(profile: SummaryProfile, engine: Arc<dyn SummaryEngine>) -> Self {
        Self {
            default: Backend { profile, engine },
            backends: HashMap::new(),
            languages: HashMap::new(),
        }
    }

    /// Add (or replace) a profile and the engine serving it.
    pub fn with_profile(mut self, profile: SummaryProfile, engine: Arc<dyn SummaryEngine>) -> Self {
        if profile.name == self.default.profile.name {
            self.default = Backend { profile, engine };
        } else {
            self.backends
                .insert(profile.name.clone(), Backend { profile, engine });
        }
        self
    }

    /// Send texts in `language` to the profile named `profile`.
    pub fn route_language(mut self, language: &str, profile: &str) -> Self {
        self.languages
            .insert(language.trim().to_lowercase(), profile.to_string());
        self
    }

    /// Profile used for text in `language`.
    pub fn profile_for(&self, language: Option<&str>) -> &SummaryProfile {
        &self.backend_for(language).profile
    }

    fn backend_for(&self, language: Option<&str>) -> &Backend {
        language
            .map(|l| l.trim().to_lowercase())
            .and_then(|l| self.languages.get(&l))
            .and_then(|name| self.backends.get(name))
            .unwrap_or(&self.default)
    }

    /// Summarize `text`. Returns `Ok(None)` without calling the engine when
    /// there is no text.
    pub fn summarize(&self, text: Option<&str>, options: &SummaryOptions) -> Result<Option<String>> {
        let text = normalize_whitespace(text.unwrap_or_default());
        if text.is_empty() {
            return Ok(None);
        }

        let backend = self.backend_for(options.language.as_deref());
        let chunks = chunk_words(&text, backend.profile.max_input_words);
        log::info!(
            "Summarizing {} word(s) in {} chunk(s) with profile {} ({})",
            text.split(' ').count(),
            chunks.len(),
            backend.profile.name,
            backend.engine.model_name()
        );

        let partials = chunks
            .iter()
            .map(|chunk| {
                backend
                    .engine
                    .summarize(chunk, options.max_words, options.min_words)
            })
            .collect::<Result<Vec<_>>>()?;
        let joined = partials.join(" ");

        let summary = if word_count(&joined) > options.max_words {
            log::debug!(
                "Joined summary has {} words, compressing to {}",
                word_count(&joined),
                options.max_words
            );
            backend
                .engine
                .summarize(&joined, options.max_words, options.min_words)?
        } else {
            joined
        };

        Ok(Some(summary))
    }

    /// Summarize a stored record's text and save the summary on it.
    ///
    /// Records without text are returned unchanged.
    pub fn summarize_record(
        &self,
        store: &dyn Store,
        kind: RecordKind,
        id: i64,
        options: &SummaryOptions,
    ) -> Result<Record> {
        let mut record = store.get_record(kind, id)?;
        let options = SummaryOptions {
            language: options.language.clone().or_else(|| record.language.clone()),
            ..options.clone()
        };

        match self.summarize(record.full.as_deref(), &options)? {
            Some(summary) => {
                record.summary = Some(summary);
                store.update_record(&record)
            }
            None => {
                log::warn!("{} {} has no text to summarize", kind, id);
                Ok(record)
            }
        }
    }
}

/// Collapse whitespace runs to single spaces and trim.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split `text` greedily into chunks of at most `max_words` words.
///
/// Joining the chunks with single spaces reproduces the whitespace-normalized
/// input.
pub fn chunk_words(text: &str, max_words: usize) -> Vec<String> {
    let max_words = max_words.max(1);
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    words.chunks(max_words).map(|chunk| chunk.join(" ")).collect()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::MockSummaryEngine;
    use crate::error::SmartsumError;
    use crate::record::NewRecord;
    use crate::store::MemoryStore;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    fn summarizer(engine: &MockSummaryEngine, max_input_words: usize) -> Summarizer {
        Summarizer::new(
            SummaryProfile::new(defaults::GENERAL_PROFILE, "general", max_input_words),
            Arc::new(engine.clone()),
        )
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a \n\t b   c  "), "a b c");
        assert_eq!(normalize_whitespace(" \n "), "");
    }

    #[test]
    fn test_exact_limit_is_one_chunk() {
        let chunks = chunk_words(&words(10), 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_one_over_limit_is_two_chunks_without_loss() {
        let text = words(11);
        let chunks = chunk_words(&text, 10);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "w10");
        assert_eq!(chunks.join(" "), text);
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let text = words(1234);
        assert_eq!(chunk_words(&text, 100), chunk_words(&text, 100));
        assert_eq!(chunk_words(&text, 100).len(), 13);
    }

    #[test]
    fn test_empty_text_is_noop() {
        let engine = MockSummaryEngine::new("m");
        let summarizer = summarizer(&engine, 10);

        assert_eq!(
            summarizer
                .summarize(None, &SummaryOptions::default())
                .unwrap(),
            None
        );
        assert_eq!(
            summarizer
                .summarize(Some("  \n "), &SummaryOptions::default())
                .unwrap(),
            None
        );
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn test_short_text_is_one_call() {
        let engine = MockSummaryEngine::new("m");
        let summary = summarizer(&engine, 10)
            .summarize(Some("a   b\nc"), &SummaryOptions::default())
            .unwrap();
        assert_eq!(summary.as_deref(), Some("a b c"));
        assert_eq!(engine.calls(), vec!["a b c".to_string()]);
    }

    #[test]
    fn test_chunk_summaries_are_joined_in_order() {
        let engine = MockSummaryEngine::new("m");
        let options = SummaryOptions {
            max_words: 2,
            min_words: 1,
            language: None,
        };
        // 3 chunks of 4 words; mock keeps 2 words each, joined = 6 > 2 so one more pass
        let summary = summarizer(&engine, 4)
            .summarize(Some(&words(12)), &options)
            .unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0], "w0 w1 w2 w3");
        assert_eq!(calls[3], "w0 w1 w4 w5 w8 w9");
        assert_eq!(summary.as_deref(), Some("w0 w1"));
    }

    #[test]
    fn test_no_compression_when_within_bounds() {
        let engine = MockSummaryEngine::new("m");
        let options = SummaryOptions {
            max_words: 10,
            min_words: 1,
            language: None,
        };
        let summary = summarizer(&engine, 4)
            .summarize(Some(&words(8)), &options)
            .unwrap();
        assert_eq!(engine.calls().len(), 2);
        assert_eq!(summary.as_deref(), Some(words(8).as_str()));
    }

    #[test]
    fn test_language_routes_to_profile() {
        let general = MockSummaryEngine::new("general");
        let multilingual = MockSummaryEngine::new("multilingual");
        let summarizer = summarizer(&general, 700)
            .with_profile(
                SummaryProfile::new(defaults::MULTILINGUAL_PROFILE, "aya", 400),
                Arc::new(multilingual.clone()),
            )
            .route_language("he", defaults::MULTILINGUAL_PROFILE)
            .route_language("fa", defaults::MULTILINGUAL_PROFILE);

        assert_eq!(summarizer.profile_for(Some("he")).max_input_words, 400);
        assert_eq!(summarizer.profile_for(Some("FA")).model, "aya");
        assert_eq!(summarizer.profile_for(Some("en")).model, "general");
        assert_eq!(summarizer.profile_for(None).model, "general");

        let options = SummaryOptions {
            language: Some("he".to_string()),
            ..SummaryOptions::default()
        };
        summarizer.summarize(Some("shalom"), &options).unwrap();
        assert_eq!(multilingual.calls().len(), 1);
        assert!(general.calls().is_empty());
    }

    #[test]
    fn test_engine_failure_propagates() {
        let engine = MockSummaryEngine::new("m").with_failure();
        let result = summarizer(&engine, 10).summarize(Some("text"), &SummaryOptions::default());
        assert!(matches!(result, Err(SmartsumError::Summarization { .. })));
    }

    #[test]
    fn test_summarize_record_stores_summary() {
        let store = MemoryStore::new();
        let record = store
            .create_record(NewRecord {
                kind: RecordKind::Transcript,
                title: None,
                media_id: None,
                transcript_id: None,
                language: Some("en".to_string()),
                full: Some("one two three".to_string()),
            })
            .unwrap();
        let engine = MockSummaryEngine::new("m");

        let updated = summarizer(&engine, 10)
            .summarize_record(
                &store,
                RecordKind::Transcript,
                record.id,
                &SummaryOptions::default(),
            )
            .unwrap();

        assert_eq!(updated.summary.as_deref(), Some("one two three"));
        let stored = store.get_record(RecordKind::Transcript, record.id).unwrap();
        assert_eq!(stored.summary.as_deref(), Some("one two three"));
    }

    #[test]
    fn test_summarize_record_without_text_is_unchanged() {
        let store = MemoryStore::new();
        let record = store
            .create_record(NewRecord {
                kind: RecordKind::Transcript,
                title: None,
                media_id: None,
                transcript_id: None,
                language: None,
                full: None,
            })
            .unwrap();
        let engine = MockSummaryEngine::new("m");

        let updated = summarizer(&engine, 10)
            .summarize_record(
                &store,
                RecordKind::Transcript,
                record.id,
                &SummaryOptions::default(),
            )
            .unwrap();
        assert_eq!(updated.summary, None);
        assert!(engine.calls().is_empty());
    }
}
