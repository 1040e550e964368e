//! Translation of finished transcripts with a text-to-text engine.

use crate::clock::{Clock, SystemClock};
use crate::engine::TextTranslator;
use crate::error::{Result, SmartsumError};
use crate::record::{NewRecord, Record, RecordKind};
use crate::store::Store;
use std::sync::Arc;

pub struct TextTranslation {
    store: Arc<dyn Store>,
    translator: Arc<dyn TextTranslator>,
    clock: Arc<dyn Clock>,
}

impl TextTranslation {
    pub fn new(store: Arc<dyn Store>, translator: Arc<dyn TextTranslator>) -> Self {
        Self {
            store,
            translator,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Create one translation per transcript, translated from the
    /// transcript's language into `target`.
    ///
    /// Transcripts without text are skipped. The created translations carry
    /// no segments.
    ///
    /// # Errors
    /// Fails on the first record that is not a transcript, has no language,
    /// or whose translation fails. Translations created before that are kept.
    pub fn translate_records(&self, transcripts: &[Record], target: &str) -> Result<Vec<Record>> {
        let mut created = Vec::with_capacity(transcripts.len());

        for transcript in transcripts {
            if transcript.kind != RecordKind::Transcript {
                return Err(SmartsumError::Translation {
                    message: format!(
                        "{} {} is not a transcript",
                        transcript.kind, transcript.id
                    ),
                });
            }

            let Some(text) = transcript.full.as_deref().filter(|t| !t.trim().is_empty()) else {
                log::warn!(
                    "Skipping transcript {}: no text to translate",
                    transcript.id
                );
                continue;
            };

            let source = transcript
                .language
                .as_deref()
                .ok_or_else(|| SmartsumError::Translation {
                    message: format!("transcript {} has no language", transcript.id),
                })?;

            log::info!(
                "Translating transcript {} ({} -> {}) with {}",
                transcript.id,
                source,
                target,
                self.translator.name()
            );

            let ts_start = self.clock.now();
            let translated = self.translator.translate(text, source, target)?;
            let ts_end = self.clock.now();

            let mut new_record = NewRecord::translation_of_transcript(transcript, target);
            new_record.full = Some(translated);
            let mut record = self.store.create_record(new_record)?;
            record.ts_start = Some(ts_start);
            record.ts_end = Some(ts_end);
            created.push(self.store.update_record(&record)?);
        }

        Ok(created)
    }
}
