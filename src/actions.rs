//! Batch operations over a selection of stored items.
//!
//! Each [`Action`] takes the ids an operator selected, runs one pipeline step
//! over them and reports what was created or updated.

use crate::defaults;
use crate::error::{Result, SmartsumError};
use crate::pipeline::{Mode, Orchestrator, TextTranslation};
use crate::record::{Media, Record, RecordKind};
use crate::store::Store;
use crate::summarize::{SummaryOptions, Summarizer};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Transcribe,
    TranslateHebrew,
    TranslateEnglish,
    /// Translate transcript text with the text translation engine.
    TranslateText,
    Summarize,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Transcribe,
        Action::TranslateHebrew,
        Action::TranslateEnglish,
        Action::TranslateText,
        Action::Summarize,
    ];

    /// Label shown to operators.
    pub fn label(&self) -> &'static str {
        match self {
            Action::Transcribe => "Transcribe",
            Action::TranslateHebrew => "Translate to Hebrew",
            Action::TranslateEnglish => "Translate to English",
            Action::TranslateText => "Translate - EN",
            Action::Summarize => "Summarize",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ids an action runs over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Media(Vec<i64>),
    Records(RecordKind, Vec<i64>),
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        match self {
            Selection::Media(ids) | Selection::Records(_, ids) => ids.is_empty(),
        }
    }
}

/// What an action did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: Action,
    /// `(kind, id)` of records created
    pub created: Vec<(RecordKind, i64)>,
    /// `(kind, id)` of records updated in place
    pub updated: Vec<(RecordKind, i64)>,
    /// Where to go next, e.g. `translation/12`. `None` means back to the list.
    pub redirect: Option<String>,
}

impl ActionOutcome {
    fn new(action: Action) -> Self {
        Self {
            action,
            created: Vec::new(),
            updated: Vec::new(),
            redirect: None,
        }
    }
}

pub struct ActionRunner {
    store: Arc<dyn Store>,
    orchestrator: Orchestrator,
    text_translation: TextTranslation,
    summarizer: Summarizer,
    summary_options: SummaryOptions,
}

impl ActionRunner {
    pub fn new(
        store: Arc<dyn Store>,
        orchestrator: Orchestrator,
        text_translation: TextTranslation,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            store,
            orchestrator,
            text_translation,
            summarizer,
            summary_options: SummaryOptions::default(),
        }
    }

    pub fn with_summary_options(mut self, options: SummaryOptions) -> Self {
        self.summary_options = options;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// Run `action` over `selection`.
    ///
    /// # Errors
    /// Fails if the selection has the wrong shape for the action, if a
    /// selected id does not exist, or on the first pipeline failure.
    pub fn run(&self, action: Action, selection: &Selection) -> Result<ActionOutcome> {
        log::info!("Action '{}' on {:?}", action.label(), selection);

        match action {
            Action::Transcribe => self.run_speech(action, selection, &Mode::Transcribe),
            Action::TranslateHebrew => self.run_speech(
                action,
                selection,
                &Mode::Translate {
                    target: defaults::HEBREW_LANGUAGE.to_string(),
                },
            ),
            Action::TranslateEnglish => self.run_speech(
                action,
                selection,
                &Mode::Translate {
                    target: defaults::ENGLISH_LANGUAGE.to_string(),
                },
            ),
            Action::TranslateText => self.run_text_translation(selection),
            Action::Summarize => self.run_summarize(selection),
        }
    }

    fn run_speech(
        &self,
        action: Action,
        selection: &Selection,
        mode: &Mode,
    ) -> Result<ActionOutcome> {
        let media = self.load_media(action, selection)?;
        let reports = self.orchestrator.run(&media, mode)?;

        let mut outcome = ActionOutcome::new(action);
        outcome.created = reports.iter().map(|r| (r.kind, r.record_id)).collect();
        Ok(outcome)
    }

    fn run_text_translation(&self, selection: &Selection) -> Result<ActionOutcome> {
        let action = Action::TranslateText;
        let transcripts = self.load_records(action, selection, Some(RecordKind::Transcript))?;
        let created = self
            .text_translation
            .translate_records(&transcripts, defaults::TEXT_TRANSLATION_TARGET)?;

        let mut outcome = ActionOutcome::new(action);
        outcome.redirect = created
            .last()
            .map(|record| format!("{}/{}", record.kind, record.id));
        outcome.created = created.iter().map(|r| (r.kind, r.id)).collect();
        Ok(outcome)
    }

    fn run_summarize(&self, selection: &Selection) -> Result<ActionOutcome> {
        let action = Action::Summarize;
        let records = self.load_records(action, selection, None)?;

        let mut outcome = ActionOutcome::new(action);
        for record in records {
            let updated = self.summarizer.summarize_record(
                self.store.as_ref(),
                record.kind,
                record.id,
                &self.summary_options,
            )?;
            if updated.summary.is_some() && updated.summary != record.summary {
                outcome.updated.push((updated.kind, updated.id));
            }
        }
        Ok(outcome)
    }

    fn load_media(&self, action: Action, selection: &Selection) -> Result<Vec<Media>> {
        match selection {
            Selection::Media(ids) => ids.iter().map(|id| self.store.get_media(*id)).collect(),
            Selection::Records(..) => Err(wrong_selection(action, "media")),
        }
    }

    fn load_records(
        &self,
        action: Action,
        selection: &Selection,
        required: Option<RecordKind>,
    ) -> Result<Vec<Record>> {
        match selection {
            Selection::Records(kind, ids) if required.is_none_or(|k| k == *kind) => ids
                .iter()
                .map(|id| self.store.get_record(*kind, *id))
                .collect(),
            _ => Err(wrong_selection(
                action,
                required.map(|k| k.as_str()).unwrap_or("records"),
            )),
        }
    }
}

fn wrong_selection(action: Action, expected: &str) -> SmartsumError {
    SmartsumError::Other(format!("'{}' applies to {}", action.label(), expected))
}
