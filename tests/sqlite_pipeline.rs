//! End-to-end runs against an on-disk SQLite store with mock engines.

use smartsum::actions::{Action, ActionRunner, Selection};
use smartsum::defaults;
use smartsum::engine::{
    EngineRegistry, MockSpeechEngine, MockSummaryEngine, MockTranslator, StaticProvider,
};
use smartsum::pipeline::{Orchestrator, PipelineConfig, TextTranslation};
use smartsum::record::{NewMedia, RecordKind};
use smartsum::store::{SqliteStore, Store};
use smartsum::summarize::{SummaryOptions, SummaryProfile, Summarizer};
use smartsum::SmartsumError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

struct Harness {
    _dir: TempDir,
    db_path: PathBuf,
    store: Arc<SqliteStore>,
    runner: ActionRunner,
}

fn harness(engine: MockSpeechEngine, config: PipelineConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("records.db");
    let store = Arc::new(SqliteStore::open(&db_path).unwrap());

    let provider = StaticProvider::new()
        .with_engine(defaults::GENERAL_PROFILE, Arc::new(engine.clone()))
        .with_engine("hebrew", Arc::new(engine));
    let orchestrator = Orchestrator::new(
        store.clone(),
        EngineRegistry::with_defaults(),
        Arc::new(provider),
    )
    .with_config(config);
    let text = TextTranslation::new(store.clone(), Arc::new(MockTranslator::new()));
    let summarizer = Summarizer::new(
        SummaryProfile::new(defaults::GENERAL_PROFILE, "mock", 4),
        Arc::new(MockSummaryEngine::new("mock")),
    );
    let runner = ActionRunner::new(store.clone(), orchestrator, text, summarizer)
        .with_summary_options(SummaryOptions {
            max_words: 3,
            min_words: 1,
            language: None,
        });

    Harness {
        _dir: dir,
        db_path,
        store,
        runner,
    }
}

fn add_media(store: &dyn Store, language: &str) -> i64 {
    let project = store.create_project("interviews", None).unwrap();
    store
        .create_media(NewMedia {
            project_id: project.id,
            title: Some("episode 1".to_string()),
            attachment: Some(PathBuf::from("/media/episode1.wav")),
            language: Some(language.to_string()),
            url: None,
        })
        .unwrap()
        .id
}

#[test]
fn test_transcript_survives_reopening_the_database() {
    let engine = MockSpeechEngine::new("ivrit-large-v3-turbo").with_segments(&[
        (0.0, 1.5, "shalom olam"),
        (1.5, 3.0, "ma shlomcha"),
    ]);
    let h = harness(engine, PipelineConfig::default());
    let media_id = add_media(h.store.as_ref(), "he");

    let outcome = h
        .runner
        .run(Action::Transcribe, &Selection::Media(vec![media_id]))
        .unwrap();
    let (kind, id) = outcome.created[0];
    drop(h.runner);

    let reopened = SqliteStore::open(&h.db_path).unwrap();
    let record = reopened.get_record(kind, id).unwrap();
    assert_eq!(record.full.as_deref(), Some("shalom olam\nma shlomcha"));
    assert_eq!(record.language.as_deref(), Some("he"));
    assert!(record.is_finalized());
    assert!(record.ts_start <= record.ts_end);

    let segments = reopened.segments(kind, id).unwrap();
    let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
    assert_eq!(texts, vec!["shalom olam", "ma shlomcha"]);
    assert_eq!(segments[1].start, 1.5);
}

#[test]
fn test_failed_run_keeps_partial_segments() {
    let engine = MockSpeechEngine::new("large-v3")
        .with_segments(&[(0.0, 1.0, "first"), (1.0, 2.0, "second")])
        .with_failure_after(1);
    let h = harness(engine, PipelineConfig::default());
    let media_id = add_media(h.store.as_ref(), "en");

    let result = h
        .runner
        .run(Action::Transcribe, &Selection::Media(vec![media_id]));
    assert!(matches!(result, Err(SmartsumError::Engine { .. })));

    let records = h.store.list_records(RecordKind::Transcript).unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_finalized());
    let segments = h.store.segments(RecordKind::Transcript, records[0].id).unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].text, "first");
}

#[test]
fn test_slow_engine_times_out() {
    let engine = MockSpeechEngine::new("large-v3")
        .with_segments(&[(0.0, 1.0, "never arrives")])
        .with_delay(Duration::from_secs(5));
    let config = PipelineConfig {
        engine_timeout: Some(Duration::from_millis(100)),
        ..PipelineConfig::default()
    };
    let h = harness(engine, config);
    let media_id = add_media(h.store.as_ref(), "en");

    let result = h
        .runner
        .run(Action::Transcribe, &Selection::Media(vec![media_id]));
    assert!(matches!(result, Err(SmartsumError::EngineTimeout { .. })));
}

#[test]
fn test_transcribe_translate_summarize_and_score() {
    let engine = MockSpeechEngine::new("large-v3")
        .with_segments(&[(0.0, 2.0, "the quick brown fox"), (2.0, 4.0, "jumps over")]);
    let h = harness(engine, PipelineConfig::default());
    let media_id = add_media(h.store.as_ref(), "he");

    let transcribed = h
        .runner
        .run(Action::Transcribe, &Selection::Media(vec![media_id]))
        .unwrap();
    let (_, transcript_id) = transcribed.created[0];

    let translated = h
        .runner
        .run(
            Action::TranslateText,
            &Selection::Records(RecordKind::Transcript, vec![transcript_id]),
        )
        .unwrap();
    let (kind, translation_id) = translated.created[0];
    assert_eq!(kind, RecordKind::Translation);
    assert_eq!(translated.redirect, Some(format!("translation/{translation_id}")));

    let translation = h.store.get_record(kind, translation_id).unwrap();
    assert_eq!(translation.transcript_id, Some(transcript_id));
    assert_eq!(translation.language.as_deref(), Some("en"));
    assert!(translation.full.as_deref().unwrap_or_default().starts_with("[he->en]"));

    let summarized = h
        .runner
        .run(
            Action::Summarize,
            &Selection::Records(RecordKind::Transcript, vec![transcript_id]),
        )
        .unwrap();
    assert_eq!(summarized.updated, vec![(RecordKind::Transcript, transcript_id)]);
    let mut transcript = h
        .store
        .get_record(RecordKind::Transcript, transcript_id)
        .unwrap();
    let summary = transcript.summary.clone().unwrap();
    assert!(summary.split_whitespace().count() <= 3);

    transcript.reference = Some("The quick brown fox jumps over the lazy dog".to_string());
    assert!(transcript.finalize_score().unwrap());
    let transcript = h.store.update_record(&transcript).unwrap();
    let wer = transcript.wer.unwrap();
    assert_eq!(wer, 33.33, "unexpected WER {wer}");
}

#[test]
fn test_deleting_project_cascades_to_records() {
    let engine = MockSpeechEngine::new("large-v3").with_segments(&[(0.0, 1.0, "hello")]);
    let h = harness(engine, PipelineConfig::default());
    let media_id = add_media(h.store.as_ref(), "en");
    h.runner
        .run(Action::Transcribe, &Selection::Media(vec![media_id]))
        .unwrap();
    let project_id = h.store.get_media(media_id).unwrap().project_id;

    h.store.delete_project(project_id).unwrap();

    assert!(h.store.list_media(None).unwrap().is_empty());
    assert!(h.store.list_records(RecordKind::Transcript).unwrap().is_empty());
}
