//! Sequential batch runner for speech engines.
//!
//! Per media item: resolve an engine profile, create the parent record, stamp
//! `ts_start`, run the engine and persist every segment as soon as it arrives,
//! then stamp `ts_end`, store the joined text and score it.
//!
//! The engine runs on its own thread and hands segments over a bounded
//! channel, so a stalled engine can be abandoned once the run deadline
//! passes. An abandoned worker is detached; it exits on its next send.

use crate::clock::{Clock, SystemClock};
use crate::defaults;
use crate::engine::{
    EngineRegistry, EngineSegment, RunInfo, SpeechEngine, SpeechEngineProvider, SpeechRequest,
    Task,
};
use crate::error::{Result, SmartsumError};
use crate::record::{Media, NewRecord, Record, RecordKind};
use crate::store::Store;
use crossbeam_channel::{RecvTimeoutError, bounded};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// What to produce from each media item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Transcript in the media's own language.
    Transcribe,
    /// Speech translation into `target`.
    Translate { target: String },
}

impl Mode {
    pub fn task(&self) -> Task {
        match self {
            Mode::Transcribe => Task::Transcribe,
            Mode::Translate { .. } => Task::Translate,
        }
    }

    pub fn kind(&self) -> RecordKind {
        match self {
            Mode::Transcribe => RecordKind::Transcript,
            Mode::Translate { .. } => RecordKind::Translation,
        }
    }
}

/// Tuning knobs for engine runs.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub beam_size: u32,
    /// Upper bound on one engine run; `None` waits forever.
    pub engine_timeout: Option<Duration>,
    /// Segments buffered between the engine thread and the store writer.
    pub segment_buffer: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            beam_size: defaults::BEAM_SIZE,
            engine_timeout: Some(Duration::from_secs(defaults::ENGINE_TIMEOUT_SECS)),
            segment_buffer: defaults::SEGMENT_BUFFER,
        }
    }
}

/// Outcome of one media item.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub media_id: i64,
    pub kind: RecordKind,
    pub record_id: i64,
    pub segments: usize,
    pub elapsed: Duration,
    pub model: String,
    /// Language reported by the engine, when it reports one.
    pub detected_language: Option<String>,
}

enum EngineMessage {
    Started(RunInfo),
    Segment(EngineSegment),
    Failed(SmartsumError),
    Finished,
}

pub struct Orchestrator {
    store: Arc<dyn Store>,
    registry: EngineRegistry,
    provider: Arc<dyn SpeechEngineProvider>,
    config: PipelineConfig,
    clock: Arc<dyn Clock>,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        registry: EngineRegistry,
        provider: Arc<dyn SpeechEngineProvider>,
    ) -> Self {
        Self {
            store,
            registry,
            provider,
            config: PipelineConfig::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Transcribe each media item in its own language.
    pub fn transcribe(&self, media: &[Media]) -> Result<Vec<RunReport>> {
        self.run(media, &Mode::Transcribe)
    }

    /// Translate the speech of each media item into `target`.
    pub fn translate(&self, media: &[Media], target: &str) -> Result<Vec<RunReport>> {
        self.run(
            media,
            &Mode::Translate {
                target: target.to_string(),
            },
        )
    }

    /// Process `media` one item at a time. The first failure stops the batch;
    /// records finished before it are kept.
    pub fn run(&self, media: &[Media], mode: &Mode) -> Result<Vec<RunReport>> {
        let mut reports = Vec::with_capacity(media.len());
        for (index, item) in media.iter().enumerate() {
            log::info!(
                "[{}/{}] {} {}",
                index + 1,
                media.len(),
                mode.task(),
                item.label()
            );
            reports.push(self.run_one(item, mode)?);
        }
        Ok(reports)
    }

    fn run_one(&self, media: &Media, mode: &Mode) -> Result<RunReport> {
        let started = Instant::now();
        let task = mode.task();

        let attachment = media
            .attachment
            .clone()
            .ok_or(SmartsumError::MissingAttachment { media_id: media.id })?;

        let profile = self.registry.resolve(media.language.as_deref(), task)?;
        let engine = self.provider.engine(profile)?;

        let (new_record, language) = match mode {
            Mode::Transcribe => (NewRecord::transcript(media), media.language.clone()),
            Mode::Translate { target } => (
                NewRecord::translation_of_media(media, target),
                Some(target.clone()),
            ),
        };

        let mut record = self.store.create_record(new_record)?;
        record.ts_start = Some(self.clock.now());
        record = self.store.update_record(&record)?;

        let request = SpeechRequest::new(attachment, task)
            .with_language(language)
            .with_beam_size(self.config.beam_size);

        let (texts, info) = self.stream_segments(engine, request, &record)?;
        let segments = texts.len();

        record.ts_end = Some(self.clock.now());
        record.full = Some(texts.join("\n"));
        score(&mut record);
        let record = self.store.update_record(&record)?;

        log::info!(
            "{} {} finished: {} segment(s) in {:.1}s",
            record.kind,
            record.id,
            segments,
            started.elapsed().as_secs_f64()
        );

        Ok(RunReport {
            media_id: media.id,
            kind: record.kind,
            record_id: record.id,
            segments,
            elapsed: started.elapsed(),
            model: info.model,
            detected_language: info.language,
        })
    }

    /// Run the engine on a worker thread and persist segments as they arrive.
    fn stream_segments(
        &self,
        engine: Arc<dyn SpeechEngine>,
        request: SpeechRequest,
        record: &Record,
    ) -> Result<(Vec<String>, RunInfo)> {
        let engine_name = engine.model_name().to_string();
        let (tx, rx) = bounded::<EngineMessage>(self.config.segment_buffer.max(1));

        let worker = thread::Builder::new()
            .name(format!("engine-{}", record.id))
            .spawn(move || {
                let output = match engine.run(&request) {
                    Ok(output) => output,
                    Err(e) => {
                        if tx.send(EngineMessage::Failed(e)).is_err() {
                            log::debug!("Engine failed after the run was abandoned");
                        }
                        return;
                    }
                };

                if tx.send(EngineMessage::Started(output.info)).is_err() {
                    return;
                }

                for item in output.segments {
                    let (message, last) = match item {
                        Ok(segment) => (EngineMessage::Segment(segment), false),
                        Err(e) => (EngineMessage::Failed(e), true),
                    };
                    if tx.send(message).is_err() || last {
                        return;
                    }
                }

                if tx.send(EngineMessage::Finished).is_err() {
                    log::debug!("Engine finished after the run was abandoned");
                }
            })?;

        let deadline = self
            .config
            .engine_timeout
            .map(|timeout| (timeout, Instant::now() + timeout));

        let mut texts = Vec::new();
        let mut info = RunInfo {
            language: None,
            model: engine_name.clone(),
        };

        loop {
            let received = match deadline {
                Some((_, deadline)) => rx.recv_deadline(deadline),
                None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
            };

            match received {
                Ok(EngineMessage::Started(run_info)) => {
                    if let Some(language) = &run_info.language {
                        log::debug!("{} reports language {}", engine_name, language);
                    }
                    info = run_info;
                }
                Ok(EngineMessage::Segment(segment)) => {
                    log::trace!(
                        "[{:.2}s -> {:.2}s] {}",
                        segment.start,
                        segment.end,
                        segment.text
                    );
                    self.store.append_segment(
                        record.kind,
                        record.id,
                        segment.start,
                        segment.end,
                        &segment.text,
                    )?;
                    texts.push(segment.text);
                }
                Ok(EngineMessage::Failed(e)) => {
                    log::error!(
                        "{} {} failed after {} segment(s): {}",
                        record.kind,
                        record.id,
                        texts.len(),
                        e
                    );
                    return Err(e);
                }
                Ok(EngineMessage::Finished) => break,
                Err(RecvTimeoutError::Timeout) => {
                    let after = deadline.map(|(timeout, _)| timeout).unwrap_or_default();
                    log::error!(
                        "{} {} abandoned after {} segment(s): engine exceeded {:?}",
                        record.kind,
                        record.id,
                        texts.len(),
                        after
                    );
                    return Err(SmartsumError::EngineTimeout {
                        engine: engine_name,
                        after,
                    });
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let message = match worker.join() {
                        Err(panic_info) => {
                            let msg = panic_info
                                .downcast_ref::<&str>()
                                .copied()
                                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                                .unwrap_or("unknown panic");
                            format!("engine thread panicked: {msg}")
                        }
                        Ok(()) => "engine thread exited without finishing".to_string(),
                    };
                    return Err(SmartsumError::Engine {
                        engine: engine_name,
                        message,
                    });
                }
            }
        }

        if worker.join().is_err() {
            log::warn!("Engine thread panicked after finishing");
        }

        Ok((texts, info))
    }
}

/// Score the record against its reference; a bad reference is not fatal.
fn score(record: &mut Record) {
    if let Err(e) = record.finalize_score() {
        log::warn!("Skipping WER for {} {}: {}", record.kind, record.id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineProfile, MockSpeechEngine, StaticProvider};
    use crate::record::NewMedia;
    use crate::store::MemoryStore;
    use chrono::{DateTime, TimeZone, Utc};
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Clock that advances one second per reading.
    struct StepClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl StepClock {
        fn new() -> Self {
            Self {
                now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
            }
        }
    }

    impl Clock for StepClock {
        fn now(&self) -> DateTime<Utc> {
            let mut now = self.now.lock().unwrap();
            let current = *now;
            *now += chrono::TimeDelta::seconds(1);
            current
        }
    }

    fn setup(language: Option<&str>) -> (Arc<MemoryStore>, Media) {
        let store = Arc::new(MemoryStore::new());
        let project = store.create_project("p", None).unwrap();
        let media = store
            .create_media(NewMedia {
                project_id: project.id,
                title: Some("interview".to_string()),
                attachment: Some(PathBuf::from("/media/interview.wav")),
                language: language.map(str::to_string),
                url: None,
            })
            .unwrap();
        (store, media)
    }

    fn orchestrator(store: Arc<MemoryStore>, provider: StaticProvider) -> Orchestrator {
        Orchestrator::new(store, EngineRegistry::with_defaults(), Arc::new(provider))
            .with_clock(Arc::new(StepClock::new()))
    }

    #[test]
    fn test_transcribe_persists_segments_and_full_text() {
        let (store, media) = setup(Some("en"));
        let engine = MockSpeechEngine::new("large-v3")
            .with_segments(&[(0.0, 1.5, "hello"), (1.5, 3.0, "world")]);
        let provider = StaticProvider::new().with_engine("general", Arc::new(engine));

        let reports = orchestrator(store.clone(), provider)
            .transcribe(&[media.clone()])
            .unwrap();

        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert_eq!(report.segments, 2);
        assert_eq!(report.kind, RecordKind::Transcript);
        assert_eq!(report.model, "large-v3");

        let record = store
            .get_record(RecordKind::Transcript, report.record_id)
            .unwrap();
        assert_eq!(record.full.as_deref(), Some("hello\nworld"));
        assert_eq!(record.media_id, Some(media.id));
        assert_eq!(record.language.as_deref(), Some("en"));
        assert!(record.is_finalized());
        assert_eq!(record.time_elapsed(), chrono::TimeDelta::seconds(1));

        let segments = store
            .segments(RecordKind::Transcript, report.record_id)
            .unwrap();
        let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["hello", "world"]);
        assert_eq!(segments[1].start, 1.5);
    }

    #[test]
    fn test_hebrew_media_uses_hebrew_profile() {
        let (store, media) = setup(Some("he"));
        let hebrew = MockSpeechEngine::new("ivrit").with_segments(&[(0.0, 1.0, "shalom")]);
        let general = MockSpeechEngine::new("general");
        let provider = StaticProvider::new()
            .with_engine("hebrew", Arc::new(hebrew.clone()))
            .with_engine("general", Arc::new(general.clone()));

        orchestrator(store, provider).transcribe(&[media]).unwrap();

        assert_eq!(hebrew.requests().len(), 1);
        assert!(general.requests().is_empty());
        assert_eq!(hebrew.requests()[0].language.as_deref(), Some("he"));
    }

    #[test]
    fn test_translate_targets_language_and_creates_translation() {
        let (store, media) = setup(Some("he"));
        let engine = MockSpeechEngine::new("large-v3").with_segments(&[(0.0, 2.0, "peace")]);
        let provider = StaticProvider::new().with_engine("general", Arc::new(engine.clone()));

        let reports = orchestrator(store.clone(), provider)
            .translate(&[media], "en")
            .unwrap();

        let request = &engine.requests()[0];
        assert_eq!(request.task, Task::Translate);
        assert_eq!(request.language.as_deref(), Some("en"));
        assert_eq!(request.beam_size, defaults::BEAM_SIZE);

        let record = store
            .get_record(RecordKind::Translation, reports[0].record_id)
            .unwrap();
        assert_eq!(record.language.as_deref(), Some("en"));
        assert_eq!(record.full.as_deref(), Some("peace"));
        assert_eq!(record.transcript_id, None);
    }

    #[test]
    fn test_zero_segments_gives_empty_full_text() {
        let (store, media) = setup(None);
        let provider =
            StaticProvider::new().with_engine("general", Arc::new(MockSpeechEngine::new("m")));

        let reports = orchestrator(store.clone(), provider)
            .transcribe(&[media])
            .unwrap();

        let record = store
            .get_record(RecordKind::Transcript, reports[0].record_id)
            .unwrap();
        assert_eq!(record.full.as_deref(), Some(""));
        assert!(record.ts_end.is_some());
    }

    #[test]
    fn test_failure_mid_stream_keeps_persisted_segments() {
        let (store, media) = setup(Some("en"));
        let engine = MockSpeechEngine::new("m")
            .with_segments(&[(0.0, 1.0, "a"), (1.0, 2.0, "b"), (2.0, 3.0, "c")])
            .with_failure_after(2);
        let provider = StaticProvider::new().with_engine("general", Arc::new(engine));

        let result = orchestrator(store.clone(), provider).transcribe(&[media]);
        assert!(matches!(result, Err(SmartsumError::Engine { .. })));

        let records = store.list_records(RecordKind::Transcript).unwrap();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert!(record.ts_start.is_some());
        assert!(record.ts_end.is_none());
        assert!(record.full.is_none());
        assert_eq!(
            store
                .segments(RecordKind::Transcript, record.id)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_failure_stops_the_batch() {
        let (store, first) = setup(Some("en"));
        let second = store
            .create_media(NewMedia {
                project_id: first.project_id,
                attachment: Some(PathBuf::from("/media/b.wav")),
                ..NewMedia::default()
            })
            .unwrap();
        let engine = MockSpeechEngine::new("m").with_failure();
        let provider = StaticProvider::new().with_engine("general", Arc::new(engine.clone()));

        let result = orchestrator(store, provider).transcribe(&[first, second]);

        assert!(result.is_err());
        assert_eq!(engine.requests().len(), 1);
    }

    #[test]
    fn test_missing_attachment_creates_nothing() {
        let (store, mut media) = setup(Some("en"));
        media.attachment = None;
        let provider =
            StaticProvider::new().with_engine("general", Arc::new(MockSpeechEngine::new("m")));

        let result = orchestrator(store.clone(), provider).transcribe(&[media.clone()]);

        assert!(matches!(
            result,
            Err(SmartsumError::MissingAttachment { media_id }) if media_id == media.id
        ));
        assert!(store.list_records(RecordKind::Transcript).unwrap().is_empty());
    }

    #[test]
    fn test_stalled_engine_times_out() {
        let (store, media) = setup(Some("en"));
        let engine = MockSpeechEngine::new("slow")
            .with_segments(&[(0.0, 1.0, "late")])
            .with_delay(Duration::from_secs(5));
        let provider = StaticProvider::new().with_engine("general", Arc::new(engine));

        let started = Instant::now();
        let result = orchestrator(store.clone(), provider)
            .with_config(PipelineConfig {
                engine_timeout: Some(Duration::from_millis(100)),
                ..PipelineConfig::default()
            })
            .transcribe(&[media]);

        assert!(started.elapsed() < Duration::from_secs(4));
        match result {
            Err(SmartsumError::EngineTimeout { engine, after }) => {
                assert_eq!(engine, "slow");
                assert_eq!(after, Duration::from_millis(100));
            }
            other => panic!("Expected EngineTimeout, got {other:?}"),
        }

        let record = &store.list_records(RecordKind::Transcript).unwrap()[0];
        assert!(record.ts_end.is_none());
    }

    #[test]
    fn test_unbounded_timeout_waits_for_engine() {
        let (store, media) = setup(Some("en"));
        let engine = MockSpeechEngine::new("m")
            .with_segments(&[(0.0, 1.0, "x")])
            .with_delay(Duration::from_millis(50));
        let provider = StaticProvider::new().with_engine("general", Arc::new(engine));

        let reports = orchestrator(store, provider)
            .with_config(PipelineConfig {
                engine_timeout: None,
                ..PipelineConfig::default()
            })
            .transcribe(&[media])
            .unwrap();
        assert_eq!(reports[0].segments, 1);
    }

    #[test]
    fn test_unregistered_capability_is_reported() {
        let (store, media) = setup(Some("en"));
        let orchestrator = Orchestrator::new(
            store,
            EngineRegistry::new(),
            Arc::new(StaticProvider::new()),
        );
        assert!(matches!(
            orchestrator.transcribe(&[media]),
            Err(SmartsumError::EngineUnavailable { .. })
        ));
    }

    #[test]
    fn test_custom_registration_routes_new_language() {
        let (store, media) = setup(Some("fa"));
        let mut registry = EngineRegistry::with_defaults();
        registry.register(
            Some("fa"),
            Some(Task::Transcribe),
            EngineProfile::new("farsi", "farsi-model"),
        );
        let farsi = MockSpeechEngine::new("farsi-model").with_segments(&[(0.0, 1.0, "salam")]);
        let provider = StaticProvider::new().with_engine("farsi", Arc::new(farsi.clone()));

        Orchestrator::new(store, registry, Arc::new(provider))
            .transcribe(&[media])
            .unwrap();
        assert_eq!(farsi.requests().len(), 1);
    }
}
