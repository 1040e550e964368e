//! Speech engine contract: requests, timed segments and the lazy segment stream.
//!
//! Engines that decode on their own thread hand segments over through
//! [`segment_channel`], so consumers see each segment as soon as it exists.

use crate::defaults;
use crate::error::{Result, SmartsumError};
use crossbeam_channel::{Receiver, Sender, unbounded};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the speech engine should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    /// Speech to text in the spoken language.
    Transcribe,
    /// Speech to text in a target language.
    Translate,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single engine invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    /// Audio file to process.
    pub media_path: PathBuf,
    /// Language hint: the spoken language for transcription, the target
    /// language for translation. `None` lets the engine detect it.
    pub language: Option<String>,
    pub task: Task,
    pub beam_size: u32,
}

impl SpeechRequest {
    pub fn new(media_path: impl Into<PathBuf>, task: Task) -> Self {
        Self {
            media_path: media_path.into(),
            language: None,
            task,
            beam_size: defaults::BEAM_SIZE,
        }
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_beam_size(mut self, beam_size: u32) -> Self {
        self.beam_size = beam_size;
        self
    }
}

/// A timed span of recognized text, in seconds from the start of the media.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl EngineSegment {
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

/// Metadata reported alongside the segments of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunInfo {
    /// Language detected or used by the engine.
    pub language: Option<String>,
    /// Model that produced the output.
    pub model: String,
}

/// Lazily produced segments. An `Err` item ends the run.
pub type SegmentStream = Box<dyn Iterator<Item = Result<EngineSegment>> + Send>;

/// Result of starting a run: metadata plus the segment stream.
pub struct SpeechOutput {
    pub info: RunInfo,
    pub segments: SegmentStream,
}

impl fmt::Debug for SpeechOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeechOutput")
            .field("info", &self.info)
            .field("segments", &"<stream>")
            .finish()
    }
}

/// Producer half of a [`segment_channel`].
#[derive(Debug, Clone)]
pub struct SegmentSender {
    tx: Sender<StreamEvent>,
}

#[derive(Debug)]
enum StreamEvent {
    Segment(EngineSegment),
    Failed(SmartsumError),
    Finished,
}

impl SegmentSender {
    /// Hand one segment to the consumer. Returns `false` once the stream is gone.
    pub fn segment(&self, segment: EngineSegment) -> bool {
        self.tx.send(StreamEvent::Segment(segment)).is_ok()
    }

    /// End the stream with `error`.
    pub fn fail(&self, error: SmartsumError) {
        if self.tx.send(StreamEvent::Failed(error)).is_err() {
            log::debug!("Segment stream dropped before the failure was delivered");
        }
    }

    /// End the stream normally.
    pub fn finish(&self) {
        if self.tx.send(StreamEvent::Finished).is_err() {
            log::debug!("Segment stream dropped before the run finished");
        }
    }
}

struct ChannelStream {
    rx: Receiver<StreamEvent>,
    engine: String,
    done: bool,
}

impl Iterator for ChannelStream {
    type Item = Result<EngineSegment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rx.recv() {
            Ok(StreamEvent::Segment(segment)) => Some(Ok(segment)),
            Ok(StreamEvent::Finished) => {
                self.done = true;
                None
            }
            Ok(StreamEvent::Failed(e)) => {
                self.done = true;
                Some(Err(e))
            }
            // Every sender dropped without finish() or fail(): the producer died
            Err(_) => {
                self.done = true;
                Some(Err(SmartsumError::Engine {
                    engine: self.engine.clone(),
                    message: "engine stopped before finishing the run".to_string(),
                }))
            }
        }
    }
}

/// Segment stream fed from another thread.
///
/// The producer calls [`SegmentSender::segment`] per segment and ends with
/// `finish` or `fail`. The stream blocks until the next event arrives.
pub fn segment_channel(engine: &str) -> (SegmentSender, SegmentStream) {
    let (tx, rx) = unbounded();
    let stream = ChannelStream {
        rx,
        engine: engine.to_string(),
        done: false,
    };
    (SegmentSender { tx }, Box::new(stream))
}

/// Trait for speech recognition and speech translation engines.
///
/// This trait allows swapping implementations (real Whisper vs mock).
pub trait SpeechEngine: Send + Sync {
    /// Start processing `request`, returning run metadata and a segment stream.
    fn run(&self, request: &SpeechRequest) -> Result<SpeechOutput>;

    /// Name of the loaded model
    fn model_name(&self) -> &str;
}

/// Implement SpeechEngine for Arc<T> to allow sharing across runs.
impl<T: SpeechEngine + ?Sized> SpeechEngine for Arc<T> {
    fn run(&self, request: &SpeechRequest) -> Result<SpeechOutput> {
        (**self).run(request)
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Mock speech engine for testing
#[derive(Debug, Clone)]
pub struct MockSpeechEngine {
    model_name: String,
    language: Option<String>,
    segments: Vec<EngineSegment>,
    fail_on_start: bool,
    fail_after: Option<usize>,
    delay: Option<Duration>,
    requests: Arc<Mutex<Vec<SpeechRequest>>>,
}

impl MockSpeechEngine {
    /// Create a new mock engine that yields no segments
    pub fn new(model_name: &str) -> Self {
        Self {
            model_name: model_name.to_string(),
            language: None,
            segments: Vec::new(),
            fail_on_start: false,
            fail_after: None,
            delay: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Configure the segments to yield, as `(start, end, text)`
    pub fn with_segments(mut self, segments: &[(f64, f64, &str)]) -> Self {
        self.segments = segments
            .iter()
            .map(|(start, end, text)| EngineSegment::new(*start, *end, *text))
            .collect();
        self
    }

    /// Configure the language reported in [`RunInfo`]
    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    /// Configure the mock to fail before yielding anything
    pub fn with_failure(mut self) -> Self {
        self.fail_on_start = true;
        self
    }

    /// Configure the mock to fail after yielding `count` segments
    pub fn with_failure_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }

    /// Sleep for `delay` before yielding each segment
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn failure(&self, message: &str) -> SmartsumError {
        SmartsumError::Engine {
            engine: self.model_name.clone(),
            message: message.to_string(),
        }
    }
}

impl SpeechEngine for MockSpeechEngine {
    fn run(&self, request: &SpeechRequest) -> Result<SpeechOutput> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.fail_on_start {
            return Err(self.failure("mock engine failure"));
        }

        let delay = self.delay;
        let segments: Vec<Result<EngineSegment>> = match self.fail_after {
            Some(count) => self
                .segments
                .iter()
                .take(count)
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(self.failure("mock stream failure"))))
                .collect(),
            None => self.segments.iter().cloned().map(Ok).collect(),
        };

        let stream = segments.into_iter().inspect(move |_| {
            if let Some(delay) = delay {
                std::thread::sleep(delay);
            }
        });

        Ok(SpeechOutput {
            info: RunInfo {
                language: self.language.clone().or_else(|| request.language.clone()),
                model: self.model_name.clone(),
            },
            segments: Box::new(stream),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
