//! External engines the pipeline delegates to.
//!
//! Each capability is a trait with a mock for tests and one real adapter:
//! speech recognition/translation ([`SpeechEngine`], whisper.cpp), text
//! translation ([`TextTranslator`], LibreTranslate) and summarization
//! ([`SummaryEngine`], Ollama). [`EngineRegistry`] picks the speech engine
//! profile for a language and task.

pub mod registry;
pub mod speech;
pub mod summary;
pub mod translate;
pub mod whisper;

pub use registry::{EngineProfile, EngineRegistry, SpeechEngineProvider, StaticProvider};
pub use speech::{
    EngineSegment, MockSpeechEngine, RunInfo, SegmentSender, SegmentStream, SpeechEngine,
    SpeechOutput, SpeechRequest, Task, segment_channel,
};
pub use summary::{MockSummaryEngine, OllamaSummarizer, SummaryEngine};
pub use translate::{LibreTranslateClient, MockTranslator, TextTranslator};
pub use whisper::{WhisperConfig, WhisperEngine, WhisperProvider};
