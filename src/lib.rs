//! smartsum - transcribe, translate, score and summarize media
//!
//! Offline speech recognition and translation over a project/media/record
//! store, with word error rate scoring and chunked summarization.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod actions;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
#[cfg(feature = "lang-download")]
pub mod langs;
pub mod pipeline;
pub mod record;
pub mod store;
pub mod summarize;
pub mod wer;

// Composition root - needs everything
pub mod app;

// Engine seams
pub use engine::{SpeechEngine, SpeechEngineProvider, SummaryEngine, TextTranslator};

// Pipeline
pub use actions::{Action, ActionOutcome, ActionRunner, Selection};
pub use pipeline::{Mode, Orchestrator, PipelineConfig, RunReport, TextTranslation};
pub use summarize::{SummaryOptions, Summarizer};

// Records and persistence
pub use record::{Media, Project, Record, RecordKind, Segment};
pub use store::{MemoryStore, SqliteStore, Store};

// Error handling
pub use error::{Result, SmartsumError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
