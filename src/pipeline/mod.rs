//! Media processing pipeline.
//!
//! [`Orchestrator`] drives speech engines over media items and persists the
//! segments they yield. [`TextTranslation`] translates finished transcripts
//! with a text-to-text engine.

pub mod orchestrator;
pub mod text;

pub use orchestrator::{Mode, Orchestrator, PipelineConfig, RunReport};
pub use text::TextTranslation;
