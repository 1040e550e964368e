//! Error types for smartsum.

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmartsumError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Store errors
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },

    #[error("Store error: {message}")]
    Store { message: String },

    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    // Engine errors
    #[error("No engine registered for language {language:?} and task {task}")]
    EngineUnavailable { language: Option<String>, task: String },

    #[error("Engine model not found at {path}")]
    EngineModelNotFound { path: String },

    #[error("Engine {engine} failed: {message}")]
    Engine { engine: String, message: String },

    #[error("Engine {engine} timed out after {}", human_duration(.after))]
    EngineTimeout { engine: String, after: Duration },

    #[error("Media {media_id} has no attachment")]
    MissingAttachment { media_id: i64 },

    #[error("Audio decoding failed: {message}")]
    AudioDecode { message: String },

    // Text engines
    #[error("Translation failed: {message}")]
    Translation { message: String },

    #[error("Summarization failed: {message}")]
    Summarization { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Scoring
    #[error("Reference text has no words after normalization")]
    EmptyReference,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

fn human_duration(duration: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*duration)
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, SmartsumError>;
