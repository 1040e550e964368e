//! Records produced and consumed by the pipeline.
//!
//! Transcripts and translations share one shape ([`Record`]) and are told
//! apart by [`RecordKind`]; each owns an ordered list of [`Segment`]s.

use crate::defaults::SNIPPET_CHARS;
use crate::error::Result;
use crate::wer;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Which table a record (and its segments) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Transcript,
    Translation,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Transcript => "transcript",
            RecordKind::Translation => "translation",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named group of media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Fields required to create a [`Media`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewMedia {
    pub project_id: i64,
    pub title: Option<String>,
    pub attachment: Option<PathBuf>,
    pub language: Option<String>,
    pub url: Option<String>,
}

/// An uploaded audio or video file. Processing never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Media {
    pub id: i64,
    pub project_id: i64,
    pub title: Option<String>,
    pub attachment: Option<PathBuf>,
    pub language: Option<String>,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Media {
    /// Title if set, creation time otherwise.
    pub fn label(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| self.created_at.format("%Y-%m-%d %H:%M:%S").to_string())
    }
}

/// Fields required to create a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub title: Option<String>,
    pub media_id: Option<i64>,
    pub transcript_id: Option<i64>,
    pub language: Option<String>,
    pub full: Option<String>,
}

impl NewRecord {
    /// Transcript of a media item in its own language.
    pub fn transcript(media: &Media) -> Self {
        Self {
            kind: RecordKind::Transcript,
            title: media.title.clone(),
            media_id: Some(media.id),
            transcript_id: None,
            language: media.language.clone(),
            full: None,
        }
    }

    /// Translation produced directly from a media item's audio.
    pub fn translation_of_media(media: &Media, target: &str) -> Self {
        Self {
            kind: RecordKind::Translation,
            title: media.title.clone(),
            media_id: Some(media.id),
            transcript_id: None,
            language: Some(target.to_string()),
            full: None,
        }
    }

    /// Translation of an existing transcript's text.
    pub fn translation_of_transcript(transcript: &Record, target: &str) -> Self {
        Self {
            kind: RecordKind::Translation,
            title: transcript.title.clone(),
            media_id: transcript.media_id,
            transcript_id: Some(transcript.id),
            language: Some(target.to_string()),
            full: None,
        }
    }
}

/// A transcript or translation with its aggregate text and run timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub kind: RecordKind,
    pub title: Option<String>,
    pub media_id: Option<i64>,
    /// Source transcript, for translations of transcript text.
    pub transcript_id: Option<i64>,
    pub language: Option<String>,
    pub full: Option<String>,
    pub summary: Option<String>,
    /// Human reference text used for scoring.
    pub reference: Option<String>,
    /// Word error rate in percent.
    pub wer: Option<f64>,
    pub ts_start: Option<DateTime<Utc>>,
    pub ts_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl Record {
    /// Leading part of the full text for list views.
    pub fn snippet(&self) -> String {
        snip(self.full.as_deref())
    }

    /// Leading part of the summary for list views.
    pub fn summary_snip(&self) -> String {
        snip(self.summary.as_deref())
    }

    /// Duration of the processing run; zero unless both timestamps are set.
    pub fn time_elapsed(&self) -> TimeDelta {
        match (self.ts_start, self.ts_end) {
            (Some(start), Some(end)) => end - start,
            _ => TimeDelta::zero(),
        }
    }

    /// True once a run has assigned the end timestamp.
    pub fn is_finalized(&self) -> bool {
        self.ts_end.is_some()
    }

    /// Compute the word error rate against the reference, at most once.
    ///
    /// Scores only when a non-blank reference exists and no WER is stored yet;
    /// a WER set by the caller beforehand is kept as is. Returns whether a new
    /// score was assigned.
    ///
    /// # Errors
    /// Returns `SmartsumError::EmptyReference` when the reference has no words
    /// after normalization. The record is left unchanged in that case.
    pub fn finalize_score(&mut self) -> Result<bool> {
        if self.wer.is_some() {
            return Ok(false);
        }
        let Some(reference) = self.reference.as_deref().filter(|r| !r.trim().is_empty()) else {
            return Ok(false);
        };
        let hypothesis = self.full.as_deref().unwrap_or_default();
        self.wer = Some(wer::word_error_rate(reference, hypothesis)?);
        Ok(true)
    }

    /// Store a new reference text and rescore against it.
    ///
    /// A reference that differs from the stored one clears the old WER
    /// first. Returns whether a score was assigned.
    ///
    /// # Errors
    /// Same as [`Record::finalize_score`]. The reference is kept even then.
    pub fn set_reference(&mut self, reference: String) -> Result<bool> {
        if self.reference.as_deref() != Some(reference.as_str()) {
            self.wer = None;
        }
        self.reference = Some(reference);
        self.finalize_score()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.title {
            Some(title) => write!(f, "{}", title)?,
            None => write!(f, "{} #{}", self.kind, self.id)?,
        }
        if let Some(language) = &self.language {
            write!(f, " ({})", language)?;
        }
        Ok(())
    }
}

fn snip(text: Option<&str>) -> String {
    text.map(|t| t.chars().take(SNIPPET_CHARS).collect())
        .unwrap_or_default()
}

/// One time-bounded unit of recognized or translated text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    pub record_id: i64,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.2}s -> {:.2}s] {}", self.start, self.end, self.text)
    }
}
