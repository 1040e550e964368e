//! Persistence for projects, media, records and their segments.
//!
//! The pipeline only talks to the [`Store`] trait. [`SqliteStore`] is the
//! on-disk implementation; [`MemoryStore`] backs tests and dry runs.
//!
//! Writes are committed one call at a time. No transaction spans a
//! processing run, so segments appended before a failure stay visible.

pub mod memory;
pub mod migrations;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::record::{Media, NewMedia, NewRecord, Project, Record, RecordKind, Segment};
use std::sync::Arc;

/// Record store shared by the orchestrator, summarizer and actions.
///
/// Deleting a parent cascades to its children: project → media → records →
/// translations of those transcripts → segments.
pub trait Store: Send + Sync {
    fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project>;
    fn get_project(&self, id: i64) -> Result<Project>;
    fn list_projects(&self) -> Result<Vec<Project>>;
    fn delete_project(&self, id: i64) -> Result<()>;

    fn create_media(&self, media: NewMedia) -> Result<Media>;
    fn get_media(&self, id: i64) -> Result<Media>;
    /// All media, optionally restricted to one project.
    fn list_media(&self, project_id: Option<i64>) -> Result<Vec<Media>>;
    fn delete_media(&self, id: i64) -> Result<()>;

    fn create_record(&self, record: NewRecord) -> Result<Record>;
    fn get_record(&self, kind: RecordKind, id: i64) -> Result<Record>;
    fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>>;
    /// Persist every mutable field of `record` and bump its modification time.
    fn update_record(&self, record: &Record) -> Result<Record>;
    fn delete_record(&self, kind: RecordKind, id: i64) -> Result<()>;

    /// Append one segment to a record; insertion order is kept.
    fn append_segment(
        &self,
        kind: RecordKind,
        record_id: i64,
        start: f64,
        end: f64,
        text: &str,
    ) -> Result<Segment>;
    /// Segments of a record in insertion order.
    fn segments(&self, kind: RecordKind, record_id: i64) -> Result<Vec<Segment>>;
}

impl<T: Store + ?Sized> Store for Arc<T> {
    fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        (**self).create_project(name, description)
    }

    fn get_project(&self, id: i64) -> Result<Project> {
        (**self).get_project(id)
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        (**self).list_projects()
    }

    fn delete_project(&self, id: i64) -> Result<()> {
        (**self).delete_project(id)
    }

    fn create_media(&self, media: NewMedia) -> Result<Media> {
        (**self).create_media(media)
    }

    fn get_media(&self, id: i64) -> Result<Media> {
        (**self).get_media(id)
    }

    fn list_media(&self, project_id: Option<i64>) -> Result<Vec<Media>> {
        (**self).list_media(project_id)
    }

    fn delete_media(&self, id: i64) -> Result<()> {
        (**self).delete_media(id)
    }

    fn create_record(&self, record: NewRecord) -> Result<Record> {
        (**self).create_record(record)
    }

    fn get_record(&self, kind: RecordKind, id: i64) -> Result<Record> {
        (**self).get_record(kind, id)
    }

    fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>> {
        (**self).list_records(kind)
    }

    fn update_record(&self, record: &Record) -> Result<Record> {
        (**self).update_record(record)
    }

    fn delete_record(&self, kind: RecordKind, id: i64) -> Result<()> {
        (**self).delete_record(kind, id)
    }

    fn append_segment(
        &self,
        kind: RecordKind,
        record_id: i64,
        start: f64,
        end: f64,
        text: &str,
    ) -> Result<Segment> {
        (**self).append_segment(kind, record_id, start, end, text)
    }

    fn segments(&self, kind: RecordKind, record_id: i64) -> Result<Vec<Segment>> {
        (**self).segments(kind, record_id)
    }
}
