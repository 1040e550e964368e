//! In-memory [`Store`] used by tests and dry runs.

use crate::error::{Result, SmartsumError};
use crate::record::{Media, NewMedia, NewRecord, Project, Record, RecordKind, Segment};
use crate::store::Store;
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    next_id: i64,
    projects: BTreeMap<i64, Project>,
    media: BTreeMap<i64, Media>,
    transcripts: BTreeMap<i64, Record>,
    translations: BTreeMap<i64, Record>,
    transcript_segments: Vec<Segment>,
    translation_segments: Vec<Segment>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn records(&mut self, kind: RecordKind) -> &mut BTreeMap<i64, Record> {
        match kind {
            RecordKind::Transcript => &mut self.transcripts,
            RecordKind::Translation => &mut self.translations,
        }
    }

    fn segments(&mut self, kind: RecordKind) -> &mut Vec<Segment> {
        match kind {
            RecordKind::Transcript => &mut self.transcript_segments,
            RecordKind::Translation => &mut self.translation_segments,
        }
    }

    fn remove_record(&mut self, kind: RecordKind, id: i64) {
        if self.records(kind).remove(&id).is_none() {
            return;
        }
        self.segments(kind).retain(|s| s.record_id != id);
        if kind == RecordKind::Transcript {
            let dependents: Vec<i64> = self
                .translations
                .values()
                .filter(|t| t.transcript_id == Some(id))
                .map(|t| t.id)
                .collect();
            for dependent in dependents {
                self.remove_record(RecordKind::Translation, dependent);
            }
        }
    }

    fn remove_media(&mut self, id: i64) {
        if self.media.remove(&id).is_none() {
            return;
        }
        for kind in [RecordKind::Transcript, RecordKind::Translation] {
            let owned: Vec<i64> = self
                .records(kind)
                .values()
                .filter(|r| r.media_id == Some(id))
                .map(|r| r.id)
                .collect();
            for record_id in owned {
                self.remove_record(kind, record_id);
            }
        }
    }
}

/// Store that keeps everything in process memory.
///
/// Ids are shared across tables and strictly increasing.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|e| SmartsumError::Store {
            message: format!("Failed to lock memory store: {}", e),
        })
    }
}

fn not_found(kind: &'static str, id: i64) -> SmartsumError {
    SmartsumError::NotFound { kind, id }
}

impl Store for MemoryStore {
    fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        let mut tables = self.lock()?;
        let now = Utc::now();
        let project = Project {
            id: tables.next_id(),
            name: name.to_string(),
            description: description.map(str::to_string),
            created_at: now,
            modified_at: now,
        };
        tables.projects.insert(project.id, project.clone());
        Ok(project)
    }

    fn get_project(&self, id: i64) -> Result<Project> {
        self.lock()?
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("project", id))
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(self.lock()?.projects.values().cloned().collect())
    }

    fn delete_project(&self, id: i64) -> Result<()> {
        let mut tables = self.lock()?;
        if tables.projects.remove(&id).is_none() {
            return Err(not_found("project", id));
        }
        let owned: Vec<i64> = tables
            .media
            .values()
            .filter(|m| m.project_id == id)
            .map(|m| m.id)
            .collect();
        for media_id in owned {
            tables.remove_media(media_id);
        }
        Ok(())
    }

    fn create_media(&self, media: NewMedia) -> Result<Media> {
        let mut tables = self.lock()?;
        if !tables.projects.contains_key(&media.project_id) {
            return Err(not_found("project", media.project_id));
        }
        let now = Utc::now();
        let media = Media {
            id: tables.next_id(),
            project_id: media.project_id,
            title: media.title,
            attachment: media.attachment,
            language: media.language,
            url: media.url,
            created_at: now,
            modified_at: now,
        };
        tables.media.insert(media.id, media.clone());
        Ok(media)
    }

    fn get_media(&self, id: i64) -> Result<Media> {
        self.lock()?
            .media
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("media", id))
    }

    fn list_media(&self, project_id: Option<i64>) -> Result<Vec<Media>> {
        Ok(self
            .lock()?
            .media
            .values()
            .filter(|m| project_id.is_none_or(|p| m.project_id == p))
            .cloned()
            .collect())
    }

    fn delete_media(&self, id: i64) -> Result<()> {
        let mut tables = self.lock()?;
        if !tables.media.contains_key(&id) {
            return Err(not_found("media", id));
        }
        tables.remove_media(id);
        Ok(())
    }

    fn create_record(&self, record: NewRecord) -> Result<Record> {
        let mut tables = self.lock()?;
        if let Some(media_id) = record.media_id
            && !tables.media.contains_key(&media_id)
        {
            return Err(not_found("media", media_id));
        }
        if let Some(transcript_id) = record.transcript_id
            && !tables.transcripts.contains_key(&transcript_id)
        {
            return Err(not_found("transcript", transcript_id));
        }
        let now = Utc::now();
        let record = Record {
            id: tables.next_id(),
            kind: record.kind,
            title: record.title,
            media_id: record.media_id,
            transcript_id: record.transcript_id,
            language: record.language,
            full: record.full,
            summary: None,
            reference: None,
            wer: None,
            ts_start: None,
            ts_end: None,
            created_at: now,
            modified_at: now,
        };
        tables.records(record.kind).insert(record.id, record.clone());
        Ok(record)
    }

    fn get_record(&self, kind: RecordKind, id: i64) -> Result<Record> {
        self.lock()?
            .records(kind)
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found(kind.as_str(), id))
    }

    fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>> {
        Ok(self.lock()?.records(kind).values().cloned().collect())
    }

    fn update_record(&self, record: &Record) -> Result<Record> {
        let mut tables = self.lock()?;
        let stored = tables
            .records(record.kind)
            .get_mut(&record.id)
            .ok_or_else(|| not_found(record.kind.as_str(), record.id))?;
        let created_at = stored.created_at;
        *stored = record.clone();
        stored.created_at = created_at;
        stored.modified_at = Utc::now();
        Ok(stored.clone())
    }

    fn delete_record(&self, kind: RecordKind, id: i64) -> Result<()> {
        let mut tables = self.lock()?;
        if !tables.records(kind).contains_key(&id) {
            return Err(not_found(kind.as_str(), id));
        }
        tables.remove_record(kind, id);
        Ok(())
    }

    fn append_segment(
        &self,
        kind: RecordKind,
        record_id: i64,
        start: f64,
        end: f64,
        text: &str,
    ) -> Result<Segment> {
        let mut tables = self.lock()?;
        if !tables.records(kind).contains_key(&record_id) {
            return Err(not_found(kind.as_str(), record_id));
        }
        let segment = Segment {
            id: tables.next_id(),
            record_id,
            start,
            end,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        tables.segments(kind).push(segment.clone());
        Ok(segment)
    }

    fn segments(&self, kind: RecordKind, record_id: i64) -> Result<Vec<Segment>> {
        Ok(self
            .lock()?
            .segments(kind)
            .iter()
            .filter(|s| s.record_id == record_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded() -> (MemoryStore, Media) {
        let store = MemoryStore::new();
        let project = store.create_project("demo", None).unwrap();
        let media = store
            .create_media(NewMedia {
                project_id: project.id,
                title: Some("clip".to_string()),
                language: Some("en".to_string()),
                ..Default::default()
            })
            .unwrap();
        (store, media)
    }

    #[test]
    fn segments_keep_insertion_order() {
        let (store, media) = seeded();
        let record = store.create_record(NewRecord::transcript(&media)).unwrap();

        store
            .append_segment(RecordKind::Transcript, record.id, 2.0, 3.0, "second")
            .unwrap();
        store
            .append_segment(RecordKind::Transcript, record.id, 0.0, 1.0, "first")
            .unwrap();

        let texts: Vec<String> = store
            .segments(RecordKind::Transcript, record.id)
            .unwrap()
            .into_iter()
            .map(|s| s.text)
            .collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[test]
    fn segments_are_scoped_by_kind() {
        let (store, media) = seeded();
        let transcript = store.create_record(NewRecord::transcript(&media)).unwrap();
        store
            .append_segment(RecordKind::Transcript, transcript.id, 0.0, 1.0, "x")
            .unwrap();

        assert!(
            store
                .segments(RecordKind::Translation, transcript.id)
                .unwrap()
                .is_empty()
        );
        assert!(
            store
                .append_segment(RecordKind::Translation, transcript.id, 0.0, 1.0, "y")
                .is_err()
        );
    }

    #[test]
    fn update_record_keeps_created_at() {
        let (store, media) = seeded();
        let mut record = store.create_record(NewRecord::transcript(&media)).unwrap();
        let created = record.created_at;

        record.full = Some("done".to_string());
        record.created_at = Utc::now() + chrono::TimeDelta::days(1);
        let updated = store.update_record(&record).unwrap();

        assert_eq!(updated.full.as_deref(), Some("done"));
        assert_eq!(updated.created_at, created);
    }

    #[test]
    fn deleting_project_cascades() {
        let (store, media) = seeded();
        let transcript = store.create_record(NewRecord::transcript(&media)).unwrap();
        store
            .append_segment(RecordKind::Transcript, transcript.id, 0.0, 1.0, "x")
            .unwrap();
        let translation = store
            .create_record(NewRecord::translation_of_transcript(&transcript, "he"))
            .unwrap();

        store.delete_project(media.project_id).unwrap();

        assert!(store.get_media(media.id).is_err());
        assert!(store.get_record(RecordKind::Transcript, transcript.id).is_err());
        assert!(
            store
                .get_record(RecordKind::Translation, translation.id)
                .is_err()
        );
        assert!(
            store
                .segments(RecordKind::Transcript, transcript.id)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn create_media_requires_project() {
        let store = MemoryStore::new();
        let result = store.create_media(NewMedia {
            project_id: 42,
            ..Default::default()
        });
        assert!(matches!(
            result,
            Err(SmartsumError::NotFound {
                kind: "project",
                id: 42
            })
        ));
    }

    #[test]
    fn list_media_filters_by_project() {
        let (store, media) = seeded();
        let other = store.create_project("other", Some("second")).unwrap();
        store
            .create_media(NewMedia {
                project_id: other.id,
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.list_media(None).unwrap().len(), 2);
        let filtered = store.list_media(Some(media.project_id)).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, media.id);
    }
}
