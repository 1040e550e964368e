//! SQLite-backed [`Store`].

use crate::error::{Result, SmartsumError};
use crate::record::{Media, NewMedia, NewRecord, Project, Record, RecordKind, Segment};
use crate::store::Store;
use crate::store::migrations;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const PROJECT_COLUMNS: &str = "id, name, description, created_at, modified_at";
const MEDIA_COLUMNS: &str =
    "id, project_id, title, attachment, language, url, created_at, modified_at";

fn record_table(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Transcript => "transcripts",
        RecordKind::Translation => "translations",
    }
}

/// Column list for a record query; transcripts have no source transcript.
fn record_columns(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Transcript => {
            "id, title, media_id, NULL AS transcript_id, language, full_text, summary, reference, \
             wer, ts_start, ts_end, created_at, modified_at"
        }
        RecordKind::Translation => {
            "id, title, media_id, transcript_id, language, full_text, summary, reference, \
             wer, ts_start, ts_end, created_at, modified_at"
        }
    }
}

/// Segment table and its parent key column.
fn segment_table(kind: RecordKind) -> (&'static str, &'static str) {
    match kind {
        RecordKind::Transcript => ("transcript_segments", "transcript_id"),
        RecordKind::Translation => ("translation_segments", "translation_id"),
    }
}

fn row_to_project(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: row.get(3)?,
        modified_at: row.get(4)?,
    })
}

fn row_to_media(row: &Row<'_>) -> rusqlite::Result<Media> {
    let attachment: Option<String> = row.get(3)?;
    Ok(Media {
        id: row.get(0)?,
        project_id: row.get(1)?,
        title: row.get(2)?,
        attachment: attachment.map(PathBuf::from),
        language: row.get(4)?,
        url: row.get(5)?,
        created_at: row.get(6)?,
        modified_at: row.get(7)?,
    })
}

fn row_to_record(kind: RecordKind, row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        id: row.get(0)?,
        kind,
        title: row.get(1)?,
        media_id: row.get(2)?,
        transcript_id: row.get(3)?,
        language: row.get(4)?,
        full: row.get(5)?,
        summary: row.get(6)?,
        reference: row.get(7)?,
        wer: row.get(8)?,
        ts_start: row.get(9)?,
        ts_end: row.get(10)?,
        created_at: row.get(11)?,
        modified_at: row.get(12)?,
    })
}

fn row_to_segment(row: &Row<'_>) -> rusqlite::Result<Segment> {
    Ok(Segment {
        id: row.get(0)?,
        record_id: row.get(1)?,
        start: row.get(2)?,
        end: row.get(3)?,
        text: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn not_found(kind: &'static str, id: i64) -> SmartsumError {
    SmartsumError::NotFound { kind, id }
}

/// Store that owns a single SQLite connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` and run migrations.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self::from_connection(conn, Some(db_path.to_path_buf()))?;
        log::info!("Database initialized at: {}", db_path.display());
        Ok(store)
    }

    /// Database that lives only as long as the store.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, None)
    }

    fn from_connection(conn: Connection, db_path: Option<PathBuf>) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    /// Path of the database file, `None` for in-memory stores.
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| SmartsumError::Store {
            message: format!("Failed to lock database connection: {}", e),
        })?;
        f(&conn)
    }
}

fn get_record_impl(conn: &Connection, kind: RecordKind, id: i64) -> Result<Record> {
    let sql = format!(
        "SELECT {} FROM {} WHERE id = ?1",
        record_columns(kind),
        record_table(kind)
    );
    conn.query_row(&sql, params![id], |row| row_to_record(kind, row))
        .optional()?
        .ok_or_else(|| not_found(kind.as_str(), id))
}

fn delete_by_id(conn: &Connection, table: &str, kind: &'static str, id: i64) -> Result<()> {
    let deleted = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    if deleted == 0 {
        return Err(not_found(kind, id));
    }
    Ok(())
}

impl Store for SqliteStore {
    fn create_project(&self, name: &str, description: Option<&str>) -> Result<Project> {
        self.with_connection(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO projects (name, description, created_at, modified_at) \
                 VALUES (?1, ?2, ?3, ?3)",
                params![name, description, now],
            )?;
            Ok(Project {
                id: conn.last_insert_rowid(),
                name: name.to_string(),
                description: description.map(str::to_string),
                created_at: now,
                modified_at: now,
            })
        })
    }

    fn get_project(&self, id: i64) -> Result<Project> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = ?1"),
                params![id],
                row_to_project,
            )
            .optional()?
            .ok_or_else(|| not_found("project", id))
        })
    }

    fn list_projects(&self) -> Result<Vec<Project>> {
        self.with_connection(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {PROJECT_COLUMNS} FROM projects ORDER BY id"))?;
            let projects = stmt
                .query_map([], row_to_project)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(projects)
        })
    }

    fn delete_project(&self, id: i64) -> Result<()> {
        self.with_connection(|conn| delete_by_id(conn, "projects", "project", id))
    }

    fn create_media(&self, media: NewMedia) -> Result<Media> {
        self.with_connection(|conn| {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM projects WHERE id = ?1",
                params![media.project_id],
                |row| row.get(0),
            )?;
            if !exists {
                return Err(not_found("project", media.project_id));
            }

            let now = Utc::now();
            let attachment = media
                .attachment
                .as_ref()
                .map(|p| p.to_string_lossy().to_string());
            conn.execute(
                "INSERT INTO media (project_id, title, attachment, language, url, created_at, modified_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![
                    media.project_id,
                    media.title,
                    attachment,
                    media.language,
                    media.url,
                    now
                ],
            )?;
            Ok(Media {
                id: conn.last_insert_rowid(),
                project_id: media.project_id,
                title: media.title,
                attachment: media.attachment,
                language: media.language,
                url: media.url,
                created_at: now,
                modified_at: now,
            })
        })
    }

    fn get_media(&self, id: i64) -> Result<Media> {
        self.with_connection(|conn| {
            conn.query_row(
                &format!("SELECT {MEDIA_COLUMNS} FROM media WHERE id = ?1"),
                params![id],
                row_to_media,
            )
            .optional()?
            .ok_or_else(|| not_found("media", id))
        })
    }

    fn list_media(&self, project_id: Option<i64>) -> Result<Vec<Media>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEDIA_COLUMNS} FROM media \
                 WHERE ?1 IS NULL OR project_id = ?1 ORDER BY id"
            ))?;
            let media = stmt
                .query_map(params![project_id], row_to_media)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(media)
        })
    }

    fn delete_media(&self, id: i64) -> Result<()> {
        self.with_connection(|conn| delete_by_id(conn, "media", "media", id))
    }

    fn create_record(&self, record: NewRecord) -> Result<Record> {
        self.with_connection(|conn| {
            let now = Utc::now();
            let inserted = match record.kind {
                RecordKind::Transcript => conn.execute(
                    "INSERT INTO transcripts (title, media_id, language, full_text, created_at, modified_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![record.title, record.media_id, record.language, record.full, now],
                ),
                RecordKind::Translation => conn.execute(
                    "INSERT INTO translations \
                     (title, media_id, transcript_id, language, full_text, created_at, modified_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![
                        record.title,
                        record.media_id,
                        record.transcript_id,
                        record.language,
                        record.full,
                        now
                    ],
                ),
            };
            inserted.map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    SmartsumError::Store {
                        message: format!(
                            "{} references a missing media or transcript",
                            record.kind
                        ),
                    }
                }
                other => other.into(),
            })?;
            get_record_impl(conn, record.kind, conn.last_insert_rowid())
        })
    }

    fn get_record(&self, kind: RecordKind, id: i64) -> Result<Record> {
        self.with_connection(|conn| get_record_impl(conn, kind, id))
    }

    fn list_records(&self, kind: RecordKind) -> Result<Vec<Record>> {
        self.with_connection(|conn| {
            let sql = format!(
                "SELECT {} FROM {} ORDER BY id",
                record_columns(kind),
                record_table(kind)
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map([], |row| row_to_record(kind, row))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }

    fn update_record(&self, record: &Record) -> Result<Record> {
        self.with_connection(|conn| {
            let sql = format!(
                "UPDATE {} SET title = ?1, language = ?2, full_text = ?3, summary = ?4, \
                 reference = ?5, wer = ?6, ts_start = ?7, ts_end = ?8, modified_at = ?9 \
                 WHERE id = ?10",
                record_table(record.kind)
            );
            let updated = conn.execute(
                &sql,
                params![
                    record.title,
                    record.language,
                    record.full,
                    record.summary,
                    record.reference,
                    record.wer,
                    record.ts_start,
                    record.ts_end,
                    Utc::now(),
                    record.id
                ],
            )?;
            if updated == 0 {
                return Err(not_found(record.kind.as_str(), record.id));
            }
            get_record_impl(conn, record.kind, record.id)
        })
    }

    fn delete_record(&self, kind: RecordKind, id: i64) -> Result<()> {
        self.with_connection(|conn| delete_by_id(conn, record_table(kind), kind.as_str(), id))
    }

    fn append_segment(
        &self,
        kind: RecordKind,
        record_id: i64,
        start: f64,
        end: f64,
        text: &str,
    ) -> Result<Segment> {
        self.with_connection(|conn| {
            // Fails with a clear error instead of a bare constraint violation.
            get_record_impl(conn, kind, record_id)?;

            let (table, parent) = segment_table(kind);
            let now = Utc::now();
            conn.execute(
                &format!(
                    "INSERT INTO {table} ({parent}, start_time, end_time, text, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5)"
                ),
                params![record_id, start, end, text, now],
            )?;
            Ok(Segment {
                id: conn.last_insert_rowid(),
                record_id,
                start,
                end,
                text: text.to_string(),
                created_at: now,
            })
        })
    }

    fn segments(&self, kind: RecordKind, record_id: i64) -> Result<Vec<Segment>> {
        self.with_connection(|conn| {
            let (table, parent) = segment_table(kind);
            let mut stmt = conn.prepare(&format!(
                "SELECT id, {parent}, start_time, end_time, text, created_at \
                 FROM {table} WHERE {parent} = ?1 ORDER BY id"
            ))?;
            let segments = stmt
                .query_map(params![record_id], row_to_segment)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(segments)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn seeded() -> (SqliteStore, Media) {
        let store = SqliteStore::open_in_memory().unwrap();
        let project = store.create_project("demo", Some("desc")).unwrap();
        let media = store
            .create_media(NewMedia {
                project_id: project.id,
                title: Some("clip".to_string()),
                attachment: Some(PathBuf::from("/tmp/clip.wav")),
                language: Some("he".to_string()),
                url: None,
            })
            .unwrap();
        (store, media)
    }

    #[test]
    fn open_creates_database_file() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("smartsum.db");

        let store = SqliteStore::open(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.db_path(), Some(db_path.as_path()));
        assert!(store.list_projects().unwrap().is_empty());
    }

    #[test]
    fn media_round_trips_attachment_path() {
        let (store, media) = seeded();
        let loaded = store.get_media(media.id).unwrap();
        assert_eq!(loaded.attachment, Some(PathBuf::from("/tmp/clip.wav")));
        assert_eq!(loaded.language.as_deref(), Some("he"));
    }

    #[test]
    fn update_record_persists_all_mutable_fields() {
        let (store, media) = seeded();
        let mut record = store.create_record(NewRecord::transcript(&media)).unwrap();
        assert_eq!(record.transcript_id, None);

        let start = Utc::now();
        record.ts_start = Some(start);
        record.ts_end = Some(start + chrono::TimeDelta::seconds(5));
        record.full = Some("a\nb".to_string());
        record.reference = Some("a b".to_string());
        record.wer = Some(0.0);
        record.summary = Some("ab".to_string());
        store.update_record(&record).unwrap();

        let loaded = store.get_record(RecordKind::Transcript, record.id).unwrap();
        assert_eq!(loaded.full.as_deref(), Some("a\nb"));
        assert_eq!(loaded.wer, Some(0.0));
        assert_eq!(loaded.summary.as_deref(), Some("ab"));
        assert_eq!(loaded.time_elapsed(), chrono::TimeDelta::seconds(5));
    }

    #[test]
    fn segments_come_back_in_insertion_order() {
        let (store, media) = seeded();
        let record = store
            .create_record(NewRecord::translation_of_media(&media, "en"))
            .unwrap();
        for (i, text) in ["one", "two", "three"].iter().enumerate() {
            store
                .append_segment(RecordKind::Translation, record.id, i as f64, i as f64 + 0.5, text)
                .unwrap();
        }

        let segments = store.segments(RecordKind::Translation, record.id).unwrap();
        let texts: Vec<&str> = segments.iter().map(|s| s.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "two", "three"]);
        assert_eq!(segments[2].start, 2.0);
    }

    #[test]
    fn append_segment_to_missing_record_fails() {
        let (store, _) = seeded();
        let result = store.append_segment(RecordKind::Transcript, 999, 0.0, 1.0, "x");
        assert!(matches!(
            result,
            Err(SmartsumError::NotFound {
                kind: "transcript",
                id: 999
            })
        ));
    }

    #[test]
    fn deleting_media_cascades_to_records_and_segments() {
        let (store, media) = seeded();
        let transcript = store.create_record(NewRecord::transcript(&media)).unwrap();
        store
            .append_segment(RecordKind::Transcript, transcript.id, 0.0, 1.0, "x")
            .unwrap();
        let translation = store
            .create_record(NewRecord::translation_of_transcript(&transcript, "en"))
            .unwrap();
        assert_eq!(translation.transcript_id, Some(transcript.id));

        store.delete_media(media.id).unwrap();

        assert!(store.list_records(RecordKind::Transcript).unwrap().is_empty());
        assert!(store.list_records(RecordKind::Translation).unwrap().is_empty());
        assert!(
            store
                .segments(RecordKind::Transcript, transcript.id)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn create_media_for_missing_project_fails() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = store.create_media(NewMedia {
            project_id: 5,
            ..Default::default()
        });
        assert!(matches!(result, Err(SmartsumError::NotFound { .. })));
    }

    #[test]
    fn delete_missing_project_reports_not_found() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.delete_project(1),
            Err(SmartsumError::NotFound { kind: "project", .. })
        ));
    }
}
