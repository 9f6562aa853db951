//! SQLite-backed note database.
//!
//! Schema:
//! - `notes(id, updated_at, value)`: note metadata as JSON, `elements` empty,
//!   indexed by `updated_at` (`by-updatedAt`);
//! - `strokes(key, note_id, value)`: one row per stroke, autoincrement key
//!   for insertion order, indexed by `note_id` (`by-noteId`).
//!
//! Schema versions are tracked in `PRAGMA user_version`.

use super::{BoxFuture, NoteDatabase, StorageError, StorageResult};
use crate::note::Note;
use crate::stroke::Stroke;
use chrono::SecondsFormat;
use log::{debug, info, warn};
use rusqlite::{Connection, OptionalExtension, params};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// File name of the database inside the data directory.
pub const DATABASE_FILE: &str = "canvas_notes_db.sqlite3";

const NOTE_INDEX: &str = "by-noteId";

struct Migration {
    version: u32,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    sql: include_str!("migrations/0001_init.sql"),
}];

fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Where the database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbLocation {
    File(PathBuf),
    Memory,
}

/// Note database on top of a single SQLite connection.
pub struct SqliteNoteDatabase {
    location: DbLocation,
    conn: Mutex<Option<Connection>>,
}

impl SqliteNoteDatabase {
    /// Open (or create) a database file and apply pending migrations.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        Self::with_location(DbLocation::File(path.as_ref().to_path_buf()))
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_location(DbLocation::Memory)
    }

    fn with_location(location: DbLocation) -> StorageResult<Self> {
        let conn = connect(&location)?;
        Ok(Self {
            location,
            conn: Mutex::new(Some(conn)),
        })
    }

    pub fn location(&self) -> &DbLocation {
        &self.location
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Option<Connection>>> {
        self.conn
            .lock()
            .map_err(|e| StorageError::Unavailable(format!("Lock error: {}", e)))
    }

    fn with_conn<T>(&self, f: impl FnOnce(&mut Connection) -> StorageResult<T>) -> StorageResult<T> {
        let mut guard = self.lock()?;
        let conn = guard
            .as_mut()
            .ok_or_else(|| StorageError::Unavailable("database is closed".to_string()))?;
        f(conn)
    }

    /// Number of stroke rows stored for a note.
    pub fn stroke_count(&self, note_id: &str) -> StorageResult<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM strokes WHERE note_id = ?1",
                params![note_id],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }
}

fn connect(location: &DbLocation) -> StorageResult<Connection> {
    let mut conn = match location {
        DbLocation::File(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Io(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            Connection::open(path)?
        }
        DbLocation::Memory => Connection::open_in_memory()?,
    };
    conn.busy_timeout(Duration::from_secs(5))?;
    apply_migrations(&mut conn)?;
    debug!("Opened note database ({:?})", location);
    Ok(conn)
}

fn apply_migrations(conn: &mut Connection) -> StorageResult<()> {
    let current: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let latest = latest_version();

    if current > latest {
        return Err(StorageError::SchemaMismatch(format!(
            "database version {} is newer than supported version {}",
            current, latest
        )));
    }
    if current == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        tx.execute_batch(migration.sql)?;
        tx.execute_batch(&format!("PRAGMA user_version = {};", migration.version))?;
    }
    tx.commit()?;
    info!("Migrated note database from version {} to {}", current, latest);
    Ok(())
}

fn has_note_index(conn: &Connection) -> StorageResult<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master \
         WHERE type = 'index' AND name = ?1 AND tbl_name = 'strokes')",
        params![NOTE_INDEX],
        |row| row.get(0),
    )?;
    Ok(exists)
}

fn metadata_row(note: &Note) -> StorageResult<(String, String)> {
    let updated_at = note.updated_at.to_rfc3339_opts(SecondsFormat::Millis, true);
    let value = serde_json::to_string(&note.metadata())?;
    Ok((updated_at, value))
}

fn put_metadata_row(conn: &Connection, note: &Note) -> StorageResult<()> {
    let (updated_at, value) = metadata_row(note)?;
    conn.execute(
        "INSERT INTO notes (id, updated_at, value) VALUES (?1, ?2, ?3) \
         ON CONFLICT(id) DO UPDATE SET updated_at = excluded.updated_at, value = excluded.value",
        params![note.id, updated_at, value],
    )?;
    Ok(())
}

fn remove_files(path: &Path) -> StorageResult<()> {
    let mut targets = vec![path.to_path_buf()];
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        targets.push(PathBuf::from(name));
    }
    for target in targets {
        if target.exists() {
            fs::remove_file(&target).map_err(|e| {
                StorageError::Io(format!("Failed to delete {}: {}", target.display(), e))
            })?;
        }
    }
    Ok(())
}

impl NoteDatabase for SqliteNoteDatabase {
    fn save_note<'a>(&'a self, note: &'a Note, strokes: &'a [Stroke]) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.with_conn(|conn| {
                let tx = conn.transaction()?;
                put_metadata_row(&tx, note)?;
                tx.execute("DELETE FROM strokes WHERE note_id = ?1", params![note.id])?;
                {
                    let mut insert =
                        tx.prepare("INSERT INTO strokes (note_id, value) VALUES (?1, ?2)")?;
                    for stroke in strokes {
                        let value = serde_json::to_string(stroke)?;
                        insert.execute(params![note.id, value])?;
                    }
                }
                tx.commit()?;
                debug!("Saved note {} with {} stroke(s)", note.id, strokes.len());
                Ok(())
            })
        })
    }

    fn put_metadata<'a>(&'a self, note: &'a Note) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move { self.with_conn(|conn| put_metadata_row(conn, note)) })
    }

    fn get_note<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StorageResult<Note>> {
        Box::pin(async move {
            self.with_conn(|conn| {
                let value: Option<String> = conn
                    .query_row("SELECT value FROM notes WHERE id = ?1", params![id], |row| {
                        row.get(0)
                    })
                    .optional()?;
                let value = value.ok_or_else(|| StorageError::NotFound(id.to_string()))?;
                Ok(serde_json::from_str(&value)?)
            })
        })
    }

    fn get_strokes<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, StorageResult<Vec<Stroke>>> {
        Box::pin(async move {
            self.with_conn(|conn| {
                if !has_note_index(conn)? {
                    return Err(StorageError::SchemaMismatch(format!(
                        "index \"{}\" on strokes is missing",
                        NOTE_INDEX
                    )));
                }
                let mut stmt = conn.prepare(
                    "SELECT value FROM strokes INDEXED BY \"by-noteId\" \
                     WHERE note_id = ?1 ORDER BY key",
                )?;
                let rows = stmt.query_map(params![note_id], |row| row.get::<_, String>(0))?;
                let mut strokes = Vec::new();
                for value in rows {
                    strokes.push(serde_json::from_str(&value?)?);
                }
                Ok(strokes)
            })
        })
    }

    fn list_notes(&self) -> BoxFuture<'_, StorageResult<Vec<Note>>> {
        Box::pin(async move {
            self.with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT value FROM notes ORDER BY updated_at DESC, id DESC")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut notes = Vec::new();
                for value in rows {
                    let value = value?;
                    match serde_json::from_str::<Note>(&value) {
                        Ok(note) => notes.push(note),
                        Err(e) => warn!("Skipping unreadable note row: {}", e),
                    }
                }
                Ok(notes)
            })
        })
    }

    fn delete_note<'a>(&'a self, id: &'a str) -> BoxFuture<'a, StorageResult<()>> {
        Box::pin(async move {
            self.with_conn(|conn| {
                let tx = conn.transaction()?;
                let strokes = tx.execute("DELETE FROM strokes WHERE note_id = ?1", params![id])?;
                tx.execute("DELETE FROM notes WHERE id = ?1", params![id])?;
                tx.commit()?;
                debug!("Deleted note {} and {} stroke row(s)", id, strokes);
                Ok(())
            })
        })
    }

    fn recreate(&self) -> BoxFuture<'_, StorageResult<()>> {
        Box::pin(async move {
            let mut guard = self.lock()?;
            // Drop the old connection before touching the files.
            guard.take();
            if let DbLocation::File(path) = &self.location {
                remove_files(path)?;
            }
            *guard = Some(connect(&self.location)?);
            info!("Recreated note database ({:?})", self.location);
            Ok(())
        })
    }

    fn close(&self) {
        match self.conn.lock() {
            Ok(mut guard) => {
                if let Some(conn) = guard.take() {
                    if let Err((_, e)) = conn.close() {
                        warn!("Failed to close note database cleanly: {}", e);
                    }
                }
            }
            Err(e) => warn!("Failed to close note database: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_util::block_on;
    use crate::stroke::{Point, StrokeStyle};
    use tempfile::tempdir;

    fn stroke(id: u64) -> Stroke {
        let points = vec![Point::new(0.0, 0.0, 0.5), Point::new(id as f64, 4.0, 0.7)];
        Stroke::finalize(id, points, &StrokeStyle::default()).unwrap()
    }

    #[test]
    fn test_save_and_read_back() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        let note = Note::new("1", "Sketch");
        let strokes = vec![stroke(3), stroke(1), stroke(2)];

        block_on(db.save_note(&note, &strokes)).unwrap();

        let loaded = block_on(db.get_note("1")).unwrap();
        assert_eq!(loaded.title, "Sketch");
        assert!(loaded.elements.is_empty());

        let ids: Vec<_> = block_on(db.get_strokes("1")).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_save_replaces_strokes() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        let note = Note::new("1", "Sketch");
        block_on(db.save_note(&note, &[stroke(1), stroke(2)])).unwrap();
        block_on(db.save_note(&note, &[stroke(2)])).unwrap();

        assert_eq!(db.stroke_count("1").unwrap(), 1);
    }

    #[test]
    fn test_missing_note() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        assert!(matches!(block_on(db.get_note("nope")), Err(StorageError::NotFound(_))));
        assert!(block_on(db.get_strokes("nope")).unwrap().is_empty());
    }

    #[test]
    fn test_delete_removes_stroke_rows() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        block_on(db.save_note(&Note::new("1", "A"), &[stroke(1), stroke(2)])).unwrap();
        block_on(db.save_note(&Note::new("2", "B"), &[stroke(3)])).unwrap();

        block_on(db.delete_note("1")).unwrap();

        assert_eq!(db.stroke_count("1").unwrap(), 0);
        assert_eq!(db.stroke_count("2").unwrap(), 1);
        assert!(matches!(block_on(db.get_note("1")), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_list_most_recent_first() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        let mut older = Note::new("1", "Older");
        older.updated_at = older.updated_at - chrono::Duration::seconds(60);
        let newer = Note::new("2", "Newer");
        block_on(db.put_metadata(&older)).unwrap();
        block_on(db.put_metadata(&newer)).unwrap();

        let titles: Vec<_> = block_on(db.list_notes()).unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["Newer", "Older"]);
    }

    #[test]
    fn test_missing_index_is_schema_mismatch() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        db.with_conn(|conn| {
            conn.execute_batch("DROP INDEX \"by-noteId\";")?;
            Ok(())
        })
        .unwrap();

        assert!(matches!(
            block_on(db.get_strokes("1")),
            Err(StorageError::SchemaMismatch(_))
        ));

        block_on(db.recreate()).unwrap();
        assert!(block_on(db.get_strokes("1")).unwrap().is_empty());
    }

    #[test]
    fn test_recreate_file_discards_data() {
        let dir = tempdir().unwrap();
        let db = SqliteNoteDatabase::open(dir.path().join(DATABASE_FILE)).unwrap();
        block_on(db.save_note(&Note::new("1", "A"), &[stroke(1)])).unwrap();

        block_on(db.recreate()).unwrap();

        assert!(block_on(db.list_notes()).unwrap().is_empty());
        assert_eq!(db.stroke_count("1").unwrap(), 0);
    }

    #[test]
    fn test_closed_database_is_unavailable() {
        let db = SqliteNoteDatabase::open_in_memory().unwrap();
        db.close();
        assert!(matches!(block_on(db.list_notes()), Err(StorageError::Unavailable(_))));
        db.close();
    }

    #[test]
    fn test_file_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(DATABASE_FILE);
        {
            let db = SqliteNoteDatabase::open(&path).unwrap();
            block_on(db.save_note(&Note::new("1", "Kept"), &[stroke(1)])).unwrap();
            db.close();
        }
        let db = SqliteNoteDatabase::open(&path).unwrap();
        assert_eq!(block_on(db.get_note("1")).unwrap().title, "Kept");
        assert_eq!(block_on(db.get_strokes("1")).unwrap().len(), 1);
    }
}
