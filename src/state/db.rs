//! State database trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

use super::error::StateError;
use super::schema;
#[cfg(test)]
use super::types::PhotoRow;
use super::types::{AlbumRecord, PhotoRecord, SavedPhoto, StoreSummary, UpsertStats};

/// Trait for state database operations.
///
/// Every batch method runs inside a single transaction: either the whole
/// batch is committed or none of it is.
#[async_trait]
pub trait PhotoDb: Send + Sync {
    /// Insert new albums and refresh title, description and URL of known ones.
    async fn upsert_albums(&self, albums: &[AlbumRecord]) -> Result<UpsertStats, StateError>;

    /// Insert new photos and refresh the mutable fields of known ones.
    ///
    /// `created`, `deleted` and `saved` are never touched on update, and a
    /// missing capture time keeps the stored one. When `album` is given, an `(album, photo)` row is added for each photo not
    /// already linked.
    async fn upsert_photos(
        &self,
        photos: &[PhotoRecord],
        album: Option<&str>,
    ) -> Result<UpsertStats, StateError>;

    /// Flag photos as saved locally.
    async fn mark_saved_batch(&self, saved: &[SavedPhoto]) -> Result<(), StateError>;

    /// Flag photos as deleted remotely. Rows are kept.
    async fn mark_deleted_batch(&self, ids: &[String]) -> Result<(), StateError>;

    /// Read back one photo row (for testing).
    #[cfg(test)]
    async fn get_photo(&self, id: &str) -> Result<Option<PhotoRow>, StateError>;

    /// Number of photos linked to an album (for testing).
    #[cfg(test)]
    async fn album_photo_count(&self, album: &str) -> Result<u64, StateError>;

    async fn get_summary(&self) -> Result<StoreSummary, StateError>;
}

/// SQLite implementation of the state database.
pub struct SqlitePhotoDb {
    /// Wrapped in Mutex because rusqlite::Connection is not Sync.
    conn: Mutex<Connection>,
    /// Path to the database file (for error messages).
    path: PathBuf,
}

impl std::fmt::Debug for SqlitePhotoDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePhotoDb")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqlitePhotoDb {
    /// Open or create a database at the given path, creating parent
    /// directories as needed.
    pub async fn open(path: &Path) -> Result<Self, StateError> {
        let path = path.to_path_buf();
        let path_clone = path.clone();

        let conn = tokio::task::spawn_blocking(move || {
            if let Some(parent) = path_clone.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| StateError::CreateDir {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }

            let conn = Connection::open(&path_clone).map_err(|e| StateError::Open {
                path: path_clone.clone(),
                source: e,
            })?;

            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(StateError::Migration)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(StateError::Migration)?;

            schema::migrate(&conn)?;

            Ok::<_, StateError>(conn)
        })
        .await??;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Open an in-memory database (for testing).
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(|e| StateError::Open {
            path: PathBuf::from(":memory:"),
            source: e,
        })?;
        schema::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StateError> {
        self.conn
            .lock()
            .map_err(|e| StateError::Query(e.to_string()))
    }
}

/// Run `body` between BEGIN and COMMIT, rolling back if it fails.
fn in_transaction<T>(
    conn: &Connection,
    body: impl FnOnce(&Connection) -> Result<T, StateError>,
) -> Result<T, StateError> {
    conn.execute("BEGIN TRANSACTION", [])
        .map_err(StateError::query)?;

    match body(conn) {
        Ok(value) => {
            conn.execute("COMMIT", []).map_err(StateError::query)?;
            Ok(value)
        }
        Err(e) => {
            let _ = conn.execute("ROLLBACK", []);
            Err(e)
        }
    }
}

fn row_exists(conn: &Connection, sql: &str, params: impl rusqlite::Params) -> Result<bool, StateError> {
    conn.prepare_cached(sql)
        .map_err(StateError::query)?
        .query_row(params, |_| Ok(()))
        .optional()
        .map(|found| found.is_some())
        .map_err(StateError::query)
}

#[async_trait]
impl PhotoDb for SqlitePhotoDb {
    async fn upsert_albums(&self, albums: &[AlbumRecord]) -> Result<UpsertStats, StateError> {
        if albums.is_empty() {
            return Ok(UpsertStats::default());
        }
        let conn = self.lock()?;

        in_transaction(&conn, |conn| {
            let mut stats = UpsertStats::default();
            for album in albums {
                if row_exists(conn, "SELECT 1 FROM albums WHERE id = ?1", [&album.id])? {
                    conn.prepare_cached(
                        "UPDATE albums SET title = ?1, description = ?2, url = ?3 WHERE id = ?4",
                    )
                    .map_err(StateError::query)?
                    .execute(rusqlite::params![
                        album.title,
                        album.description,
                        album.url,
                        album.id
                    ])
                    .map_err(StateError::query)?;
                    stats.updated += 1;
                } else {
                    conn.prepare_cached(
                        "INSERT INTO albums (id, title, description, created, url) VALUES (?1, ?2, ?3, ?4, ?5)",
                    )
                    .map_err(StateError::query)?
                    .execute(rusqlite::params![
                        album.id,
                        album.title,
                        album.description,
                        album.created,
                        album.url
                    ])
                    .map_err(StateError::query)?;
                    stats.inserted += 1;
                }
            }
            Ok(stats)
        })
    }

    async fn upsert_photos(
        &self,
        photos: &[PhotoRecord],
        album: Option<&str>,
    ) -> Result<UpsertStats, StateError> {
        if photos.is_empty() {
            return Ok(UpsertStats::default());
        }
        let last_seen_at = Utc::now().timestamp();
        let conn = self.lock()?;

        in_transaction(&conn, |conn| {
            let mut stats = UpsertStats::default();
            for photo in photos {
                if row_exists(conn, "SELECT 1 FROM photos WHERE id = ?1", [&photo.id])? {
                    conn.prepare_cached(
                        "UPDATE photos SET title = ?1, description = ?2, url = ?3, taken = COALESCE(?4, taken), last_seen_at = ?5 WHERE id = ?6",
                    )
                    .map_err(StateError::query)?
                    .execute(rusqlite::params![
                        photo.title,
                        photo.description,
                        photo.url,
                        photo.taken,
                        last_seen_at,
                        photo.id
                    ])
                    .map_err(StateError::query)?;
                    stats.updated += 1;
                } else {
                    conn.prepare_cached(
                        "INSERT INTO photos (id, title, description, url, created, taken, last_seen_at) VALUES (?1, ?2, ?3, ?4, ?5, ?5, ?6)",
                    )
                    .map_err(StateError::query)?
                    .execute(rusqlite::params![
                        photo.id,
                        photo.title,
                        photo.description,
                        photo.url,
                        photo.taken,
                        last_seen_at
                    ])
                    .map_err(StateError::query)?;
                    stats.inserted += 1;
                }

                if let Some(album) = album {
                    let linked = conn
                        .prepare_cached(
                            "INSERT OR IGNORE INTO album_photos (album, photo) VALUES (?1, ?2)",
                        )
                        .map_err(StateError::query)?
                        .execute([album, photo.id.as_str()])
                        .map_err(StateError::query)?;
                    stats.linked += linked;
                }
            }
            Ok(stats)
        })
    }

    async fn mark_saved_batch(&self, saved: &[SavedPhoto]) -> Result<(), StateError> {
        if saved.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;

        in_transaction(&conn, |conn| {
            let mut stmt = conn
                .prepare_cached("UPDATE photos SET saved = 1, saved_path = ?1 WHERE id = ?2")
                .map_err(StateError::query)?;
            for item in saved {
                stmt.execute(rusqlite::params![item.path.to_string_lossy(), item.id])
                    .map_err(StateError::query)?;
            }
            Ok(())
        })
    }

    async fn mark_deleted_batch(&self, ids: &[String]) -> Result<(), StateError> {
        if ids.is_empty() {
            return Ok(());
        }
        let conn = self.lock()?;

        in_transaction(&conn, |conn| {
            let mut stmt = conn
                .prepare_cached("UPDATE photos SET deleted = 1 WHERE id = ?1")
                .map_err(StateError::query)?;
            for id in ids {
                stmt.execute([id]).map_err(StateError::query)?;
            }
            Ok(())
        })
    }

    #[cfg(test)]
    async fn get_photo(&self, id: &str) -> Result<Option<PhotoRow>, StateError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT id, title, description, url, created, taken, deleted, saved, saved_path FROM photos WHERE id = ?1",
            [id],
            row_to_photo,
        )
        .optional()
        .map_err(StateError::query)
    }

    #[cfg(test)]
    async fn album_photo_count(&self, album: &str) -> Result<u64, StateError> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM album_photos WHERE album = ?1",
                [album],
                |row| row.get(0),
            )
            .map_err(StateError::query)?;
        Ok(count as u64)
    }

    async fn get_summary(&self) -> Result<StoreSummary, StateError> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<u64, StateError> {
            conn.query_row(sql, [], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
                .map_err(StateError::query)
        };

        Ok(StoreSummary {
            photos: count("SELECT COUNT(*) FROM photos")?,
            albums: count("SELECT COUNT(*) FROM albums")?,
            saved: count("SELECT COUNT(*) FROM photos WHERE saved = 1")?,
            deleted: count("SELECT COUNT(*) FROM photos WHERE deleted = 1")?,
        })
    }
}

/// Convert a database row to a PhotoRow.
#[cfg(test)]
fn row_to_photo(row: &rusqlite::Row<'_>) -> rusqlite::Result<PhotoRow> {
    Ok(PhotoRow {
        id: row.get(0)?,
        title: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        url: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        created: row.get(4)?,
        taken: row.get(5)?,
        deleted: row.get::<_, i64>(6)? != 0,
        saved: row.get::<_, i64>(7)? != 0,
        saved_path: row.get::<_, Option<String>>(8)?.map(PathBuf::from),
    })
}
