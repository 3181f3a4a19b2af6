//! Database schema definitions and migrations.

use rusqlite::Connection;

use super::error::StateError;

/// Current schema version. Increment when making schema changes.
pub const SCHEMA_VERSION: i32 = 1;

const SCHEMA_V1: &str = r#"
CREATE TABLE IF NOT EXISTS photos (
    id TEXT PRIMARY KEY,
    title TEXT,
    description TEXT,
    url TEXT,
    created INTEGER,
    taken INTEGER,
    deleted INTEGER NOT NULL DEFAULT 0,
    saved INTEGER NOT NULL DEFAULT 0,
    saved_path TEXT,
    last_seen_at INTEGER
);

CREATE TABLE IF NOT EXISTS albums (
    id TEXT PRIMARY KEY,
    title TEXT,
    description TEXT,
    created INTEGER,
    url TEXT
);

CREATE TABLE IF NOT EXISTS album_photos (
    album TEXT NOT NULL,
    photo TEXT NOT NULL,
    PRIMARY KEY (album, photo)
);

CREATE INDEX IF NOT EXISTS idx_album_photos_photo ON album_photos(photo);
CREATE INDEX IF NOT EXISTS idx_photos_deleted ON photos(deleted);
"#;

/// Get the current schema version from the database.
pub(crate) fn get_schema_version(conn: &Connection) -> Result<i32, StateError> {
    let version: i32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}

/// Initialize or migrate the database schema.
///
/// This function is idempotent and safe to call on both new and existing databases.
pub(crate) fn migrate(conn: &Connection) -> Result<(), StateError> {
    let current_version = get_schema_version(conn)?;

    if current_version > SCHEMA_VERSION {
        return Err(StateError::UnsupportedSchemaVersion {
            found: current_version,
            expected: SCHEMA_VERSION,
        });
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        migrate_to_version(conn, version)?;
    }

    Ok(())
}

/// Apply migration for a specific version.
fn migrate_to_version(conn: &Connection, version: i32) -> Result<(), StateError> {
    let ddl = match version {
        1 => SCHEMA_V1,
        other => {
            return Err(StateError::UnsupportedSchemaVersion {
                found: other,
                expected: SCHEMA_VERSION,
            })
        }
    };
    conn.execute_batch(ddl)?;
    set_schema_version(conn, version)?;
    tracing::debug!("Migrated database to schema version {}", version);
    Ok(())
}
