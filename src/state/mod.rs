//! Local SQLite record of every photo and album seen.
//!
//! Rows are keyed by remote ID and written with insert-if-absent /
//! update-if-present semantics, so re-running after an interrupted run is
//! always safe. Photos are never removed: a remote delete only sets a flag.

pub mod db;
pub mod error;
pub mod schema;
pub mod types;

pub use db::{PhotoDb, SqlitePhotoDb};
pub use error::StateError;
pub use types::{AlbumRecord, PhotoRecord, SavedPhoto, StoreSummary, UpsertStats};
