//! Types for the state tracking module.

use std::path::PathBuf;

/// Freshly observed photo metadata, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    /// Page URL, already normalized to `https://`.
    pub url: String,
    /// Capture time as a Unix timestamp. Also becomes `created` on first insert.
    pub taken: Option<i64>,
}

/// A photo row as stored, including the state flags.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    pub created: Option<i64>,
    pub taken: Option<i64>,
    pub deleted: bool,
    pub saved: bool,
    pub saved_path: Option<PathBuf>,
}

/// An album row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub created: Option<i64>,
    pub url: String,
}

/// A photo written to disk during a save sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedPhoto {
    pub id: String,
    pub path: PathBuf,
}

/// What one upsert batch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub updated: usize,
    /// New `(album, photo)` rows.
    pub linked: usize,
}

impl std::ops::AddAssign for UpsertStats {
    fn add_assign(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.updated += other.updated;
        self.linked += other.linked;
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreSummary {
    pub photos: u64,
    pub albums: u64,
    pub saved: u64,
    pub deleted: u64,
}
