//! Reconciles freshly observed remote metadata with the local store.

use chrono::{DateTime, NaiveDateTime};

use crate::flickr::{Album, Photo, PhotoService};
use crate::retry::RateLimitedCaller;
use crate::state::{AlbumRecord, PhotoDb, PhotoRecord, SavedPhoto, StateError, UpsertStats};

/// Format Flickr uses for `dates.taken`.
const TAKEN_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct Reconciler<'a> {
    service: &'a dyn PhotoService,
    db: &'a dyn PhotoDb,
}

impl<'a> Reconciler<'a> {
    pub fn new(service: &'a dyn PhotoService, db: &'a dyn PhotoDb) -> Self {
        Self { service, db }
    }

    /// Fetch page URL and metadata for each photo, then upsert the batch in
    /// one transaction. Photos whose metadata cannot be fetched are skipped.
    pub async fn upsert_photos(
        &self,
        caller: &mut RateLimitedCaller,
        photos: &[Photo],
        album: Option<&str>,
    ) -> Result<UpsertStats, StateError> {
        let mut records = Vec::with_capacity(photos.len());
        for photo in photos {
            let url = match caller.call("page_url", || self.service.page_url(photo)).await {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!(photo = %photo.id, "Skipping photo, no page URL: {}", e);
                    continue;
                }
            };
            let info = match caller.call("photo_info", || self.service.photo_info(photo)).await {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!(photo = %photo.id, "Skipping photo, no metadata: {}", e);
                    continue;
                }
            };

            let taken = parse_taken(&info.taken);
            if taken.is_none() && !info.taken.is_empty() {
                tracing::debug!(photo = %photo.id, "Unparseable capture time '{}'", info.taken);
            }
            let title = if info.title.is_empty() {
                photo.title.clone()
            } else {
                info.title
            };
            records.push(PhotoRecord {
                id: photo.id.clone(),
                title,
                description: info.description,
                url: normalize_https(&url),
                taken,
            });
        }

        if records.is_empty() {
            return Ok(UpsertStats::default());
        }
        let stats = self.db.upsert_photos(&records, album).await?;
        tracing::debug!(
            inserted = stats.inserted,
            updated = stats.updated,
            linked = stats.linked,
            "Upserted photo batch"
        );
        Ok(stats)
    }

    pub async fn upsert_albums(&self, albums: &[Album]) -> Result<UpsertStats, StateError> {
        let records: Vec<AlbumRecord> = albums
            .iter()
            .map(|a| AlbumRecord {
                id: a.id.clone(),
                title: a.title.clone(),
                description: a.description.clone(),
                created: a.created,
                url: a.url(),
            })
            .collect();
        self.db.upsert_albums(&records).await
    }

    pub async fn mark_saved(&self, saved: &[SavedPhoto]) -> Result<(), StateError> {
        if saved.is_empty() {
            return Ok(());
        }
        self.db.mark_saved_batch(saved).await
    }

    pub async fn mark_deleted(&self, ids: &[String]) -> Result<(), StateError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.db.mark_deleted_batch(ids).await
    }
}

/// Parse a capture time as UTC: Flickr's `YYYY-MM-DD HH:MM:SS`, or RFC 3339.
pub fn parse_taken(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, TAKEN_FORMAT) {
        return Some(naive.and_utc().timestamp());
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp())
}

/// Rewrite `http://` and scheme-relative URLs to `https://`.
pub fn normalize_https(url: &str) -> String {
    if let Some(rest) = url.strip_prefix("http://") {
        format!("https://{rest}")
    } else if let Some(rest) = url.strip_prefix("//") {
        format!("https://{rest}")
    } else {
        url.to_string()
    }
}
