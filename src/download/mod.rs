//! Save sweep: downloads the largest rendition of each photo into a flat
//! output directory as `{account}.{photo}.{ext}`.
//!
//! The sweep is at-most-once per photo: anything already on disk under the
//! photo's prefix is skipped without a single remote call, so re-running a
//! save is cheap. Failures are logged per photo and never stop the sweep.

pub mod error;
pub mod file;
pub mod paths;

use std::path::{Path, PathBuf};

use crate::flickr::{largest_variant, Account, Photo, PhotoService};
use crate::progress::create_progress_bar;
use crate::reconcile::Reconciler;
use crate::retry::RateLimitedCaller;
use crate::state::SavedPhoto;

pub use error::SaveError;
use paths::{file_prefix, local_save_path, ExistingFiles};

/// Subset of application config consumed by the save sweep.
#[derive(Debug, Clone)]
pub struct SaveConfig {
    pub directory: PathBuf,
    pub no_progress_bar: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SaveSummary {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Save every photo in `photos` and record the successes in the store.
///
/// Only a failure to create or read the output directory is returned as an
/// error; per-photo failures are counted in the summary.
pub async fn save_photos(
    service: &dyn PhotoService,
    reconciler: &Reconciler<'_>,
    caller: &mut RateLimitedCaller,
    photos: &[Photo],
    account: &Account,
    config: &SaveConfig,
) -> Result<SaveSummary, SaveError> {
    let directory = config.directory.as_path();
    tokio::fs::create_dir_all(directory)
        .await
        .map_err(|e| SaveError::disk(directory, e))?;
    let mut existing = ExistingFiles::scan(directory)
        .await
        .map_err(|e| SaveError::disk(directory, e))?;

    let mut summary = SaveSummary::default();
    let mut saved: Vec<SavedPhoto> = Vec::new();
    let pb = create_progress_bar(config.no_progress_bar, photos.len() as u64);

    for photo in photos {
        pb.set_message(photo.id.clone());
        let prefix = file_prefix(&account.id, &photo.id);
        if let Some(name) = existing.find(&prefix) {
            pb.suspend(|| tracing::debug!(photo = %photo.id, "Already saved as {}", name));
            // A file left by an interrupted sweep may not be flagged yet.
            saved.push(SavedPhoto {
                id: photo.id.clone(),
                path: directory.join(name),
            });
            summary.skipped += 1;
            pb.inc(1);
            continue;
        }

        match save_one(service, caller, photo, account, directory).await {
            Ok(path) => {
                pb.suspend(|| tracing::info!(photo = %photo.id, "Saved {}", path.display()));
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    existing.insert(name.to_string());
                }
                saved.push(SavedPhoto {
                    id: photo.id.clone(),
                    path,
                });
                summary.saved += 1;
            }
            Err(e) => {
                pb.suspend(|| tracing::warn!(photo = %photo.id, "Save failed: {}", e));
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Err(e) = reconciler.mark_saved(&saved).await {
        tracing::warn!("Failed to record {} saved photos: {}", saved.len(), e);
    }

    tracing::info!(
        "Save sweep: {} saved, {} already present, {} failed",
        summary.saved,
        summary.skipped,
        summary.failed
    );
    Ok(summary)
}

async fn save_one(
    service: &dyn PhotoService,
    caller: &mut RateLimitedCaller,
    photo: &Photo,
    account: &Account,
    directory: &Path,
) -> Result<PathBuf, SaveError> {
    let remote = |source| SaveError::Remote {
        photo: photo.id.clone(),
        source,
    };

    let variants = caller
        .call("size_variants", || service.size_variants(photo))
        .await
        .map_err(remote)?;
    let variant =
        largest_variant(&variants).ok_or_else(|| SaveError::NoVariant(photo.id.clone()))?;
    tracing::debug!(photo = %photo.id, "Using {} rendition", variant.label);

    let bytes = caller
        .call("fetch_binary", || service.fetch_binary(photo, variant))
        .await
        .map_err(remote)?;

    let path = local_save_path(directory, &account.id, &photo.id, &variant.extension());
    file::write_atomically(&path, &bytes).await?;
    Ok(path)
}
