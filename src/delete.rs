//! Delete sweep: removes photos from Flickr, one call per photo.

use crate::flickr::{Photo, PhotoService};
use crate::progress::create_progress_bar;
use crate::reconcile::Reconciler;
use crate::retry::RateLimitedCaller;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeleteSummary {
    pub deleted: usize,
    pub failed: usize,
}

/// Delete `photos` remotely and flag the successes as deleted in the store.
///
/// Does nothing unless `confirmed` is set; asking the user is up to the
/// caller.
pub async fn delete_photos(
    service: &dyn PhotoService,
    reconciler: &Reconciler<'_>,
    caller: &mut RateLimitedCaller,
    photos: &[Photo],
    confirmed: bool,
    no_progress_bar: bool,
) -> DeleteSummary {
    let mut summary = DeleteSummary::default();
    if !confirmed {
        tracing::info!("Deletion of {} photos not confirmed, skipping", photos.len());
        return summary;
    }

    let mut deleted: Vec<String> = Vec::new();
    let pb = create_progress_bar(no_progress_bar, photos.len() as u64);
    for photo in photos {
        pb.set_message(photo.id.clone());
        match caller.call("delete", || service.delete(photo)).await {
            Ok(()) => {
                pb.suspend(|| tracing::info!(photo = %photo.id, "Deleted {}", photo));
                deleted.push(photo.id.clone());
                summary.deleted += 1;
            }
            Err(e) => {
                pb.suspend(|| tracing::warn!(photo = %photo.id, "Delete failed: {}", e));
                summary.failed += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Err(e) = reconciler.mark_deleted(&deleted).await {
        tracing::warn!("Failed to record {} deleted photos: {}", deleted.len(), e);
    }

    tracing::info!(
        "Delete sweep: {} deleted, {} failed",
        summary.deleted,
        summary.failed
    );
    summary
}
