//! Paged collection fetcher.
//!
//! Walks a container's listing one page at a time through the shared
//! [`RateLimitedCaller`], deduplicates by photo ID and writes every page
//! through the [`Reconciler`] before asking for the next one.

use std::collections::HashSet;

use thiserror::Error;

use crate::flickr::{Container, Photo, PhotoService};
use crate::reconcile::Reconciler;
use crate::retry::RateLimitedCaller;

/// Largest page the listing endpoints are asked for.
pub const MAX_PAGE_SIZE: u32 = 250;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} cannot be listed page by page")]
    Capability(String),
}

/// Page size for a given photo cap (0 means unlimited).
pub fn page_size(cap: usize) -> u32 {
    match u32::try_from(cap) {
        Ok(0) => MAX_PAGE_SIZE,
        Ok(cap) => cap.min(MAX_PAGE_SIZE),
        Err(_) => MAX_PAGE_SIZE,
    }
}

pub struct PagedFetcher<'a> {
    service: &'a dyn PhotoService,
    reconciler: &'a Reconciler<'a>,
}

impl<'a> PagedFetcher<'a> {
    pub fn new(service: &'a dyn PhotoService, reconciler: &'a Reconciler<'a>) -> Self {
        Self {
            service,
            reconciler,
        }
    }

    /// Fetch every photo of `container`, up to `cap` (0 = no limit).
    ///
    /// A page that fails after retries ends pagination; the photos already
    /// fetched are returned and stay persisted.
    pub async fn fetch_all(
        &self,
        caller: &mut RateLimitedCaller,
        container: &Container,
        cap: usize,
    ) -> Result<Vec<Photo>, FetchError> {
        let source = container
            .as_paged()
            .ok_or_else(|| FetchError::Capability(container.to_string()))?;
        let listing = source.listing();
        let album = source.album_id();
        let per_page = page_size(cap);

        tracing::info!("Fetching {}", source.describe());

        let mut seen: HashSet<String> = HashSet::new();
        let mut photos: Vec<Photo> = Vec::new();
        let mut page: u32 = 1;

        loop {
            let batch = match caller
                .call("list_items", || {
                    self.service.list_items(&listing, page, per_page)
                })
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(page, "Stopping pagination: {}", e);
                    break;
                }
            };
            let returned = batch.len();

            let mut fresh: Vec<Photo> = batch
                .into_iter()
                .filter(|p| seen.insert(p.id.clone()))
                .collect();
            if cap > 0 {
                fresh.truncate(cap.saturating_sub(photos.len()));
            }
            if fresh.is_empty() && returned > 0 {
                tracing::debug!(page, "Page repeats photos already seen, stopping");
                break;
            }

            if let Err(e) = self.reconciler.upsert_photos(caller, &fresh, album).await {
                tracing::warn!(page, "Failed to record page: {}", e);
            }
            photos.extend(fresh);
            tracing::info!(page, total = photos.len(), "Fetched page");

            if returned < per_page as usize || (cap > 0 && photos.len() >= cap) {
                break;
            }
            page += 1;
        }

        Ok(photos)
    }
}
