//! Sorts photos into orphans, lookup errors and everything else.

use crate::flickr::{Photo, PhotoContexts, PhotoService};
use crate::retry::RateLimitedCaller;

/// Album that the mobile uploaders drop every photo into. Membership in it
/// alone does not count as being organized.
pub const DEFAULT_SENTINEL_ALBUM: &str = "Auto Upload";

const PROGRESS_EVERY: usize = 25;

/// Disjoint partition of the fetched photos.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClassificationBuckets {
    /// In no album, or only in the sentinel album.
    pub orphans: Vec<Photo>,
    /// Album membership could not be determined.
    pub errors: Vec<Photo>,
    pub rest: Vec<Photo>,
}

impl ClassificationBuckets {
    pub fn total(&self) -> usize {
        self.orphans.len() + self.errors.len() + self.rest.len()
    }
}

/// `true` when the contexts leave the photo unorganized.
pub fn is_orphan(contexts: &PhotoContexts, sentinel: &str) -> bool {
    match contexts.albums.as_slice() {
        [] => true,
        [only] => only.title == sentinel,
        _ => false,
    }
}

pub struct Classifier<'a> {
    service: &'a dyn PhotoService,
    sentinel: &'a str,
}

impl<'a> Classifier<'a> {
    pub fn new(service: &'a dyn PhotoService, sentinel: &'a str) -> Self {
        Self { service, sentinel }
    }

    pub async fn classify(
        &self,
        caller: &mut RateLimitedCaller,
        photos: &[Photo],
    ) -> ClassificationBuckets {
        let mut buckets = ClassificationBuckets::default();
        let total = photos.len();

        for photo in photos {
            match caller
                .call("album_contexts", || self.service.album_contexts(photo))
                .await
            {
                Ok(contexts) => {
                    tracing::debug!(
                        photo = %photo.id,
                        albums = contexts.albums.len(),
                        groups = contexts.groups.len(),
                        "Looked up contexts"
                    );
                    if is_orphan(&contexts, self.sentinel) {
                        buckets.orphans.push(photo.clone());
                    } else {
                        buckets.rest.push(photo.clone());
                    }
                }
                Err(e) => {
                    tracing::warn!(photo = %photo.id, "Could not look up albums: {}", e);
                    buckets.errors.push(photo.clone());
                }
            }

            let done = buckets.total();
            if done % PROGRESS_EVERY == 0 || done == total {
                tracing::info!(
                    "Classified {}/{}: {} orphans, {} errors",
                    done,
                    total,
                    buckets.orphans.len(),
                    buckets.errors.len()
                );
            }
        }

        buckets
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flickr::types::AlbumRef;
    use crate::flickr::RemoteError;
    use crate::testing::{album_ref, fast_caller, photo, photos, FakeService};

    fn contexts(albums: Vec<AlbumRef>) -> PhotoContexts {
        PhotoContexts {
            albums,
            groups: Vec::new(),
        }
    }

    #[test]
    fn test_orphan_rules() {
        let sentinel = DEFAULT_SENTINEL_ALBUM;
        assert!(is_orphan(&contexts(vec![]), sentinel));
        assert!(is_orphan(
            &contexts(vec![album_ref("s", "Auto Upload")]),
            sentinel
        ));
        assert!(!is_orphan(&contexts(vec![album_ref("t", "Trips")]), sentinel));
        assert!(!is_orphan(
            &contexts(vec![
                album_ref("s", "Auto Upload"),
                album_ref("t", "Trips")
            ]),
            sentinel
        ));
        assert!(!is_orphan(
            &contexts(vec![album_ref("s", "auto upload")]),
            sentinel
        ));
    }

    #[tokio::test]
    async fn test_classify_sentinel_scenario() {
        // X only in the sentinel, Y in the sentinel and one more, Z in none.
        let service = FakeService::new()
            .with_contexts("X", vec![album_ref("s", "Auto Upload")])
            .with_contexts(
                "Y",
                vec![album_ref("s", "Auto Upload"), album_ref("t", "Trips")],
            );
        let classifier = Classifier::new(&service, DEFAULT_SENTINEL_ALBUM);
        let mut caller = fast_caller();
        let input = vec![photo("X"), photo("Y"), photo("Z")];

        let buckets = classifier.classify(&mut caller, &input).await;

        let ids = |v: &[Photo]| v.iter().map(|p| p.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&buckets.orphans), vec!["X", "Z"]);
        assert_eq!(ids(&buckets.rest), vec!["Y"]);
        assert!(buckets.errors.is_empty());
    }

    #[tokio::test]
    async fn test_classify_lookup_failure_goes_to_errors() {
        let service = FakeService::new()
            .failing("album_contexts", "p1", RemoteError::Timeout, 10)
            .with_contexts("p2", vec![album_ref("t", "Trips")]);
        let classifier = Classifier::new(&service, DEFAULT_SENTINEL_ALBUM);
        let mut caller = fast_caller();

        let buckets = classifier.classify(&mut caller, &photos(3)).await;

        assert_eq!(buckets.errors, vec![photo("p1")]);
        assert_eq!(buckets.orphans, vec![photo("p0")]);
        assert_eq!(buckets.rest, vec![photo("p2")]);
    }

    #[tokio::test]
    async fn test_partition_is_complete_and_disjoint() {
        let mut service = FakeService::new();
        for i in (0..60).step_by(3) {
            service = service.with_contexts(&format!("p{i}"), vec![album_ref("t", "Trips")]);
        }
        let service = service.failing("album_contexts", "p7", RemoteError::Io("reset".into()), 10);
        let classifier = Classifier::new(&service, "Custom Sentinel");
        let mut caller = fast_caller();
        let input = photos(60);

        let buckets = classifier.classify(&mut caller, &input).await;

        assert_eq!(buckets.total(), 60);
        let mut all: Vec<&str> = buckets
            .orphans
            .iter()
            .chain(&buckets.errors)
            .chain(&buckets.rest)
            .map(|p| p.id.as_str())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 60);
        assert_eq!(buckets.rest.len(), 20);
        assert_eq!(buckets.errors.len(), 1);
        assert_eq!(service.calls("album_contexts"), 60 + 9);
    }
}
