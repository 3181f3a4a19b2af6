//! Scripted in-process [`PhotoService`] and helpers shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::flickr::{
    Account, Album, Collection, Listing, Photo, PhotoContexts, PhotoInfo, PhotoService, RemoteError,
    SizeVariant,
};
use crate::flickr::types::AlbumRef;
use crate::retry::{CallPolicy, RateLimitedCaller};

/// A caller with the production thresholds but no sleeping.
pub fn fast_caller() -> RateLimitedCaller {
    RateLimitedCaller::new(CallPolicy {
        pace_max: Duration::ZERO,
        failure_backoff: Duration::ZERO,
        ..CallPolicy::default()
    })
}

pub fn account() -> Account {
    Account {
        id: "12@N00".into(),
        username: "alice".into(),
    }
}

pub fn photo(id: &str) -> Photo {
    Photo {
        id: id.into(),
        owner: "12@N00".into(),
        title: format!("title {id}"),
    }
}

pub fn photos(n: usize) -> Vec<Photo> {
    (0..n).map(|i| photo(&format!("p{i}"))).collect()
}

pub fn album(id: &str, title: &str) -> Album {
    Album {
        id: id.into(),
        owner: "12@N00".into(),
        title: title.into(),
        description: String::new(),
        created: Some(1_356_998_400),
    }
}

pub fn album_ref(id: &str, title: &str) -> AlbumRef {
    AlbumRef {
        id: id.into(),
        title: title.into(),
    }
}

/// Fake service driven by a fixed listing plus per-call scripted failures.
///
/// Failures are queued per `(method, key)`, where the key is the photo ID or,
/// for `list_items`, the page number. Each queued error is returned once
/// before the call starts succeeding.
#[derive(Default)]
pub struct FakeService {
    albums: Vec<Album>,
    collections: Vec<Collection>,
    items: Vec<Photo>,
    repeat_last_page: bool,
    infos: HashMap<String, PhotoInfo>,
    contexts: HashMap<String, Vec<AlbumRef>>,
    sizes: HashMap<String, Vec<SizeVariant>>,
    failures: Mutex<HashMap<(&'static str, String), VecDeque<RemoteError>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_albums(mut self, albums: Vec<Album>) -> Self {
        self.albums = albums;
        self
    }

    pub fn with_collections(mut self, collections: Vec<Collection>) -> Self {
        self.collections = collections;
        self
    }

    pub fn with_items(mut self, items: Vec<Photo>) -> Self {
        self.items = items;
        self
    }

    /// Past the end, answer with the last page again instead of an empty one.
    pub fn repeating_last_page(mut self) -> Self {
        self.repeat_last_page = true;
        self
    }

    pub fn with_info(mut self, id: &str, info: PhotoInfo) -> Self {
        self.infos.insert(id.into(), info);
        self
    }

    pub fn with_contexts(mut self, id: &str, albums: Vec<AlbumRef>) -> Self {
        self.contexts.insert(id.into(), albums);
        self
    }

    pub fn with_sizes(mut self, id: &str, sizes: Vec<SizeVariant>) -> Self {
        self.sizes.insert(id.into(), sizes);
        self
    }

    /// Queue `count` copies of `error` for `method` on `key`.
    pub fn failing(self, method: &'static str, key: &str, error: RemoteError, count: usize) -> Self {
        {
            let mut failures = self.failures.lock().unwrap();
            let queue = failures.entry((method, key.to_string())).or_default();
            queue.extend(std::iter::repeat_n(error, count));
        }
        self
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }

    fn record(&self, method: &'static str, key: &str) -> Result<(), RemoteError> {
        *self.calls.lock().unwrap().entry(method).or_default() += 1;
        let mut failures = self.failures.lock().unwrap();
        match failures
            .get_mut(&(method, key.to_string()))
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PhotoService for FakeService {
    async fn authenticate(&self, username: &str) -> Result<Account, RemoteError> {
        self.record("authenticate", username)?;
        Ok(Account {
            username: username.into(),
            ..account()
        })
    }

    async fn list_containers(&self, account: &Account) -> Result<Vec<Album>, RemoteError> {
        self.record("list_containers", &account.id)?;
        Ok(self.albums.clone())
    }

    async fn list_collections(&self, account: &Account) -> Result<Vec<Collection>, RemoteError> {
        self.record("list_collections", &account.id)?;
        Ok(self.collections.clone())
    }

    async fn list_items(
        &self,
        _listing: &Listing,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Photo>, RemoteError> {
        self.record("list_items", &page.to_string())?;
        let per_page = per_page as usize;
        let len = self.items.len();
        let mut start = (page as usize - 1) * per_page;
        if start >= len {
            if !self.repeat_last_page || len == 0 {
                return Ok(Vec::new());
            }
            start = ((len - 1) / per_page) * per_page;
        }
        let end = (start + per_page).min(len);
        Ok(self.items[start..end].to_vec())
    }

    async fn photo_info(&self, photo: &Photo) -> Result<PhotoInfo, RemoteError> {
        self.record("photo_info", &photo.id)?;
        Ok(self.infos.get(&photo.id).cloned().unwrap_or_else(|| PhotoInfo {
            title: photo.title.clone(),
            description: format!("description {}", photo.id),
            taken: "2013-08-24 15:33:29".into(),
            page_url: None,
        }))
    }

    async fn page_url(&self, photo: &Photo) -> Result<String, RemoteError> {
        self.record("page_url", &photo.id)?;
        Ok(format!(
            "http://www.flickr.com/photos/{}/{}/",
            photo.owner, photo.id
        ))
    }

    async fn album_contexts(&self, photo: &Photo) -> Result<PhotoContexts, RemoteError> {
        self.record("album_contexts", &photo.id)?;
        Ok(PhotoContexts {
            albums: self.contexts.get(&photo.id).cloned().unwrap_or_default(),
            groups: Vec::new(),
        })
    }

    async fn size_variants(&self, photo: &Photo) -> Result<Vec<SizeVariant>, RemoteError> {
        self.record("size_variants", &photo.id)?;
        Ok(self.sizes.get(&photo.id).cloned().unwrap_or_else(|| {
            vec![
                SizeVariant {
                    label: "Small".into(),
                    width: Some(240),
                    height: Some(180),
                    source: format!("https://live.example/{}_m.jpg", photo.id),
                },
                SizeVariant {
                    label: "Original".into(),
                    width: Some(4032),
                    height: Some(3024),
                    source: format!("https://live.example/{}_o.jpg", photo.id),
                },
            ]
        }))
    }

    async fn fetch_binary(
        &self,
        photo: &Photo,
        variant: &SizeVariant,
    ) -> Result<Vec<u8>, RemoteError> {
        self.record("fetch_binary", &photo.id)?;
        Ok(format!("{}:{}", photo.id, variant.label).into_bytes())
    }

    async fn delete(&self, photo: &Photo) -> Result<(), RemoteError> {
        self.record("delete", &photo.id)?;
        self.deleted.lock().unwrap().push(photo.id.clone());
        Ok(())
    }
}
