//! Flickr remote service: the `PhotoService` seam used by the fetch,
//! classify and action layers, plus the REST client that implements it.

pub mod client;
pub mod error;
pub mod oauth;
mod responses;
pub mod types;

pub use client::{Credentials, FlickrClient};
pub use error::RemoteError;
pub use types::{
    largest_variant, Account, Album, Collection, Container, Listing, Photo, PhotoContexts,
    PhotoInfo, Photostream, SizeVariant,
};

/// Remote operations the orphan finder needs. Every call may fail with a
/// [`RemoteError`]; retrying is the job of
/// [`RateLimitedCaller`](crate::retry::RateLimitedCaller), not of the
/// implementation.
#[async_trait::async_trait]
pub trait PhotoService: Send + Sync {
    async fn authenticate(&self, username: &str) -> Result<Account, RemoteError>;

    async fn list_containers(&self, account: &Account) -> Result<Vec<Album>, RemoteError>;

    /// Top-level collections (groupings of albums) of an account.
    async fn list_collections(&self, account: &Account) -> Result<Vec<Collection>, RemoteError>;

    /// One page (1-based) of a container's photos.
    async fn list_items(
        &self,
        listing: &Listing,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Photo>, RemoteError>;

    async fn photo_info(&self, photo: &Photo) -> Result<PhotoInfo, RemoteError>;

    async fn page_url(&self, photo: &Photo) -> Result<String, RemoteError>;

    async fn album_contexts(&self, photo: &Photo) -> Result<PhotoContexts, RemoteError>;

    async fn size_variants(&self, photo: &Photo) -> Result<Vec<SizeVariant>, RemoteError>;

    async fn fetch_binary(
        &self,
        photo: &Photo,
        variant: &SizeVariant,
    ) -> Result<Vec<u8>, RemoteError>;

    async fn delete(&self, photo: &Photo) -> Result<(), RemoteError>;
}
