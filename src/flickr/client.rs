//! REST client for `api.flickr.com`, implementing [`PhotoService`].

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::error::RemoteError;
use super::oauth::Signer;
use super::responses::{self, lenient_i64, lenient_u32, PhotoEntry};
use super::types::{
    Account, Album, AlbumRef, Collection, Listing, Photo, PhotoContexts, PhotoInfo,
    SizeVariant,
};
use super::PhotoService;

pub const DEFAULT_ENDPOINT: &str = "https://api.flickr.com/services/rest/";

const DEFAULT_USER_AGENT: &str = concat!("flickr-orphans/", env!("CARGO_PKG_VERSION"));

/// `flickr.photosets.getList` accepts up to 500 per page.
const ALBUM_LIST_PAGE_SIZE: u32 = 500;

/// API key plus optional OAuth token credentials. Without the token pair the
/// client can still read public data but cannot delete.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub oauth_token: Option<String>,
    pub oauth_token_secret: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"[REDACTED]")
            .field("oauth_token", &self.oauth_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "oauth_token_secret",
                &self.oauth_token_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Credentials {
    fn signer(&self) -> Option<Signer> {
        match (&self.oauth_token, &self.oauth_token_secret) {
            (Some(token), Some(secret)) => Some(Signer::new(
                &self.api_key,
                &self.api_secret,
                token,
                secret,
            )),
            _ => None,
        }
    }
}

pub struct FlickrClient {
    http: Client,
    endpoint: String,
    api_key: String,
    signer: Option<Signer>,
}

impl FlickrClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, RemoteError> {
        Self::with_endpoint(credentials, timeout, DEFAULT_ENDPOINT)
    }

    pub fn with_endpoint(
        credentials: &Credentials,
        timeout: Duration,
        endpoint: impl Into<String>,
    ) -> Result<Self, RemoteError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(DEFAULT_USER_AGENT));

        let http = Client::builder()
            .default_headers(default_headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            api_key: credentials.api_key.clone(),
            signer: credentials.signer(),
        })
    }

    /// Whether calls are OAuth-signed, which `photos.delete` requires.
    pub fn can_write(&self) -> bool {
        self.signer.is_some()
    }

    async fn call<T: DeserializeOwned>(
        &self,
        http_method: Method,
        api_method: &str,
        args: &[(&str, &str)],
    ) -> Result<T, RemoteError> {
        let mut params: Vec<(String, String)> = vec![
            ("method".into(), api_method.into()),
            ("api_key".into(), self.api_key.clone()),
            ("format".into(), "json".into()),
            ("nojsoncallback".into(), "1".into()),
        ];
        params.extend(args.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        if let Some(signer) = &self.signer {
            signer.sign(http_method.as_str(), &self.endpoint, &mut params);
        }

        let request = if http_method == Method::POST {
            self.http.post(&self.endpoint).form(&params)
        } else {
            self.http.get(&self.endpoint).query(&params)
        };
        tracing::debug!("Flickr call {}", api_method);
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(RemoteError::Api(format!("HTTP {status}: {body}")));
        }
        let value: Value = serde_json::from_str(&body)?;
        responses::decode(value)
    }

    fn to_photo(entry: PhotoEntry, fallback_owner: &str) -> Photo {
        Photo {
            id: entry.id,
            owner: entry
                .owner
                .filter(|o| !o.is_empty())
                .unwrap_or_else(|| fallback_owner.to_string()),
            title: entry.title,
        }
    }
}

#[async_trait::async_trait]
impl PhotoService for FlickrClient {
    async fn authenticate(&self, username: &str) -> Result<Account, RemoteError> {
        let resp: responses::FindByUsernameResponse = self
            .call(
                Method::GET,
                "flickr.people.findByUsername",
                &[("username", username)],
            )
            .await?;
        let name = if resp.user.username.content.is_empty() {
            username.to_string()
        } else {
            resp.user.username.content
        };
        Ok(Account {
            id: resp.user.nsid,
            username: name,
        })
    }

    async fn list_containers(&self, account: &Account) -> Result<Vec<Album>, RemoteError> {
        let per_page = ALBUM_LIST_PAGE_SIZE.to_string();
        let mut albums = Vec::new();
        let mut page: u32 = 1;
        loop {
            let page_str = page.to_string();
            let resp: responses::PhotosetListResponse = self
                .call(
                    Method::GET,
                    "flickr.photosets.getList",
                    &[
                        ("user_id", account.id.as_str()),
                        ("page", page_str.as_str()),
                        ("per_page", per_page.as_str()),
                    ],
                )
                .await?;
            let list = resp.photosets;
            let count = list.photoset.len();
            albums.extend(list.photoset.into_iter().map(|set| Album {
                owner: if set.owner.is_empty() {
                    account.id.clone()
                } else {
                    set.owner
                },
                id: set.id,
                title: set.title.content,
                description: set.description.content,
                created: lenient_i64(&set.date_create),
            }));
            let pages = lenient_u32(&list.pages).unwrap_or(1);
            if count == 0 || page >= pages {
                break;
            }
            page += 1;
        }
        Ok(albums)
    }

    async fn list_collections(&self, account: &Account) -> Result<Vec<Collection>, RemoteError> {
        let resp: responses::CollectionTreeResponse = self
            .call(
                Method::GET,
                "flickr.collections.getTree",
                &[("user_id", account.id.as_str())],
            )
            .await?;
        Ok(resp
            .collections
            .collection
            .into_iter()
            .map(|c| Collection {
                id: c.id,
                title: c.title,
            })
            .collect())
    }

    async fn list_items(
        &self,
        listing: &Listing,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<Photo>, RemoteError> {
        let page = page.to_string();
        let per_page = per_page.to_string();
        match listing {
            Listing::Album { album_id, owner } => {
                let resp: responses::PhotosetPhotosResponse = self
                    .call(
                        Method::GET,
                        "flickr.photosets.getPhotos",
                        &[
                            ("photoset_id", album_id.as_str()),
                            ("user_id", owner.as_str()),
                            ("page", page.as_str()),
                            ("per_page", per_page.as_str()),
                        ],
                    )
                    .await?;
                let set_owner = if resp.photoset.owner.is_empty() {
                    owner.clone()
                } else {
                    resp.photoset.owner
                };
                Ok(resp
                    .photoset
                    .photo
                    .into_iter()
                    .map(|p| Self::to_photo(p, &set_owner))
                    .collect())
            }
            Listing::Photostream { owner } => {
                let resp: responses::PeoplePhotosResponse = self
                    .call(
                        Method::GET,
                        "flickr.people.getPhotos",
                        &[
                            ("user_id", owner.as_str()),
                            ("page", page.as_str()),
                            ("per_page", per_page.as_str()),
                        ],
                    )
                    .await?;
                Ok(resp
                    .photos
                    .photo
                    .into_iter()
                    .map(|p| Self::to_photo(p, owner))
                    .collect())
            }
        }
    }

    async fn photo_info(&self, photo: &Photo) -> Result<PhotoInfo, RemoteError> {
        let resp: responses::PhotoInfoResponse = self
            .call(
                Method::GET,
                "flickr.photos.getInfo",
                &[("photo_id", photo.id.as_str())],
            )
            .await?;
        let info = resp.photo;
        let page_url = info
            .urls
            .url
            .into_iter()
            .find(|u| u.kind == "photopage")
            .map(|u| u.content);
        Ok(PhotoInfo {
            title: info.title.content,
            description: info.description.content,
            taken: info.dates.taken,
            page_url,
        })
    }

    async fn page_url(&self, photo: &Photo) -> Result<String, RemoteError> {
        if !photo.owner.is_empty() {
            return Ok(format!(
                "https://www.flickr.com/photos/{}/{}/",
                photo.owner, photo.id
            ));
        }
        self.photo_info(photo)
            .await?
            .page_url
            .ok_or_else(|| RemoteError::Api(format!("no page URL reported for {}", photo.id)))
    }

    async fn album_contexts(&self, photo: &Photo) -> Result<PhotoContexts, RemoteError> {
        let resp: responses::ContextsResponse = self
            .call(
                Method::GET,
                "flickr.photos.getAllContexts",
                &[("photo_id", photo.id.as_str())],
            )
            .await?;
        let to_ref = |c: responses::ContextEntry| AlbumRef {
            id: c.id,
            title: c.title,
        };
        Ok(PhotoContexts {
            albums: resp.set.into_iter().map(to_ref).collect(),
            groups: resp.pool.into_iter().map(to_ref).collect(),
        })
    }

    async fn size_variants(&self, photo: &Photo) -> Result<Vec<SizeVariant>, RemoteError> {
        let resp: responses::SizesResponse = self
            .call(
                Method::GET,
                "flickr.photos.getSizes",
                &[("photo_id", photo.id.as_str())],
            )
            .await?;
        Ok(resp
            .sizes
            .size
            .into_iter()
            .map(|s| SizeVariant {
                width: lenient_u32(&s.width),
                height: lenient_u32(&s.height),
                label: s.label,
                source: s.source,
            })
            .collect())
    }

    async fn fetch_binary(
        &self,
        photo: &Photo,
        variant: &SizeVariant,
    ) -> Result<Vec<u8>, RemoteError> {
        let response = self.http.get(&variant.source).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Api(format!(
                "HTTP {status} fetching {} of {}",
                variant.label, photo.id
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }

    async fn delete(&self, photo: &Photo) -> Result<(), RemoteError> {
        if !self.can_write() {
            return Err(RemoteError::Api(
                "deleting requires OAuth token credentials".into(),
            ));
        }
        let _: Value = self
            .call(
                Method::POST,
                "flickr.photos.delete",
                &[("photo_id", photo.id.as_str())],
            )
            .await?;
        Ok(())
    }
}
