//! JSON payloads of the Flickr REST API (`format=json&nojsoncallback=1`).
//!
//! Flickr is loose about number encoding: the same field can arrive as
//! `"250"`, `250` or `""`. Those fields are kept as [`Value`] and read with
//! the lenient helpers below.

use serde::Deserialize;
use serde_json::Value;

use super::error::RemoteError;

/// The `{"_content": "..."}` wrapper used for most text fields.
#[derive(Debug, Default, Deserialize)]
pub struct Content {
    #[serde(rename = "_content", default)]
    pub content: String,
}

/// Check the `stat` envelope and decode the payload.
pub fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, RemoteError> {
    match body.get("stat").and_then(Value::as_str) {
        Some("ok") | None => Ok(serde_json::from_value(body)?),
        Some(_) => {
            let message = body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            let code = body.get("code").and_then(lenient_i64).unwrap_or(0);
            Err(RemoteError::Api(format!("{message} (code {code})")))
        }
    }
}

pub fn lenient_i64(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn lenient_u32(v: &Value) -> Option<u32> {
    lenient_i64(v).and_then(|n| u32::try_from(n).ok())
}

#[derive(Debug, Deserialize)]
pub struct FindByUsernameResponse {
    pub user: UserEntry,
}

#[derive(Debug, Deserialize)]
pub struct UserEntry {
    pub nsid: String,
    #[serde(default)]
    pub username: Content,
}

#[derive(Debug, Deserialize)]
pub struct PhotosetListResponse {
    pub photosets: PhotosetList,
}

#[derive(Debug, Deserialize)]
pub struct PhotosetList {
    #[serde(default)]
    pub pages: Value,
    #[serde(default)]
    pub photoset: Vec<PhotosetEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PhotosetEntry {
    pub id: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub title: Content,
    #[serde(default)]
    pub description: Content,
    #[serde(default)]
    pub date_create: Value,
}

#[derive(Debug, Deserialize)]
pub struct CollectionTreeResponse {
    pub collections: CollectionTree,
}

#[derive(Debug, Deserialize)]
pub struct CollectionTree {
    #[serde(default)]
    pub collection: Vec<CollectionEntry>,
}

#[derive(Debug, Deserialize)]
pub struct CollectionEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PhotosetPhotosResponse {
    pub photoset: PhotosetPhotos,
}

#[derive(Debug, Deserialize)]
pub struct PhotosetPhotos {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub photo: Vec<PhotoEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PeoplePhotosResponse {
    pub photos: PhotoPage,
}

#[derive(Debug, Deserialize)]
pub struct PhotoPage {
    #[serde(default)]
    pub photo: Vec<PhotoEntry>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoEntry {
    pub id: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct PhotoInfoResponse {
    pub photo: PhotoInfoEntry,
}

#[derive(Debug, Deserialize)]
pub struct PhotoInfoEntry {
    #[serde(default)]
    pub title: Content,
    #[serde(default)]
    pub description: Content,
    #[serde(default)]
    pub dates: Dates,
    #[serde(default)]
    pub urls: Urls,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dates {
    #[serde(default)]
    pub taken: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct Urls {
    #[serde(default)]
    pub url: Vec<UrlEntry>,
}

#[derive(Debug, Deserialize)]
pub struct UrlEntry {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "_content", default)]
    pub content: String,
}

/// `flickr.photos.getAllContexts` puts the lists at the top level and omits
/// them entirely when empty.
#[derive(Debug, Deserialize)]
pub struct ContextsResponse {
    #[serde(default)]
    pub set: Vec<ContextEntry>,
    #[serde(default)]
    pub pool: Vec<ContextEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ContextEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SizesResponse {
    pub sizes: SizeList,
}

#[derive(Debug, Deserialize)]
pub struct SizeList {
    #[serde(default)]
    pub size: Vec<SizeEntry>,
}

#[derive(Debug, Deserialize)]
pub struct SizeEntry {
    pub label: String,
    #[serde(default)]
    pub width: Value,
    #[serde(default)]
    pub height: Value,
    pub source: String,
}
