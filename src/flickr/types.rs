/// An authenticated (or looked-up) Flickr account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// NSID, e.g. `12345678@N00`. Used in download filenames.
    pub id: String,
    pub username: String,
}

/// A photo as returned by a listing call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Photo {
    pub id: String,
    pub owner: String,
    pub title: String,
}

impl std::fmt::Display for Photo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.title.is_empty() {
            write!(f, "{}", self.id)
        } else {
            write!(f, "{} ({})", self.id, self.title)
        }
    }
}

/// A photoset ("album" in the Flickr UI).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub owner: String,
    pub title: String,
    pub description: String,
    /// Creation time as a Unix timestamp, when reported.
    pub created: Option<i64>,
}

impl Album {
    pub fn url(&self) -> String {
        format!(
            "https://www.flickr.com/photos/{}/albums/{}",
            self.owner, self.id
        )
    }
}

/// Every photo uploaded by an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photostream {
    pub owner: String,
}

/// A grouping of albums. Has no photos of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: String,
    pub title: String,
}

/// What a paged listing call should enumerate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Listing {
    Album { album_id: String, owner: String },
    Photostream { owner: String },
}

/// Containers whose photos can be listed page by page.
pub trait PagedListable: Send + Sync {
    fn listing(&self) -> Listing;

    /// Album ID used for `album_photos` rows, if this container is an album.
    fn album_id(&self) -> Option<&str>;

    fn describe(&self) -> String;
}

impl PagedListable for Album {
    fn listing(&self) -> Listing {
        Listing::Album {
            album_id: self.id.clone(),
            owner: self.owner.clone(),
        }
    }

    fn album_id(&self) -> Option<&str> {
        Some(&self.id)
    }

    fn describe(&self) -> String {
        format!("album '{}'", self.title)
    }
}

impl PagedListable for Photostream {
    fn listing(&self) -> Listing {
        Listing::Photostream {
            owner: self.owner.clone(),
        }
    }

    fn album_id(&self) -> Option<&str> {
        None
    }

    fn describe(&self) -> String {
        format!("photostream of {}", self.owner)
    }
}

/// Any remote grouping of photos the CLI can point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Album(Album),
    Photostream(Photostream),
    Collection(Collection),
}

impl Container {
    /// Capability check: `None` when the container cannot be listed page by page.
    pub fn as_paged(&self) -> Option<&dyn PagedListable> {
        match self {
            Container::Album(a) => Some(a),
            Container::Photostream(p) => Some(p),
            Container::Collection(_) => None,
        }
    }
}

impl std::fmt::Display for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Container::Album(a) => write!(f, "album '{}'", a.title),
            Container::Photostream(p) => write!(f, "photostream of {}", p.owner),
            Container::Collection(c) => write!(f, "collection '{}'", c.title),
        }
    }
}

/// Extended metadata from `flickr.photos.getInfo`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoInfo {
    pub title: String,
    pub description: String,
    /// Capture time exactly as reported, e.g. `2013-08-24 15:33:29`.
    pub taken: String,
    pub page_url: Option<String>,
}

/// Reference to an album a photo belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlbumRef {
    pub id: String,
    pub title: String,
}

/// All contexts a photo appears in. Only `albums` drives classification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PhotoContexts {
    pub albums: Vec<AlbumRef>,
    pub groups: Vec<AlbumRef>,
}

/// One downloadable rendition of a photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeVariant {
    pub label: String,
    /// `None` when the service reported something that is not a number.
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub source: String,
}

impl SizeVariant {
    /// Pixel count, or `None` when either dimension is unknown.
    pub fn area(&self) -> Option<u64> {
        Some(u64::from(self.width?) * u64::from(self.height?))
    }

    /// File extension taken from the source URL, defaulting to `jpg`.
    pub fn extension(&self) -> String {
        let path = self
            .source
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let last = path.rsplit('/').next().unwrap_or_default();
        match last.rsplit_once('.') {
            Some((stem, ext))
                if !stem.is_empty()
                    && !ext.is_empty()
                    && ext.len() <= 5
                    && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
            {
                ext.to_ascii_lowercase()
            }
            _ => "jpg".to_string(),
        }
    }
}

/// Pick the variant with the most pixels, ignoring unparseable dimensions.
/// Ties keep the first variant seen.
pub fn largest_variant(variants: &[SizeVariant]) -> Option<&SizeVariant> {
    let mut best: Option<(&SizeVariant, u64)> = None;
    for v in variants {
        let Some(area) = v.area() else { continue };
        if best.is_none_or(|(_, a)| area > a) {
            best = Some((v, area));
        }
    }
    best.map(|(v, _)| v)
}
