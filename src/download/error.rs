use thiserror::Error;

use crate::retry::CallFailure;

/// Per-photo save failures. None of them abort the sweep.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no size variant with known dimensions for photo {0}")]
    NoVariant(String),

    #[error("remote call failed for photo {photo}: {source}")]
    Remote {
        photo: String,
        #[source]
        source: CallFailure,
    },

    #[error("disk error at {path}: {source}")]
    Disk {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl SaveError {
    pub(crate) fn disk(path: &std::path::Path, source: std::io::Error) -> Self {
        SaveError::Disk {
            path: path.display().to_string(),
            source,
        }
    }
}
