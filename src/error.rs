use std::io;

use thiserror::Error;
use warp::http::StatusCode;

use crate::fs::EntryInfo;

/// Outcome of a failed open or listing, as seen by the transport layer.
#[derive(Debug, Error)]
pub enum ShareError {
    /// A path segment is hidden. Policy, not a filesystem fact.
    #[error("hidden path segment in {path:?}")]
    Forbidden { path: String },

    #[error("not found: {0}")]
    NotFound(#[source] io::Error),

    #[error("permission denied: {0}")]
    PermissionDenied(#[source] io::Error),

    #[error("i/o failure: {0}")]
    Io(#[source] io::Error),
}

impl From<io::Error> for ShareError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            // A file used as a directory, as in `/a.txt/x`.
            io::ErrorKind::NotFound | io::ErrorKind::NotADirectory => ShareError::NotFound(err),
            io::ErrorKind::PermissionDenied => ShareError::PermissionDenied(err),
            _ => ShareError::Io(err),
        }
    }
}

impl ShareError {
    pub fn status(&self) -> StatusCode {
        match self {
            ShareError::Forbidden { .. } | ShareError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ShareError::NotFound(_) => StatusCode::NOT_FOUND,
            ShareError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Plain-text body sent along with [`ShareError::status`].
    pub fn message(&self) -> &'static str {
        match self.status() {
            StatusCode::FORBIDDEN => "403 Forbidden",
            StatusCode::NOT_FOUND => "404 page not found",
            _ => "500 Internal Server Error",
        }
    }
}

/// A directory read that failed partway.
///
/// `entries` holds whatever was read before the failure; callers must not
/// treat it as a complete listing.
#[derive(Debug, Error)]
#[error("reading directory failed after {} entries: {source}", entries.len())]
pub struct ListError {
    pub entries: Vec<EntryInfo>,
    #[source]
    pub source: ShareError,
}

impl ListError {
    pub fn new(entries: Vec<EntryInfo>, source: impl Into<ShareError>) -> Self {
        Self {
            entries,
            source: source.into(),
        }
    }
}
