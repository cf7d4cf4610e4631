//! Typed errors for every collaborator call in the relay.
//!
//! Only [`RelayError`] aborts a run. The remaining types are per-item and are
//! recovered inside the pipeline by skipping or degrading the item.

use std::path::PathBuf;
use thiserror::Error;

/// The source feed could not be read. Fatal when it happens at run start.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed unreachable: {0}")]
    Unreachable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("feed rejected credentials for channel {channel}")]
    Unauthorized { channel: String },

    #[error("malformed feed response: {0}")]
    Malformed(String),
}

/// The transform service did not produce a usable caption.
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("transform service unreachable: {0}")]
    Unreachable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("transform service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed transform reply: {0}")]
    Malformed(String),

    #[error("transform reply was empty")]
    EmptyCaption,
}

/// A media artifact could not be fetched to local disk.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("media request failed: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("media server returned status {status}")]
    Status { status: u16 },

    #[error("cannot write media to {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("item {item_id} carries no downloadable media")]
    NoMedia { item_id: i64 },
}

/// The destination platform did not accept the post.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("no valid page token obtainable: {0}")]
    Token(String),

    #[error("platform rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("platform request failed: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("malformed platform reply: {0}")]
    Malformed(String),

    #[error("none of the {attempted} photos could be uploaded")]
    NoMediaUploaded { attempted: usize },

    #[error("expected media for item {item_id} could not be produced")]
    MediaMissing { item_id: i64 },

    #[error("cannot read media file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The audit log could not be read or written.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("audit log io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("audit log at {path:?} is malformed: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("fetching source feed failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("writing audit log failed: {0}")]
    Persistence(#[from] PersistenceError),
}
