//! # contract: collaborator interfaces and shared data model
//!
//! The relay depends on three external capabilities, each expressed as a trait:
//! - [`SourceFeed`]: reads recent items from a channel and downloads their media.
//! - [`TextTransformer`]: black-box text-in/text-out rewrite service.
//! - [`Publisher`]: posts a caption with zero or more media files to the destination page.
//!
//! All traits are async and annotated for `mockall`, so tests (and downstream crates
//! with the `test-export-mocks` feature) get `MockSourceFeed`, `MockTextTransformer`
//! and `MockPublisher`.
//!
//! Errors are returned as values from [`crate::error`]; implementors must not panic
//! or print on failure.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};

use crate::error::{DownloadError, FetchError, PublishError, TransformError};

/// Media attached to a source item, as reported by the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMedia {
    /// A photo. `location` is an opaque handle the feed uses to download it.
    Photo { location: String },
    /// A file attachment with an optional mime type.
    Document {
        mime_type: Option<String>,
        location: String,
    },
    /// Anything else (polls, stickers, web previews). Never downloaded.
    Other,
}

impl SourceMedia {
    pub fn is_photo(&self) -> bool {
        matches!(self, SourceMedia::Photo { .. })
    }

    /// A document counts as a video when its mime type mentions `video`.
    pub fn is_video(&self) -> bool {
        match self {
            SourceMedia::Document {
                mime_type: Some(mime),
                ..
            } => mime.contains("video"),
            _ => false,
        }
    }
}

/// One message from the source channel. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceItem {
    /// Monotonic within the feed.
    pub id: i64,
    pub text: String,
    pub media: Option<SourceMedia>,
    /// Shared by every item of one multi-media post.
    pub group_id: Option<i64>,
}

impl SourceItem {
    pub fn text_only(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            media: None,
            group_id: None,
        }
    }
}

/// Media resolved to local files for exactly one publish path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    None,
    /// One or more photos, oldest first.
    Photos(Vec<PathBuf>),
    Video(PathBuf),
}

/// A caption that came back from the transformer. There is no failure value of this
/// type: a failed transform is an `Err(TransformError)` and can never be published
/// or recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformedCaption(String);

impl TransformedCaption {
    pub fn new(reply: &str) -> Result<Self, TransformError> {
        let trimmed = reply.trim();
        if trimmed.is_empty() {
            return Err(TransformError::EmptyCaption);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

/// What the platform returned for an accepted post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub post_id: String,
    /// Number of media files attached to the post.
    pub attached_media: usize,
}

/// One row of the audit log. Field names are the persisted layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub telegram_id: i64,
    pub original_text: String,
    pub translated_caption: String,
    pub fb_status: String,
    /// Local time, `YYYY-MM-DD HH:MM:SS`.
    pub date_posted: String,
}

/// Status written for every successfully published item.
pub const STATUS_POSTED: &str = "Posted";

/// Format of [`AuditRecord::date_posted`].
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl AuditRecord {
    /// Builds the record for a confirmed publish, stamped with the current local time.
    pub fn posted(item_id: i64, original_text: &str, caption: &TransformedCaption) -> Self {
        Self {
            telegram_id: item_id,
            original_text: original_text.to_string(),
            translated_caption: caption.as_str().to_string(),
            fb_status: STATUS_POSTED.to_string(),
            date_posted: chrono::Local::now().format(DATE_FORMAT).to_string(),
        }
    }
}

/// Read access to the source channel.
///
/// Items are returned as bounded, fully materialised lists; both listing calls are
/// newest-first, the same order the channel is read in.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceFeed: Send + Sync {
    /// The `limit` most recent items of `channel`, newest first.
    async fn iterate_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<SourceItem>, FetchError>;

    /// Items with `min_id < id < max_id`, newest first. Used for album sibling discovery.
    async fn iterate_window(
        &self,
        channel: &str,
        min_id: i64,
        max_id: i64,
    ) -> Result<Vec<SourceItem>, FetchError>;

    /// Download the item's media to `destination`.
    async fn download_media(
        &self,
        item: &SourceItem,
        destination: &Path,
    ) -> Result<(), DownloadError>;

    /// Release the feed connection at the end of the run.
    async fn release(&self);
}

/// Rewrites a prompt into a caption.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait TextTransformer: Send + Sync {
    async fn transform(&self, prompt: &str) -> Result<String, TransformError>;
}

/// Publishes to the destination page. Each call acquires its own page token and fails
/// closed when none can be obtained.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn post_text(&self, caption: &str) -> Result<PublishReceipt, PublishError>;

    /// Upload every readable photo unpublished, then attach all successful uploads to one
    /// feed entry. Fails only if no photo could be uploaded.
    async fn post_photos(
        &self,
        paths: &[PathBuf],
        caption: &str,
    ) -> Result<PublishReceipt, PublishError>;

    async fn post_video(&self, path: &Path, caption: &str)
        -> Result<PublishReceipt, PublishError>;
}
