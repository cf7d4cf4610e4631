//! Media resolution: turns an item's attachments into local files for one publish path.
//!
//! Every download for an item lands in a fresh temporary directory under the configured
//! media dir. The directory is owned by [`ResolvedMedia`] and removed when it is
//! dropped or [`ResolvedMedia::cleanup`] is called, so files never outlive the item
//! regardless of how publishing went.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::contract::{MediaKind, SourceFeed, SourceItem};
use crate::error::DownloadError;

/// Local media for one item plus the directory that holds it.
#[derive(Debug)]
pub struct ResolvedMedia {
    kind: MediaKind,
    workspace: Option<TempDir>,
}

impl ResolvedMedia {
    pub fn none() -> Self {
        Self {
            kind: MediaKind::None,
            workspace: None,
        }
    }

    pub fn kind(&self) -> &MediaKind {
        &self.kind
    }

    /// Every file this item downloaded.
    pub fn files(&self) -> Vec<&Path> {
        match &self.kind {
            MediaKind::None => Vec::new(),
            MediaKind::Photos(paths) => paths.iter().map(PathBuf::as_path).collect(),
            MediaKind::Video(path) => vec![path.as_path()],
        }
    }

    /// Deletes the item's temporary directory now, logging instead of failing.
    pub fn cleanup(self) {
        if let Some(dir) = self.workspace {
            let path = dir.path().to_path_buf();
            match dir.close() {
                Ok(()) => debug!(path = %path.display(), "Removed temporary media"),
                Err(e) => warn!(error = %e, path = %path.display(), "Failed to remove temporary media"),
            }
        }
    }
}

fn workspace_in(media_dir: &Path) -> Result<TempDir, DownloadError> {
    tempfile::Builder::new()
        .prefix("relay-media-")
        .tempdir_in(media_dir)
        .map_err(|source| DownloadError::Io {
            path: media_dir.to_path_buf(),
            source,
        })
}

/// Parameters of sibling discovery for grouped items.
#[derive(Debug, Clone, Copy)]
pub struct GroupWindow {
    pub radius: i64,
}

impl GroupWindow {
    /// Exclusive id bounds around `id`.
    pub fn bounds(&self, id: i64) -> (i64, i64) {
        (id - self.radius, id + self.radius)
    }
}

/// Album members of `item` found in the feed window around it, oldest first.
///
/// The window is a heuristic: siblings further than `window.radius` ids away are missed.
/// A failed window fetch degrades to the item alone.
pub async fn group_siblings<F>(
    feed: &F,
    channel: &str,
    item: &SourceItem,
    group_id: i64,
    window: GroupWindow,
) -> Vec<SourceItem>
where
    F: SourceFeed + ?Sized,
{
    let (min_id, max_id) = window.bounds(item.id);
    let mut siblings: Vec<SourceItem> = match feed.iterate_window(channel, min_id, max_id).await {
        Ok(items) => items
            .into_iter()
            .filter(|candidate| candidate.group_id == Some(group_id))
            .collect(),
        Err(e) => {
            warn!(item_id = item.id, group_id, error = %e, "Sibling discovery failed, using item alone");
            Vec::new()
        }
    };
    if !siblings.iter().any(|s| s.id == item.id) {
        siblings.push(item.clone());
    }
    // Discovery is newest-first; publishing wants the album in posting order.
    siblings.sort_by_key(|s| s.id);
    debug!(item_id = item.id, group_id, siblings = siblings.len(), "Resolved media group");
    siblings
}

async fn download_into<F>(
    feed: &F,
    item: &SourceItem,
    dir: &Path,
    extension: &str,
) -> Result<PathBuf, DownloadError>
where
    F: SourceFeed + ?Sized,
{
    let path = dir.join(format!("temp_{}.{}", item.id, extension));
    feed.download_media(item, &path).await?;
    debug!(item_id = item.id, path = %path.display(), "Downloaded media");
    Ok(path)
}

/// Downloads the photos among `items` in order. Individual failures are skipped; the
/// call fails only when photos were expected and none arrived.
async fn download_photos<F>(
    feed: &F,
    items: &[SourceItem],
    media_dir: &Path,
) -> Result<ResolvedMedia, DownloadError>
where
    F: SourceFeed + ?Sized,
{
    let photos: Vec<&SourceItem> = items
        .iter()
        .filter(|s| s.media.as_ref().is_some_and(|m| m.is_photo()))
        .collect();
    if photos.is_empty() {
        return Ok(ResolvedMedia::none());
    }

    let workspace = workspace_in(media_dir)?;
    let mut paths = Vec::with_capacity(photos.len());
    let mut last_error = None;
    for photo in photos {
        match download_into(feed, photo, workspace.path(), "jpg").await {
            Ok(path) => paths.push(path),
            Err(e) => {
                warn!(item_id = photo.id, error = %e, "Photo download failed, skipping it");
                last_error = Some(e);
            }
        }
    }

    if paths.is_empty() {
        let _ = workspace.close();
        return Err(last_error.unwrap_or(DownloadError::NoMedia {
            item_id: items.first().map(|s| s.id).unwrap_or_default(),
        }));
    }
    Ok(ResolvedMedia {
        kind: MediaKind::Photos(paths),
        workspace: Some(workspace),
    })
}

/// Resolves the media shape of an ungrouped item, or of an already gathered album.
///
/// - grouped (`siblings` given): every sibling photo, oldest first
/// - single photo: one file
/// - video-typed document: one file
/// - anything else: no media
pub async fn resolve<F>(
    feed: &F,
    item: &SourceItem,
    siblings: Option<&[SourceItem]>,
    media_dir: &Path,
) -> Result<ResolvedMedia, DownloadError>
where
    F: SourceFeed + ?Sized,
{
    if let Some(siblings) = siblings {
        let media = download_photos(feed, siblings, media_dir).await?;
        info!(item_id = item.id, photos = media.files().len(), "Resolved album media");
        return Ok(media);
    }

    match &item.media {
        Some(media) if media.is_photo() => {
            download_photos(feed, std::slice::from_ref(item), media_dir).await
        }
        Some(media) if media.is_video() => {
            let workspace = workspace_in(media_dir)?;
            match download_into(feed, item, workspace.path(), "mp4").await {
                Ok(path) => Ok(ResolvedMedia {
                    kind: MediaKind::Video(path),
                    workspace: Some(workspace),
                }),
                Err(e) => {
                    let _ = workspace.close();
                    Err(e)
                }
            }
        }
        _ => Ok(ResolvedMedia::none()),
    }
}
