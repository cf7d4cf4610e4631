//! Source feed over a channel's public web preview (`/s/{channel}`).
//!
//! The preview page lists roughly twenty posts, oldest at the top, and pages backwards
//! with `?before={id}`. Posts are parsed with regexes, which is enough for the small
//! set of widget classes the page uses:
//! - `data-post="{channel}/{id}"` opens each post
//! - `tgme_widget_message_text` holds the text, with links kept as `[label](url)`
//! - `tgme_widget_message_photo_wrap` / `tgme_widget_message_video_player` anchors carry
//!   the media, each linking to its own message id
//! - `tgme_widget_message_grouped_wrap` marks an album; every photo or video in it becomes
//!   its own [`SourceItem`] sharing the post id as group id
//!
//! Only public channels have a preview. A page without a message history is reported
//! as [`FetchError::Unauthorized`].

use std::path::Path;
use std::sync::OnceLock;

use async_trait::async_trait;
use channel_relay_core::contract::{SourceFeed, SourceItem, SourceMedia};
use channel_relay_core::error::{DownloadError, FetchError};
use regex::Regex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::load_config::Endpoints;

const VIDEO_MIME: &str = "video/mp4";

/// Upper bound on preview pages read for one listing.
const MAX_PAGES: usize = 20;

fn re(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static pattern"))
}

fn post_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r#"data-post="[^"/]+/(\d+)""#)
}

fn message_text() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(
        &RE,
        r#"(?s)<div class="tgme_widget_message_text[^"]*"[^>]*>(.*?)</div>"#,
    )
}

fn media_anchor() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(
        &RE,
        r#"<a class="tgme_widget_message_(photo_wrap|video_player)[^"]*"([^>]*)>"#,
    )
}

fn href_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r#"href="[^"]*/(\d+)(?:\?[^"]*)?""#)
}

fn background_image() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r#"background-image:url\('([^']+)'\)"#)
}

fn video_src() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r#"<video[^>]*\ssrc="([^"]+)""#)
}

fn html_link() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r#"(?s)<a[^>]*href="([^"]*)"[^>]*>(.*?)</a>"#)
}

fn line_break() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"<br\s*/?>")
}

fn any_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"<[^>]+>")
}

fn numeric_entity() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    re(&RE, r"&#(x[0-9a-fA-F]+|[0-9]+);")
}

fn decode_entities(text: &str) -> String {
    let decoded = numeric_entity().replace_all(text, |caps: &regex::Captures<'_>| {
        let raw = &caps[1];
        let code = match raw.strip_prefix('x') {
            Some(hex) => u32::from_str_radix(hex, 16).ok(),
            None => raw.parse::<u32>().ok(),
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_default()
    });
    decoded
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Converts the inner HTML of a message text div to plain text with markdown links.
fn html_to_text(html: &str) -> String {
    let text = html_link().replace_all(html, |caps: &regex::Captures<'_>| {
        let label = any_tag().replace_all(&caps[2], "");
        if label.trim().is_empty() || label == &caps[1] {
            caps[1].to_string()
        } else {
            format!("[{}]({})", label, &caps[1])
        }
    });
    let text = line_break().replace_all(&text, "\n");
    let text = any_tag().replace_all(&text, "");
    decode_entities(&text).trim().to_string()
}

/// Media found in one post, in page order.
fn post_media(block: &str, post_id: i64) -> Vec<(i64, SourceMedia)> {
    let anchors: Vec<_> = media_anchor().captures_iter(block).collect();
    let mut media = Vec::with_capacity(anchors.len());
    for (index, caps) in anchors.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let attrs = &caps[2];
        let id = href_id()
            .captures(attrs)
            .and_then(|c| c[1].parse::<i64>().ok())
            .unwrap_or(post_id);

        match &caps[1] {
            "photo_wrap" => match background_image().captures(attrs) {
                Some(url) => media.push((
                    id,
                    SourceMedia::Photo {
                        location: decode_entities(&url[1]),
                    },
                )),
                None => media.push((id, SourceMedia::Other)),
            },
            _ => {
                let segment_end = anchors
                    .get(index + 1)
                    .and_then(|next| next.get(0))
                    .map(|m| m.start())
                    .unwrap_or(block.len());
                let segment = &block[whole.end()..segment_end];
                match video_src().captures(segment) {
                    Some(src) => media.push((
                        id,
                        SourceMedia::Document {
                            mime_type: Some(VIDEO_MIME.to_string()),
                            location: decode_entities(&src[1]),
                        },
                    )),
                    // Too large for the preview: nothing to download.
                    None => media.push((id, SourceMedia::Other)),
                }
            }
        }
    }
    media
}

/// Items of one post block, newest first.
fn parse_post(block: &str, post_id: i64) -> Vec<SourceItem> {
    let text = message_text()
        .captures_iter(block)
        .last()
        .map(|caps| html_to_text(&caps[1]))
        .unwrap_or_default();
    let media = post_media(block, post_id);

    if block.contains("tgme_widget_message_grouped_wrap") && !media.is_empty() {
        let caption_id = if media.iter().any(|(id, _)| *id == post_id) {
            post_id
        } else {
            media[0].0
        };
        let mut items: Vec<SourceItem> = media
            .into_iter()
            .map(|(id, media)| SourceItem {
                id,
                text: if id == caption_id {
                    text.clone()
                } else {
                    String::new()
                },
                media: Some(media),
                group_id: Some(post_id),
            })
            .collect();
        items.sort_by(|a, b| b.id.cmp(&a.id));
        items.dedup_by_key(|item| item.id);
        return items;
    }

    let media = media.into_iter().next().map(|(_, m)| m).or_else(|| {
        block
            .contains("tgme_widget_message_document")
            .then_some(SourceMedia::Other)
    });
    vec![SourceItem {
        id: post_id,
        text,
        media,
        group_id: None,
    }]
}

/// Every item on a preview page, newest first.
pub fn parse_preview(html: &str) -> Vec<SourceItem> {
    let markers: Vec<(usize, i64)> = post_marker()
        .captures_iter(html)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let id = caps[1].parse::<i64>().ok()?;
            Some((start, id))
        })
        .collect();

    let mut items = Vec::new();
    for (index, (start, post_id)) in markers.iter().enumerate() {
        let end = markers
            .get(index + 1)
            .map(|(next, _)| *next)
            .unwrap_or(html.len());
        items.extend(parse_post(&html[*start..end], *post_id));
    }
    items.sort_by(|a, b| b.id.cmp(&a.id));
    items.dedup_by_key(|item| item.id);
    items
}

pub struct TelegramFeed {
    client: reqwest::Client,
    base_url: String,
}

impl TelegramFeed {
    pub fn new(endpoints: &Endpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: endpoints.telegram_base.trim_end_matches('/').to_string(),
        }
    }

    /// One preview page, optionally only posts older than `before`.
    async fn page(&self, channel: &str, before: Option<i64>) -> Result<Vec<SourceItem>, FetchError> {
        let url = format!("{}/s/{}", self.base_url, channel);
        let mut request = self.client.get(&url);
        if let Some(before) = before {
            request = request.query(&[("before", before)]);
        }
        debug!(url = %url, ?before, "Fetching channel preview page");

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::Unreachable(Box::new(e)))?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::Unauthorized {
                channel: channel.to_string(),
            });
        }
        if !status.is_success() {
            return Err(FetchError::Malformed(format!(
                "preview returned status {status}"
            )));
        }
        let html = response
            .text()
            .await
            .map_err(|e| FetchError::Unreachable(Box::new(e)))?;
        if !html.contains("tgme_channel_history") && !html.contains("data-post=") {
            return Err(FetchError::Unauthorized {
                channel: channel.to_string(),
            });
        }
        Ok(parse_preview(&html))
    }
}

#[async_trait]
impl SourceFeed for TelegramFeed {
    async fn iterate_recent(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<SourceItem>, FetchError> {
        let mut items: Vec<SourceItem> = Vec::new();
        let mut before = None;
        for _ in 0..MAX_PAGES {
            if items.len() >= limit {
                break;
            }
            let page = self.page(channel, before).await?;
            let oldest_seen = items.last().map(|i| i.id).unwrap_or(i64::MAX);
            let older: Vec<SourceItem> = page.into_iter().filter(|i| i.id < oldest_seen).collect();
            let Some(oldest) = older.iter().map(|i| i.id).min() else {
                break;
            };
            items.extend(older);
            before = Some(oldest);
        }
        items.truncate(limit);
        info!(channel, items = items.len(), "Read recent channel items");
        Ok(items)
    }

    async fn iterate_window(
        &self,
        channel: &str,
        min_id: i64,
        max_id: i64,
    ) -> Result<Vec<SourceItem>, FetchError> {
        let page = self.page(channel, Some(max_id)).await?;
        Ok(page
            .into_iter()
            .filter(|i| i.id > min_id && i.id < max_id)
            .collect())
    }

    async fn download_media(
        &self,
        item: &SourceItem,
        destination: &Path,
    ) -> Result<(), DownloadError> {
        let location = match &item.media {
            Some(SourceMedia::Photo { location }) | Some(SourceMedia::Document { location, .. }) => {
                location
            }
            _ => return Err(DownloadError::NoMedia { item_id: item.id }),
        };
        let mut response = self
            .client
            .get(location)
            .send()
            .await
            .map_err(|e| DownloadError::Network(Box::new(e)))?;
        if !response.status().is_success() {
            warn!(item_id = item.id, status = %response.status(), "Media download rejected");
            return Err(DownloadError::Status {
                status: response.status().as_u16(),
            });
        }
        let io_err = |source: std::io::Error| DownloadError::Io {
            path: destination.to_path_buf(),
            source,
        };
        let mut file = tokio::fs::File::create(destination).await.map_err(io_err)?;
        let mut written = 0usize;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DownloadError::Network(Box::new(e)))?
        {
            file.write_all(&chunk).await.map_err(io_err)?;
            written += chunk.len();
        }
        file.flush().await.map_err(io_err)?;
        debug!(item_id = item.id, bytes = written, "Media written to disk");
        Ok(())
    }

    async fn release(&self) {
        debug!("Channel preview feed released");
    }
}
