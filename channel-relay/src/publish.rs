#![doc = "Graph API client implementing the core `Publisher` trait for a page feed."]
//
//! # Page publishing
//!
//! Every publish call first exchanges the long-lived user token for a page token via
//! `me/accounts`. When that fails the call fails closed with [`PublishError::Token`]
//! and nothing is posted.
//!
//! - text: one `POST {page}/feed`
//! - photos: each file uploaded unpublished to `{page}/photos`, then one `{page}/feed`
//!   entry with all successful uploads as `attached_media`
//! - video: one multipart `POST {page}/videos`

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use channel_relay_core::contract::{PublishReceipt, Publisher};
use channel_relay_core::error::PublishError;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;

use crate::load_config::Endpoints;

pub struct GraphPublisher {
    client: reqwest::Client,
    base_url: String,
    page_id: String,
    user_token: String,
}

#[derive(Debug, Deserialize)]
struct Accounts {
    #[serde(default)]
    data: Vec<PageAccount>,
}

#[derive(Debug, Deserialize)]
struct PageAccount {
    id: Option<String>,
    access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Created {
    id: String,
}

impl GraphPublisher {
    pub fn new(endpoints: &Endpoints, page_id: &str, user_token: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!(
                "{}/{}",
                endpoints.graph_base.trim_end_matches('/'),
                endpoints.graph_version
            ),
            page_id: page_id.to_string(),
            user_token: user_token.to_string(),
        }
    }

    fn page_url(&self, edge: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.page_id, edge)
    }

    /// Page access token for the configured page, or the first page listed.
    async fn page_token(&self) -> Result<String, PublishError> {
        let url = format!("{}/me/accounts", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("access_token", self.user_token.as_str())])
            .send()
            .await
            .map_err(|e| PublishError::Token(e.to_string()))?;
        if !response.status().is_success() {
            return Err(PublishError::Token(format!(
                "me/accounts returned {}",
                response.status()
            )));
        }
        let accounts: Accounts = response
            .json()
            .await
            .map_err(|e| PublishError::Token(e.to_string()))?;

        let matching = accounts
            .data
            .iter()
            .find(|a| a.id.as_deref() == Some(self.page_id.as_str()));
        matching
            .or_else(|| accounts.data.first())
            .and_then(|a| a.access_token.clone())
            .ok_or_else(|| PublishError::Token("no page access token in me/accounts".to_string()))
    }

    async fn created(response: reqwest::Response) -> Result<Created, PublishError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PublishError::Network(Box::new(e)))?;
        if !status.is_success() {
            tracing::error!(status = %status, "Graph API rejected request. Response body: {body}");
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| PublishError::Malformed(e.to_string()))
    }

    async fn file_part(path: &Path) -> Result<Part, PublishError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| PublishError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Part::bytes(bytes).file_name(name))
    }

    async fn upload_unpublished_photo(
        &self,
        path: &Path,
        token: &str,
    ) -> Result<String, PublishError> {
        let form = Form::new()
            .text("published", "false")
            .text("access_token", token.to_string())
            .part("source", Self::file_part(path).await?);
        let response = self
            .client
            .post(self.page_url("photos"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Network(Box::new(e)))?;
        Ok(Self::created(response).await?.id)
    }
}

#[async_trait]
impl Publisher for GraphPublisher {
    async fn post_text(&self, caption: &str) -> Result<PublishReceipt, PublishError> {
        let token = self.page_token().await?;
        let response = self
            .client
            .post(self.page_url("feed"))
            .form(&[("message", caption), ("access_token", token.as_str())])
            .send()
            .await
            .map_err(|e| PublishError::Network(Box::new(e)))?;
        let created = Self::created(response).await?;
        tracing::info!(post_id = %created.id, "Text-only post published");
        Ok(PublishReceipt {
            post_id: created.id,
            attached_media: 0,
        })
    }

    async fn post_photos(
        &self,
        paths: &[PathBuf],
        caption: &str,
    ) -> Result<PublishReceipt, PublishError> {
        let token = self.page_token().await?;

        let mut media_ids = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.exists() {
                tracing::warn!(path = %path.display(), "Photo file missing, skipping");
                continue;
            }
            match self.upload_unpublished_photo(path, &token).await {
                Ok(id) => media_ids.push(id),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Photo upload failed, skipping")
                }
            }
        }
        if media_ids.is_empty() {
            return Err(PublishError::NoMediaUploaded {
                attempted: paths.len(),
            });
        }

        let attached: Vec<serde_json::Value> = media_ids
            .iter()
            .map(|id| json!({ "media_fbid": id }))
            .collect();
        let attached = serde_json::Value::Array(attached).to_string();
        let response = self
            .client
            .post(self.page_url("feed"))
            .form(&[
                ("message", caption),
                ("attached_media", attached.as_str()),
                ("access_token", token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PublishError::Network(Box::new(e)))?;
        let created = Self::created(response).await?;
        tracing::info!(post_id = %created.id, photos = media_ids.len(), "Photo post published");
        Ok(PublishReceipt {
            post_id: created.id,
            attached_media: media_ids.len(),
        })
    }

    async fn post_video(&self, path: &Path, caption: &str) -> Result<PublishReceipt, PublishError> {
        let token = self.page_token().await?;
        let form = Form::new()
            .text("description", caption.to_string())
            .text("access_token", token)
            .part("source", Self::file_part(path).await?);
        let response = self
            .client
            .post(self.page_url("videos"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| PublishError::Network(Box::new(e)))?;
        let created = Self::created(response).await?;
        tracing::info!(post_id = %created.id, "Video post published");
        Ok(PublishReceipt {
            post_id: created.id,
            attached_media: 1,
        })
    }
}
