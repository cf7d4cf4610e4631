//! High-level pipeline: one bounded pass over the source channel.
//!
//! Each item moves through
//! `FETCHED → FILTERED → TRANSFORMED → MEDIA_RESOLVED → PUBLISHED → RECORDED`.
//! Filtered items, failed transforms and failed publishes end the item without a record;
//! only a confirmed publish produces an [`AuditRecord`].
//!
//! # Major Types
//! - [`Relay`]: the collaborators and config for a run, plus the per-item state machine
//! - [`RunContext`]: run-scoped state threaded through every item
//! - [`RunReport`]: what happened to the examined items
//!
//! # Ordering
//! Items are handled strictly one after another in feed order. Album handling must see
//! and mark a group before later members of that group are evaluated, so the loop is
//! never parallelised.
//!
//! # Error Handling
//! Only a failed initial fetch or a failed final audit write end the run
//! ([`RelayError`]). Everything else is logged and isolated to its item.

use std::collections::HashSet;

use tracing::{debug, error, info, warn};

use crate::audit::AuditStore;
use crate::config::RelayConfig;
use crate::contract::{
    AuditRecord, MediaKind, Publisher, SourceFeed, SourceItem, TextTransformer,
    TransformedCaption,
};
use crate::error::{PublishError, RelayError, TransformError};
use crate::media::{self, GroupWindow, ResolvedMedia};
use crate::pacing::{FixedDelay, Pacer};
use crate::preprocess::{build_prompt, clean_text, dedup_key, is_meaningful};

/// Why an item was filtered out before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Blank, or fewer than three tokens.
    NotMeaningful,
    /// Same trimmed text already in the audit log.
    AlreadyRelayed,
    /// Another member of its album was already handled this run.
    GroupHandled,
}

/// Terminal state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Skipped(SkipReason),
    TransformFailed,
    PublishFailed,
    Published(AuditRecord),
}

/// State that lives for exactly one run.
#[derive(Debug, Default)]
pub struct RunContext {
    dedup_keys: HashSet<String>,
    handled_groups: HashSet<i64>,
    records: Vec<AuditRecord>,
}

impl RunContext {
    pub fn new(dedup_keys: HashSet<String>) -> Self {
        Self {
            dedup_keys,
            ..Self::default()
        }
    }

    pub fn is_relayed(&self, text: &str) -> bool {
        self.dedup_keys.contains(dedup_key(text))
    }

    pub fn is_group_handled(&self, group_id: i64) -> bool {
        self.handled_groups.contains(&group_id)
    }

    pub fn mark_group_handled(&mut self, group_id: i64) {
        self.handled_groups.insert(group_id);
    }

    /// Keeps a published record. The dedup set stays as it was loaded at run start.
    fn record(&mut self, record: AuditRecord) {
        self.records.push(record);
    }

    /// Records produced so far, in publish order.
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<AuditRecord> {
        self.records
    }
}

/// Outcome counts for a run, plus the records that were added to the audit log.
#[derive(Debug, Default, Clone)]
pub struct RunReport {
    pub examined: usize,
    pub not_meaningful: usize,
    pub already_relayed: usize,
    pub group_handled: usize,
    pub transform_failed: usize,
    pub publish_failed: usize,
    pub published: Vec<AuditRecord>,
}

impl RunReport {
    fn count(&mut self, outcome: &ItemOutcome) {
        self.examined += 1;
        match outcome {
            ItemOutcome::Skipped(SkipReason::NotMeaningful) => self.not_meaningful += 1,
            ItemOutcome::Skipped(SkipReason::AlreadyRelayed) => self.already_relayed += 1,
            ItemOutcome::Skipped(SkipReason::GroupHandled) => self.group_handled += 1,
            ItemOutcome::TransformFailed => self.transform_failed += 1,
            ItemOutcome::PublishFailed => self.publish_failed += 1,
            ItemOutcome::Published(_) => {}
        }
    }
}

/// Applies the filter rules in order; the first match wins.
pub fn filter(ctx: &RunContext, item: &SourceItem) -> Option<SkipReason> {
    if !is_meaningful(&item.text) {
        return Some(SkipReason::NotMeaningful);
    }
    if ctx.is_relayed(&item.text) {
        return Some(SkipReason::AlreadyRelayed);
    }
    if item.group_id.is_some_and(|g| ctx.is_group_handled(g)) {
        return Some(SkipReason::GroupHandled);
    }
    None
}

/// The collaborators and parameters of one run.
pub struct Relay<'a> {
    config: &'a RelayConfig,
    feed: &'a dyn SourceFeed,
    transformer: &'a dyn TextTransformer,
    publisher: &'a dyn Publisher,
    pacer: Box<dyn Pacer + 'a>,
}

impl<'a> Relay<'a> {
    /// Builds a relay that paces with a [`FixedDelay`] of `config.pace()`.
    pub fn new(
        config: &'a RelayConfig,
        feed: &'a dyn SourceFeed,
        transformer: &'a dyn TextTransformer,
        publisher: &'a dyn Publisher,
    ) -> Self {
        Self {
            config,
            feed,
            transformer,
            publisher,
            pacer: Box::new(FixedDelay(config.pace())),
        }
    }

    pub fn with_pacer(mut self, pacer: impl Pacer + 'a) -> Self {
        self.pacer = Box::new(pacer);
        self
    }

    /// Runs one bounded batch: fetch, relay every item, then write the audit log once.
    ///
    /// The log is untouched until every item has been decided. A crash before the final
    /// write loses this run's records but never corrupts the log.
    pub async fn run(&self, store: &AuditStore) -> Result<RunReport, RelayError> {
        info!(channel = %self.config.channel, limit = self.config.batch_limit, "[RELAY] Starting run");

        let mut items = match self
            .feed
            .iterate_recent(&self.config.channel, self.config.batch_limit)
            .await
        {
            Ok(items) => items,
            Err(e) => {
                error!(error = %e, "[RELAY][ERROR] Fetching source feed failed");
                self.feed.release().await;
                return Err(e.into());
            }
        };
        items.truncate(self.config.batch_limit);
        info!(items = items.len(), "[RELAY] Fetched source items");

        let mut ctx = RunContext::new(store.load_dedup_keys());
        let mut report = self.relay_items(&mut ctx, &items).await;

        let written = store.append(ctx.records());
        self.feed.release().await;
        if let Err(e) = written {
            error!(error = %e, "[RELAY][ERROR] Writing audit log failed");
            return Err(e.into());
        }

        report.published = ctx.into_records();
        info!(
            examined = report.examined,
            published = report.published.len(),
            transform_failed = report.transform_failed,
            publish_failed = report.publish_failed,
            "[RELAY] Run complete"
        );
        Ok(report)
    }

    /// Relays `items` in order, accumulating records in `ctx`. Never touches the audit log.
    pub async fn relay_items(&self, ctx: &mut RunContext, items: &[SourceItem]) -> RunReport {
        let mut report = RunReport::default();
        for item in items {
            let outcome = self.process_item(ctx, item).await;
            report.count(&outcome);
            let reached_publish = matches!(
                outcome,
                ItemOutcome::Published(_) | ItemOutcome::PublishFailed
            );
            if let ItemOutcome::Published(record) = outcome {
                ctx.record(record);
            }
            if reached_publish {
                self.pacer.pause().await;
            }
        }
        report
    }

    /// Drives one item through the state machine.
    pub async fn process_item(&self, ctx: &mut RunContext, item: &SourceItem) -> ItemOutcome {
        if let Some(reason) = filter(ctx, item) {
            debug!(item_id = item.id, ?reason, "[RELAY] Skipping item");
            return ItemOutcome::Skipped(reason);
        }
        let original_text = item.text.trim();

        let caption = match self.transform(original_text).await {
            Ok(caption) => caption,
            Err(e) => {
                warn!(item_id = item.id, error = %e, "[RELAY] Transform failed, skipping item");
                return ItemOutcome::TransformFailed;
            }
        };

        let media = match self.resolve_media(ctx, item).await {
            Ok(media) => media,
            Err(e) => {
                warn!(item_id = item.id, error = %e, "[RELAY] Expected media unavailable");
                return ItemOutcome::PublishFailed;
            }
        };

        let published = self.publish(&media, &caption).await;
        media.cleanup();

        match published {
            Ok(receipt) => {
                info!(
                    item_id = item.id,
                    post_id = %receipt.post_id,
                    attached = receipt.attached_media,
                    "[RELAY] Published item"
                );
                ItemOutcome::Published(AuditRecord::posted(item.id, original_text, &caption))
            }
            Err(e) => {
                warn!(item_id = item.id, error = %e, "[RELAY] Publish failed");
                ItemOutcome::PublishFailed
            }
        }
    }

    async fn transform(&self, original_text: &str) -> Result<TransformedCaption, TransformError> {
        let cleaned = clean_text(original_text);
        let prompt = build_prompt(&cleaned, &self.config.target_language);
        let reply = self.transformer.transform(&prompt).await?;
        TransformedCaption::new(&reply)
    }

    async fn resolve_media(
        &self,
        ctx: &mut RunContext,
        item: &SourceItem,
    ) -> Result<ResolvedMedia, crate::error::DownloadError> {
        let media_dir = self.config.media_dir.as_path();
        match item.group_id {
            Some(group_id) => {
                ctx.mark_group_handled(group_id);
                let window = GroupWindow {
                    radius: self.config.group_window,
                };
                let siblings =
                    media::group_siblings(self.feed, &self.config.channel, item, group_id, window)
                        .await;
                media::resolve(self.feed, item, Some(siblings.as_slice()), media_dir).await
            }
            None => media::resolve(self.feed, item, None, media_dir).await,
        }
    }

    /// Runs exactly one publish path, chosen by the media shape.
    async fn publish(
        &self,
        media: &ResolvedMedia,
        caption: &TransformedCaption,
    ) -> Result<crate::contract::PublishReceipt, PublishError> {
        match media.kind() {
            MediaKind::Video(path) => self.publisher.post_video(path, caption.as_str()).await,
            MediaKind::Photos(paths) => self.publisher.post_photos(paths, caption.as_str()).await,
            MediaKind::None => self.publisher.post_text(caption.as_str()).await,
        }
    }
}
