use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Non-secret parameters of one relay run. Constructed once at startup and passed by
/// reference into [`crate::relay::Relay::run`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Handle of the source channel.
    pub channel: String,
    /// Maximum number of most-recent items examined per run.
    pub batch_limit: usize,
    /// Album siblings are searched within this many ids either side of the item.
    /// Large albums or sparse id spacing can still fall outside the window.
    pub group_window: i64,
    /// Pause after each item that reached the publish step.
    pub pace_millis: u64,
    /// Location of the audit log.
    pub audit_path: PathBuf,
    /// Per-item temporary media directories are created in here.
    pub media_dir: PathBuf,
    /// Language the captions are rewritten into.
    pub target_language: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel: "AItoolboxdaily".to_string(),
            batch_limit: 20,
            group_window: 15,
            pace_millis: 2000,
            audit_path: PathBuf::from("results.json"),
            media_dir: PathBuf::from("."),
            target_language: "Malay".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_millis)
    }

    pub fn trace_loaded(&self) {
        info!(
            channel = %self.channel,
            batch_limit = self.batch_limit,
            group_window = self.group_window,
            audit_path = %self.audit_path.display(),
            "Loaded RelayConfig"
        );
        debug!(?self, "RelayConfig loaded (full debug)");
    }
}
