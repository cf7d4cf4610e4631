//! Pacing policy between relayed items.
//!
//! The destination platform rate-limits page posts, so the run waits a fixed delay
//! after every item that reached the network. This is a plain blocking delay, not a
//! retry.

use std::time::Duration;

use async_trait::async_trait;

#[async_trait]
pub trait Pacer: Send + Sync {
    async fn pause(&self);
}

#[async_trait]
impl<P: Pacer + ?Sized> Pacer for &P {
    async fn pause(&self) {
        (**self).pause().await
    }
}

/// Sleeps for the same duration every time.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

#[async_trait]
impl Pacer for FixedDelay {
    async fn pause(&self) {
        tracing::debug!(millis = self.0.as_millis() as u64, "Pacing before next item");
        tokio::time::sleep(self.0).await;
    }
}

/// Never waits.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPause;

#[async_trait]
impl Pacer for NoPause {
    async fn pause(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_advances_clock_by_its_duration() {
        let start = tokio::time::Instant::now();
        FixedDelay(Duration::from_secs(2)).pause().await;
        assert!(start.elapsed() >= Duration::from_secs(2));
    }
}
