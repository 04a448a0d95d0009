use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::http::Requester;
use crate::store::FeatureCache;

/// Refreshes the cache from the features endpoint on a fixed interval.
#[derive(Debug)]
pub(crate) struct PollingSynchronizer {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollingSynchronizer {
    /// Perform one refresh, then keep refreshing every `interval` in the background.
    ///
    /// A failed first refresh is logged and leaves the cache not ready; the loop keeps trying.
    pub(crate) async fn start(requester: Requester, cache: FeatureCache, interval: Duration) -> Self {
        refresh(&requester, &cache).await;

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            run_poll_loop(requester, cache, interval, token).await;
        });

        Self {
            cancel,
            task: Some(task),
        }
    }

    /// Stop polling. Returns once the background task has exited.
    pub(crate) async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Polling task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollingSynchronizer {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_poll_loop(
    requester: Requester,
    cache: FeatureCache,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = refresh(&requester, &cache) => {}
        }
    }
    debug!("Polling stopped");
}

/// Fetch the feature list once and apply it. Returns whether the cache was updated.
pub(crate) async fn refresh(requester: &Requester, cache: &FeatureCache) -> bool {
    match requester.fetch_features().await {
        Ok(Some(features)) => {
            let count = cache.replace_all(features);
            let first = !cache.is_ready();
            cache.mark_ready();
            if first {
                info!("Molasses features loaded ({} features)", count);
            } else {
                debug!("Refreshed {} features", count);
            }
            true
        }
        Ok(None) => {
            debug!("Features response carried no features");
            false
        }
        Err(e) => {
            warn!("Molasses - failed to refresh features: {}", e);
            false
        }
    }
}
