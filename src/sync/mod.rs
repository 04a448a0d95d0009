//! Background tasks that keep the [FeatureCache] in step with the Molasses API.

mod backoff;
mod polling;
mod streaming;

pub use backoff::BackoffConfig;
pub use streaming::StreamState;

use log::info;
use tokio::sync::watch;

use crate::config::{Config, SyncMode};
use crate::http::Requester;
use crate::store::FeatureCache;

use polling::PollingSynchronizer;
use streaming::StreamingSynchronizer;

/// The running synchronizer for one client.
#[derive(Debug)]
pub(crate) enum Synchronizer {
    Polling(PollingSynchronizer),
    Streaming(StreamingSynchronizer),
}

impl Synchronizer {
    /// Start the mode selected by `config`.
    ///
    /// Polling completes its first refresh before returning; streaming returns immediately and
    /// fills the cache once the first batch arrives.
    pub(crate) async fn start(config: &Config, requester: Requester, cache: FeatureCache) -> Self {
        match config.mode() {
            SyncMode::Polling => {
                info!(
                    "Polling Molasses every {:?} at {}",
                    config.poll_interval(),
                    config.base_url()
                );
                Synchronizer::Polling(
                    PollingSynchronizer::start(requester, cache, config.poll_interval()).await,
                )
            }
            SyncMode::Streaming => {
                info!("Streaming from Molasses at {}", config.base_url());
                Synchronizer::Streaming(StreamingSynchronizer::start(
                    requester,
                    cache,
                    config.backoff().clone(),
                ))
            }
        }
    }

    /// Connection state updates. `None` in polling mode.
    pub(crate) fn stream_state(&self) -> Option<watch::Receiver<StreamState>> {
        match self {
            Synchronizer::Polling(_) => None,
            Synchronizer::Streaming(streaming) => Some(streaming.state()),
        }
    }

    /// Stop the background task and wait for it to finish.
    pub(crate) async fn stop(self) {
        match self {
            Synchronizer::Polling(polling) => polling.stop().await,
            Synchronizer::Streaming(streaming) => streaming.stop().await,
        }
    }
}
