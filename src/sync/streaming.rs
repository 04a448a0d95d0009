use eventsource_stream::{Event, Eventsource};
use futures::StreamExt;
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};
use crate::feature::FeaturesEnvelope;
use crate::http::Requester;
use crate::store::FeatureCache;
use crate::sync::backoff::{Backoff, BackoffConfig};

/// Connection state of the streaming synchronizer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    /// Opening the event stream.
    Connecting,
    /// The stream is open and events are being applied.
    Streaming,
    /// Waiting before the next connection attempt.
    Backoff,
    /// The synchronizer has been stopped. Terminal.
    Stopped,
}

/// Inputs that move the stream between states.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Transition {
    Connected,
    Failed,
    RetryDue,
    Stop,
}

impl StreamState {
    /// The state after `transition`. Transitions that do not apply leave the state unchanged.
    pub(crate) fn next(self, transition: Transition) -> StreamState {
        use StreamState::*;
        use Transition::*;

        match (self, transition) {
            (Stopped, _) | (_, Stop) => Stopped,
            (Connecting, Connected) => Streaming,
            (Connecting | Streaming, Failed) => Backoff,
            (Backoff, RetryDue) => Connecting,
            (state, _) => state,
        }
    }
}

/// Holds a server-sent event stream open and applies every pushed batch to the cache.
#[derive(Debug)]
pub(crate) struct StreamingSynchronizer {
    cancel: CancellationToken,
    state: watch::Receiver<StreamState>,
    task: Option<JoinHandle<()>>,
}

impl StreamingSynchronizer {
    pub(crate) fn start(requester: Requester, cache: FeatureCache, backoff: BackoffConfig) -> Self {
        let cancel = CancellationToken::new();
        let (state_tx, state) = watch::channel(StreamState::Connecting);
        let worker = StreamWorker {
            requester,
            cache,
            backoff: Backoff::new(backoff),
            state: state_tx,
        };
        let task = tokio::spawn(worker.run(cancel.clone()));

        Self {
            cancel,
            state,
            task: Some(task),
        }
    }

    pub(crate) fn state(&self) -> watch::Receiver<StreamState> {
        self.state.clone()
    }

    /// Stop streaming. Returns once the background task has exited.
    pub(crate) async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Streaming task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for StreamingSynchronizer {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct StreamWorker {
    requester: Requester,
    cache: FeatureCache,
    backoff: Backoff,
    state: watch::Sender<StreamState>,
}

impl StreamWorker {
    async fn run(mut self, cancel: CancellationToken) {
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = self.connect_and_consume() => outcome,
            };
            match outcome {
                Ok(()) => warn!("Molasses event stream closed"),
                Err(e) => error!("Molasses event stream failed: {}", e),
            }
            self.transition(Transition::Failed);

            let delay = self.backoff.next_delay();
            info!(
                "Reconnecting to Molasses in {:.2} seconds (attempt {})",
                delay.as_secs_f64(),
                self.backoff.attempt()
            );
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
            self.transition(Transition::RetryDue);
        }
        self.transition(Transition::Stop);
        debug!("Streaming stopped");
    }

    fn transition(&self, transition: Transition) {
        self.state.send_if_modified(|state| {
            let next = state.next(transition);
            if next == *state {
                return false;
            }
            debug!("Stream state {:?} -> {:?}", state, next);
            *state = next;
            true
        });
    }

    /// Runs until the stream ends (`Ok`) or fails (`Err`).
    async fn connect_and_consume(&mut self) -> Result<()> {
        let response = self.requester.open_stream().await?;
        self.transition(Transition::Connected);
        info!("Connected to Molasses event stream");

        let mut events = response.bytes_stream().eventsource();
        while let Some(event) = events.next().await {
            let event = event.map_err(|e| Error::Stream(e.to_string()))?;
            if apply_event(&event, &self.cache)?.is_some() {
                self.backoff.reset();
            }
        }
        Ok(())
    }
}

/// Apply one stream event to the cache.
///
/// Returns the number of features written, or `None` when the event carried no feature batch.
pub(crate) fn apply_event(event: &Event, cache: &FeatureCache) -> Result<Option<usize>> {
    if event.data.trim().is_empty() {
        return Ok(None);
    }

    let envelope: FeaturesEnvelope = serde_json::from_str(&event.data)?;
    match envelope.into_features() {
        Some(features) => {
            let count = cache.replace_all(features);
            cache.mark_ready();
            debug!("Applied {} features from event stream", count);
            Ok(Some(count))
        }
        None => {
            debug!("Ignoring stream event without features");
            Ok(None)
        }
    }
}
