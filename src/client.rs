use std::sync::Arc;

use log::{debug, info};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::eval::{evaluate, Detail};
use crate::events::{
    merge_tags, AnalyticsEvent, EventSink, HttpEventSink, Tags, EXPERIMENT_STARTED,
    EXPERIMENT_SUCCESS,
};
use crate::feature::Feature;
use crate::http::Requester;
use crate::store::FeatureCache;
use crate::sync::{StreamState, Synchronizer};
use crate::user::User;

/// The Molasses client.
///
/// Evaluation is answered from a local snapshot and never waits on the network. Until the first
/// batch of features has been received every query answers `false`.
pub struct Client {
    config: Config,
    cache: FeatureCache,
    events: Arc<dyn EventSink>,
    stream_state: Option<watch::Receiver<StreamState>>,
    synchronizer: Mutex<Option<Synchronizer>>,
}

impl Client {
    /// Create a client and start synchronizing.
    ///
    /// In polling mode the first refresh has completed when this returns. In streaming mode the
    /// connection is opened in the background. Must be called from within a tokio runtime.
    pub async fn start(config: Config) -> Result<Client> {
        let requester = Requester::new(&config)?;
        let events = match config.event_sink() {
            Some(sink) => sink,
            None => Arc::new(HttpEventSink::new(requester.clone(), Handle::current())),
        };

        let cache = FeatureCache::new();
        let synchronizer = Synchronizer::start(&config, requester, cache.clone()).await;
        let stream_state = synchronizer.stream_state();

        Ok(Client {
            config,
            cache,
            events,
            stream_state,
            synchronizer: Mutex::new(Some(synchronizer)),
        })
    }

    /// Whether the client has received at least one batch of features.
    pub fn is_initialized(&self) -> bool {
        self.cache.is_ready()
    }

    /// Current connection state in streaming mode, `None` in polling mode.
    pub fn stream_state(&self) -> Option<StreamState> {
        self.stream_state.as_ref().map(|state| *state.borrow())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns whether the feature `key` is active for `user`.
    ///
    /// Returns `false` before the client is initialized and for unknown keys. When automatic
    /// events are enabled and the user is identified, an `experiment_started` event is recorded.
    pub fn is_active(&self, key: &str, user: Option<&User>) -> bool {
        let Some((feature, detail)) = self.evaluate_feature(key, user) else {
            return false;
        };

        if self.config.auto_send_events() {
            if let Some((user, id)) = identified(user) {
                self.events.record(AnalyticsEvent::for_feature(
                    EXPERIMENT_STARTED,
                    id,
                    user.params(),
                    &feature,
                    &detail,
                ));
            }
        }
        detail.active
    }

    /// Evaluate `key` for `user`, explaining the result.
    ///
    /// Returns `None` before the client is initialized and for unknown keys. No events are
    /// recorded.
    pub fn evaluate_detail(&self, key: &str, user: Option<&User>) -> Option<Detail> {
        self.evaluate_feature(key, user).map(|(_, detail)| detail)
    }

    /// Record that `user` entered the experiment behind `key`.
    ///
    /// Returns `false`, recording nothing, when the client is not initialized, the user has no
    /// identifier, or the feature is unknown.
    pub fn experiment_started(&self, key: &str, user: Option<&User>, extra: Option<&Tags>) -> bool {
        self.record_experiment(EXPERIMENT_STARTED, key, user, extra)
    }

    /// Record that `user` completed the goal of the experiment behind `key`.
    ///
    /// Same preconditions as [Client::experiment_started].
    pub fn experiment_success(&self, key: &str, user: Option<&User>, extra: Option<&Tags>) -> bool {
        self.record_experiment(EXPERIMENT_SUCCESS, key, user, extra)
    }

    /// Record a custom event for `user`.
    ///
    /// Returns `false`, recording nothing, when the client is not initialized or the user has no
    /// identifier.
    pub fn track(&self, event: &str, user: Option<&User>, extra: Option<&Tags>) -> bool {
        if !self.cache.is_ready() {
            return false;
        }
        let Some((user, id)) = identified(user) else {
            return false;
        };
        let tags = merge_tags(user, extra);
        self.events.record(AnalyticsEvent::new(event, id, &tags));
        true
    }

    /// Stop synchronizing. Returns once the background task has finished, after which the
    /// snapshot is never modified again.
    ///
    /// A second call fails with [Error::AlreadyStopped].
    pub async fn stop(&self) -> Result<()> {
        let synchronizer = self.synchronizer.lock().take().ok_or(Error::AlreadyStopped)?;
        synchronizer.stop().await;
        info!("Molasses client stopped");
        Ok(())
    }

    fn evaluate_feature(&self, key: &str, user: Option<&User>) -> Option<(Arc<Feature>, Detail)> {
        if !self.cache.is_ready() {
            debug!("Client not initialized; {} evaluates to false", key);
            return None;
        }
        let feature = self.cache.get(key)?;
        let detail = evaluate(&feature, user);
        Some((feature, detail))
    }

    fn record_experiment(
        &self,
        event: &str,
        key: &str,
        user: Option<&User>,
        extra: Option<&Tags>,
    ) -> bool {
        if !self.cache.is_ready() {
            return false;
        }
        let Some((user, id)) = identified(user) else {
            return false;
        };
        let Some((feature, detail)) = self.evaluate_feature(key, Some(user)) else {
            return false;
        };

        let tags = merge_tags(user, extra);
        self.events
            .record(AnalyticsEvent::for_feature(event, id, &tags, &feature, &detail));
        true
    }
}

fn identified(user: Option<&User>) -> Option<(&User, &str)> {
    let user = user?;
    user.id().map(|id| (user, id))
}
