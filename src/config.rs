use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::sync::BackoffConfig;

/// Base URL of the hosted Molasses SDK API.
pub const DEFAULT_BASE_URL: &str = "https://sdk.molasses.app/v1";

/// How often the polling synchronizer refreshes the snapshot.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);

const API_KEY_ENV: &str = "MOLASSES_API_KEY";
const BASE_URL_ENV: &str = "MOLASSES_BASE_URL";
const POLLING_ENV: &str = "MOLASSES_POLLING";

/// How the client keeps its feature snapshot up to date.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncMode {
    /// Hold a server-sent event stream open and apply every pushed batch.
    #[default]
    Streaming,
    /// Fetch the full feature list on a fixed interval.
    Polling,
}

/// Client configuration. Build one with [Config::builder] or [Config::from_env].
#[derive(Clone)]
pub struct Config {
    api_key: String,
    base_url: String,
    mode: SyncMode,
    poll_interval: Duration,
    backoff: BackoffConfig,
    auto_send_events: bool,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl Config {
    /// Create a new [ConfigBuilder] for the given API key.
    pub fn builder(api_key: impl Into<String>) -> ConfigBuilder {
        ConfigBuilder::new(api_key)
    }

    /// Build a configuration from `MOLASSES_API_KEY`, `MOLASSES_BASE_URL` and
    /// `MOLASSES_POLLING`. Only the API key is required.
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Config> {
        let mut builder = Config::builder(lookup(API_KEY_ENV).unwrap_or_default());
        if let Some(base_url) = lookup(BASE_URL_ENV) {
            builder.base_url(base_url);
        }
        if let Some(polling) = lookup(POLLING_ENV) {
            if matches!(polling.trim(), "1" | "true" | "TRUE" | "True") {
                builder.mode(SyncMode::Polling);
            }
        }
        builder.build()
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn backoff(&self) -> &BackoffConfig {
        &self.backoff
    }

    pub fn auto_send_events(&self) -> bool {
        self.auto_send_events
    }

    pub(crate) fn event_sink(&self) -> Option<Arc<dyn EventSink>> {
        self.event_sink.clone()
    }

    /// Join `path` onto the base URL.
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("mode", &self.mode)
            .field("poll_interval", &self.poll_interval)
            .field("backoff", &self.backoff)
            .field("auto_send_events", &self.auto_send_events)
            .field("event_sink", &self.event_sink.is_some())
            .finish()
    }
}

/// Contains methods for configuring a client.
pub struct ConfigBuilder {
    api_key: String,
    base_url: String,
    mode: SyncMode,
    poll_interval: Duration,
    backoff: BackoffConfig,
    auto_send_events: bool,
    event_sink: Option<Arc<dyn EventSink>>,
}

impl ConfigBuilder {
    /// Create a new config builder with default settings for the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            mode: SyncMode::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            backoff: BackoffConfig::default(),
            auto_send_events: false,
            event_sink: None,
        }
    }

    /// Point the client at a different API host.
    pub fn base_url(&mut self, base_url: impl Into<String>) -> &mut Self {
        self.base_url = base_url.into();
        self
    }

    /// Choose between streaming and polling synchronization.
    pub fn mode(&mut self, mode: SyncMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Shorthand for `mode(SyncMode::Polling)` when `polling` is true.
    pub fn polling(&mut self, polling: bool) -> &mut Self {
        self.mode = if polling {
            SyncMode::Polling
        } else {
            SyncMode::Streaming
        };
        self
    }

    /// Set the refresh interval used in polling mode. Must be greater than zero.
    pub fn poll_interval(&mut self, poll_interval: Duration) -> &mut Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Set the reconnect delays used in streaming mode.
    pub fn backoff(&mut self, backoff: BackoffConfig) -> &mut Self {
        self.backoff = backoff;
        self
    }

    /// Record an `experiment_started` event for every identified `is_active` call.
    pub fn auto_send_events(&mut self, auto_send_events: bool) -> &mut Self {
        self.auto_send_events = auto_send_events;
        self
    }

    /// Send analytics events to `sink` instead of the Molasses analytics endpoint.
    pub fn event_sink(&mut self, sink: Arc<dyn EventSink>) -> &mut Self {
        self.event_sink = Some(sink);
        self
    }

    /// Validate the settings and create a new [Config].
    pub fn build(&self) -> Result<Config> {
        let api_key = self.api_key.trim();
        if api_key.is_empty() {
            return Err(Error::MissingApiKey);
        }

        if self.poll_interval.is_zero() {
            return Err(Error::InvalidPollInterval);
        }

        let base_url = self.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url).map_err(|e| Error::InvalidBaseUrl {
            url: base_url.clone(),
            message: e.to_string(),
        })?;

        Ok(Config {
            api_key: api_key.to_string(),
            base_url,
            mode: self.mode,
            poll_interval: self.poll_interval,
            backoff: self.backoff.clone(),
            auto_send_events: self.auto_send_events,
            event_sink: self.event_sink.clone(),
        })
    }
}
