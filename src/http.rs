use std::time::Duration;

use log::debug;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use reqwest::{Client as HttpClient, Response};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::AnalyticsEvent;
use crate::feature::{Feature, FeaturesEnvelope};

const FEATURES_PATH: &str = "features";
const EVENT_STREAM_PATH: &str = "event-stream";
const ANALYTICS_PATH: &str = "analytics";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("molasses-rust/", env!("CARGO_PKG_VERSION"));

/// Authenticated access to the three Molasses endpoints. Clones share one connection pool.
#[derive(Clone, Debug)]
pub(crate) struct Requester {
    http: HttpClient,
    api_key: String,
    features_url: String,
    stream_url: String,
    analytics_url: String,
}

impl Requester {
    pub(crate) fn new(config: &Config) -> Result<Self> {
        let http = HttpClient::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_key: config.api_key().to_string(),
            features_url: config.endpoint(FEATURES_PATH),
            stream_url: config.endpoint(EVENT_STREAM_PATH),
            analytics_url: config.endpoint(ANALYTICS_PATH),
        })
    }

    /// Fetch the full feature list.
    ///
    /// Returns `Ok(None)` when the response parses but carries no `data.features`.
    pub(crate) async fn fetch_features(&self) -> Result<Option<Vec<Feature>>> {
        let response = self
            .http
            .get(&self.features_url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        let envelope: FeaturesEnvelope = serde_json::from_str(&body)?;
        Ok(envelope.into_features())
    }

    /// Open the server-sent event stream. The caller decodes the body.
    pub(crate) async fn open_stream(&self) -> Result<Response> {
        debug!("Opening event stream at {}", self.stream_url);
        let response = self
            .http
            .get(&self.stream_url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await?;
        ensure_success(response).await
    }

    pub(crate) async fn post_event(&self, event: &AnalyticsEvent) -> Result<()> {
        let response = self
            .http
            .post(&self.analytics_url)
            .bearer_auth(&self.api_key)
            .json(event)
            .send()
            .await?;
        ensure_success(response).await.map(|_| ())
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(Error::Status {
        status: status.as_u16(),
        body: response.text().await.unwrap_or_default(),
    })
}
