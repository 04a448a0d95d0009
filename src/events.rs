use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};
use serde::Serialize;
use tokio::runtime::Handle;

use crate::eval::Detail;
use crate::feature::Feature;
use crate::http::Requester;
use crate::user::{AttributeValue, User};

/// Extra tags attached to an analytics event.
pub type Tags = HashMap<String, AttributeValue>;

pub(crate) const EXPERIMENT_STARTED: &str = "experiment_started";
pub(crate) const EXPERIMENT_SUCCESS: &str = "experiment_success";

/// An analytics event in the shape the Molasses analytics endpoint accepts.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsEvent {
    /// Event name, e.g. `experiment_started` or a custom tracking name.
    pub event: String,
    /// Tags serialized as a JSON object string.
    pub tags: String,
    /// Identifier of the user the event is about.
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_name: Option<String>,
    /// `experiment` or `control`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,
}

impl AnalyticsEvent {
    /// A plain tracking event.
    pub fn new(event: impl Into<String>, user_id: impl Into<String>, tags: &Tags) -> Self {
        AnalyticsEvent {
            event: event.into(),
            tags: serialize_tags(tags),
            user_id: user_id.into(),
            feature_id: None,
            feature_name: None,
            test_type: None,
        }
    }

    /// An experiment event describing the evaluation of `feature`.
    pub fn for_feature(
        event: impl Into<String>,
        user_id: impl Into<String>,
        tags: &Tags,
        feature: &Feature,
        detail: &Detail,
    ) -> Self {
        AnalyticsEvent {
            feature_id: Some(feature.id.clone()),
            feature_name: Some(feature.key.clone()),
            test_type: Some(detail.test_type().to_string()),
            ..AnalyticsEvent::new(event, user_id, tags)
        }
    }
}

/// Trait used by the client to hand off analytics events.
///
/// Recording is fire-and-forget: implementations must not block the caller and must not report
/// delivery failures back to it.
pub trait EventSink: Send + Sync {
    /// Record an analytics event.
    fn record(&self, event: AnalyticsEvent);
}

/// Merge the user's params with caller-supplied tags; the caller's tags win on conflict.
pub(crate) fn merge_tags(user: &User, extra: Option<&Tags>) -> Tags {
    let mut tags = user.params().clone();
    if let Some(extra) = extra {
        tags.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    tags
}

fn serialize_tags(tags: &Tags) -> String {
    let ordered: BTreeMap<&String, &AttributeValue> = tags.iter().collect();
    serde_json::to_string(&ordered).unwrap_or_else(|e| {
        warn!("Failed to serialize event tags: {}", e);
        "{}".to_string()
    })
}

/// Posts events to the `analytics` endpoint on the given runtime.
pub(crate) struct HttpEventSink {
    requester: Requester,
    runtime: Handle,
}

impl HttpEventSink {
    pub(crate) fn new(requester: Requester, runtime: Handle) -> Self {
        Self { requester, runtime }
    }
}

impl EventSink for HttpEventSink {
    fn record(&self, event: AnalyticsEvent) {
        let requester = self.requester.clone();
        self.runtime.spawn(async move {
            debug!("Sending {} event for user {}", event.event, event.user_id);
            if let Err(e) = requester.post_event(&event).await {
                warn!("Molasses - failed to send {} event: {}", event.event, e);
            }
        });
    }
}
