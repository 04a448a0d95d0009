use std::collections::HashMap;

use log::warn;
use serde::Deserialize;

use crate::segment::{Segment, SegmentType};
use crate::user::deserialize_null_default;

/// A feature flag definition as served by the Molasses API.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    pub key: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub description: Option<String>,

    pub(crate) active: bool,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub(crate) segments: Vec<Segment>,
}

impl Feature {
    pub fn new(
        key: impl Into<String>,
        id: impl Into<String>,
        active: bool,
        segments: Vec<Segment>,
    ) -> Self {
        Feature {
            key: key.into(),
            id: id.into(),
            description: None,
            active,
            segments,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.active
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Index the segments by type. When several segments share a type, the last one wins.
    pub(crate) fn segment_map(&self) -> HashMap<SegmentType, &Segment> {
        self.segments
            .iter()
            .map(|segment| (segment.segment_type, segment))
            .collect()
    }
}

/// The `{ "data": { "features": [...] } }` envelope shared by the features endpoint and the
/// event stream. Missing levels deserialize to `None` rather than failing, and features are
/// decoded one at a time so a malformed record is skipped instead of failing the batch.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct FeaturesEnvelope {
    #[serde(default)]
    data: Option<FeaturesData>,
}

#[derive(Debug, Default, Deserialize)]
struct FeaturesData {
    #[serde(default)]
    features: Option<Vec<serde_json::Value>>,
}

impl FeaturesEnvelope {
    pub(crate) fn into_features(self) -> Option<Vec<Feature>> {
        let records = self.data.and_then(|d| d.features)?;
        let features = records
            .into_iter()
            .filter_map(|record| match serde_json::from_value::<Feature>(record) {
                Ok(feature) => Some(feature),
                Err(e) => {
                    warn!("Skipping malformed feature definition: {}", e);
                    None
                }
            })
            .collect();
        Some(features)
    }
}
