use serde::Serialize;

use crate::bucket::in_rollout;
use crate::feature::Feature;
use crate::segment::SegmentType;
use crate::user::User;

/// Evaluate a feature for the specified [User].
///
/// The evaluator does not know anything about analytics events; recording any appropriate events
/// is the responsibility of the caller.
pub fn evaluate(feature: &Feature, user: Option<&User>) -> Detail {
    if !feature.active {
        return Detail::new(false, Reason::Off);
    }

    let user = match user {
        Some(user) if user.id().is_some() => user,
        _ => return Detail::new(true, Reason::Unidentified),
    };

    let segments = feature.segment_map();

    if let Some(control) = segments.get(&SegmentType::AlwaysControl) {
        if control.contains(user) {
            return Detail::new(false, Reason::AlwaysControl);
        }
    }

    if let Some(experiment) = segments.get(&SegmentType::AlwaysExperiment) {
        if experiment.contains(user) {
            return Detail::new(true, Reason::AlwaysExperiment);
        }
    }

    if let Some(everyone_else) = segments.get(&SegmentType::EveryoneElse) {
        let id = user.id().unwrap_or_default();
        let percentage = everyone_else.percentage;
        return Detail::new(
            in_rollout(id, percentage),
            Reason::EveryoneElse { percentage },
        );
    }

    Detail::new(false, Reason::NoSegmentMatched)
}

/// Returns whether `feature` is active for `user`.
pub fn is_active(feature: &Feature, user: Option<&User>) -> bool {
    evaluate(feature, user).active
}

/// A Detail is returned from [evaluate], combining the result of a feature evaluation with an
/// explanation of how it was calculated.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detail {
    /// Whether the feature is active for the user.
    pub active: bool,
    /// The main factor that influenced the result.
    pub reason: Reason,
}

impl Detail {
    pub fn new(active: bool, reason: Reason) -> Self {
        Detail { active, reason }
    }

    /// The test group reported to analytics: `experiment` when active, `control` otherwise.
    pub fn test_type(&self) -> &'static str {
        if self.active {
            "experiment"
        } else {
            "control"
        }
    }
}

/// Reason describes why a feature evaluation produced a particular result.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", tag = "kind")]
pub enum Reason {
    /// The feature is globally switched off.
    Off,
    /// No user, or a user without an identifier, was supplied; enabled features are on.
    Unidentified,
    /// The user matched the feature's always-control segment.
    AlwaysControl,
    /// The user matched the feature's always-experiment segment.
    AlwaysExperiment,
    /// The result came from the percentage rollout of the everyone-else segment.
    EveryoneElse {
        /// Rollout percentage of the segment.
        percentage: u32,
    },
    /// The feature is on but has no segment that applies to the user.
    NoSegmentMatched,
}
