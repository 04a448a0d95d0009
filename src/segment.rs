use serde::{Deserialize, Deserializer};

use crate::constraint::UserConstraint;
use crate::user::{deserialize_null_default, User};

/// The role a [Segment] plays when a feature is evaluated.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum SegmentType {
    AlwaysControl,
    AlwaysExperiment,
    EveryoneElse,
    #[serde(other)]
    Unknown,
}

/// How many of a segment's constraints must hold for a user to be a member.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Quantifier {
    Any,
    #[default]
    #[serde(other)]
    All,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub segment_type: SegmentType,
    #[serde(
        default,
        rename = "constraint",
        deserialize_with = "deserialize_null_default"
    )]
    pub quantifier: Quantifier,
    #[serde(default, deserialize_with = "deserialize_percentage")]
    pub percentage: u32,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    user_constraints: Vec<UserConstraint>,
}

// Any JSON number is accepted. Fractions round up, since buckets are whole numbers and
// `bucket < 50.5` holds exactly when `bucket < 51`. Negative values and null become zero.
fn deserialize_percentage<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let percentage = Option::<f64>::deserialize(deserializer)?;
    Ok(percentage.map_or(0, |p| p.ceil() as u32))
}

impl Segment {
    pub fn new(
        segment_type: SegmentType,
        quantifier: Quantifier,
        percentage: u32,
        user_constraints: Vec<UserConstraint>,
    ) -> Self {
        Segment {
            segment_type,
            quantifier,
            percentage,
            user_constraints,
        }
    }

    pub fn user_constraints(&self) -> &[UserConstraint] {
        &self.user_constraints
    }

    /// Returns whether `user` is a member of this segment.
    ///
    /// Every constraint is scored, then the satisfied count is compared against the quantifier:
    /// one for `any`, all of them for `all`. An `all` segment without constraints therefore
    /// contains everyone and an `any` segment without constraints contains no one.
    pub fn contains(&self, user: &User) -> bool {
        let required = match self.quantifier {
            Quantifier::Any => 1,
            Quantifier::All => self.user_constraints.len(),
        };

        let satisfied = self
            .user_constraints
            .iter()
            .filter(|constraint| constraint.matches_user(user))
            .count();

        satisfied >= required
    }
}
