#![cfg(test)]

use std::collections::HashMap;

use crate::feature::{Feature, FeaturesEnvelope};

pub const TARGETING_RESPONSE: &str = r#"{
    "data": {
        "features": [
            {
                "active": true,
                "description": "foo",
                "key": "FOO_TEST",
                "segments": [
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "alwaysControl",
                        "userConstraints": [
                            {"userParam": "isScaredUser", "operator": "in", "values": "true,maybe"}
                        ]
                    },
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "alwaysExperiment",
                        "userConstraints": [
                            {"userParam": "isBetaUser", "operator": "equals", "values": "true"}
                        ]
                    },
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "everyoneElse",
                        "userConstraints": []
                    }
                ]
            },
            {
                "id": "1",
                "active": true,
                "description": "foo",
                "key": "FOO_NEGATED_TEST",
                "segments": [
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "alwaysControl",
                        "userConstraints": [
                            {"userParam": "isScaredUser", "operator": "nin", "values": "false,maybe"}
                        ]
                    },
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "alwaysExperiment",
                        "userConstraints": [
                            {"userParam": "isBetaUser", "operator": "doesNotEqual", "values": "false"}
                        ]
                    },
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "everyoneElse",
                        "userConstraints": []
                    }
                ]
            },
            {
                "id": "1",
                "active": true,
                "description": "foo",
                "key": "FOO_QUANTIFIER_TEST",
                "segments": [
                    {
                        "percentage": 100,
                        "segmentType": "alwaysControl",
                        "constraint": "all",
                        "userConstraints": [
                            {"userParam": "isScaredUser", "operator": "contains", "values": "scared"},
                            {"userParam": "isDefinitelyScaredUser", "operator": "contains", "values": "scared"},
                            {"userParam": "isMostDefinitelyScaredUser", "operator": "contains", "values": "scared"}
                        ]
                    },
                    {
                        "percentage": 100,
                        "segmentType": "alwaysExperiment",
                        "constraint": "any",
                        "userConstraints": [
                            {"userParam": "isBetaUser", "operator": "doesNotContain", "values": "fal"},
                            {"userParam": "isDefinitelyBetaUser", "operator": "doesNotContain", "values": "fal"}
                        ]
                    },
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "everyoneElse",
                        "userConstraints": []
                    }
                ]
            }
        ]
    }
}"#;

pub const PERCENTAGE_RESPONSE: &str = r#"{
    "data": {
        "features": [
            {"id": "1", "active": true, "description": "foo", "key": "FOO_TEST", "segments": []},
            {"id": "2", "active": false, "description": "foo", "key": "FOO_FALSE_TEST", "segments": []},
            {
                "id": "3",
                "active": true,
                "description": "foo",
                "key": "FOO_50_PERCENT_TEST",
                "segments": [
                    {"constraint": "all", "segmentType": "everyoneElse", "percentage": 50, "userConstraints": []}
                ]
            },
            {
                "id": "4",
                "active": true,
                "description": "foo",
                "key": "FOO_0_PERCENT_TEST",
                "segments": [
                    {"constraint": "all", "segmentType": "everyoneElse", "percentage": 0, "userConstraints": []}
                ]
            },
            {
                "id": "5",
                "active": true,
                "description": "foo",
                "key": "FOO_ID_TEST",
                "segments": [
                    {
                        "constraint": "all",
                        "percentage": 100,
                        "segmentType": "alwaysControl",
                        "userConstraints": [
                            {"userParam": "id", "operator": "equals", "values": "123"}
                        ]
                    },
                    {"constraint": "all", "segmentType": "everyoneElse", "percentage": 100, "userConstraints": []}
                ]
            }
        ]
    }
}"#;

/// Parse a `{ data: { features } }` payload, panicking on malformed fixtures.
pub fn features_from(json: &str) -> Vec<Feature> {
    serde_json::from_str::<FeaturesEnvelope>(json)
        .unwrap()
        .into_features()
        .unwrap()
}

/// The fixture features indexed by key.
pub struct TestStore {
    features: HashMap<String, Feature>,
}

impl TestStore {
    pub fn new() -> Self {
        let features = features_from(TARGETING_RESPONSE)
            .into_iter()
            .chain(features_from(PERCENTAGE_RESPONSE))
            .filter(|f| f.id != "1" || f.key != "FOO_TEST")
            .map(|f| (f.key.clone(), f))
            .collect();
        Self { features }
    }

    pub fn feature(&self, key: &str) -> Feature {
        self.features
            .get(key)
            .cloned()
            .unwrap_or_else(|| panic!("no fixture feature {}", key))
    }
}
