use std::cmp::Ordering;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use crate::user::{deserialize_null_default, AttributeValue, User};

lazy_static! {
    static ref VERSION_NUMERIC_COMPONENTS_REGEX: Regex =
        Regex::new(r"^\d+(\.\d+)?(\.\d+)?").unwrap();
}

/// A single attribute comparison inside a [crate::Segment].
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserConstraint {
    user_param: String,
    operator: Operator,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    values: AttributeValue,
    #[serde(default, deserialize_with = "deserialize_null_default")]
    user_param_type: ParamType,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    In,
    Nin,
    Equals,
    DoesNotEqual,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    DoesNotContain,
    #[serde(other)]
    Unknown,
}

/// The declared type both sides of a constraint are coerced to before comparison.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum ParamType {
    Number,
    Boolean,
    Semver,
    #[default]
    #[serde(other)]
    String,
}

/// A constraint operand after coercion to its declared [ParamType].
#[derive(Clone, Debug, PartialEq)]
pub enum ConstraintValue {
    Number(f64),
    Boolean(bool),
    Semver(semver::Version),
    String(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum CoercionError {
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("'{0}' is not a semantic version")]
    NotASemver(String),
}

impl UserConstraint {
    pub fn new(
        user_param: impl Into<String>,
        operator: Operator,
        values: impl Into<AttributeValue>,
        user_param_type: ParamType,
    ) -> Self {
        UserConstraint {
            user_param: user_param.into(),
            operator,
            values: values.into(),
            user_param_type,
        }
    }

    pub fn user_param(&self) -> &str {
        &self.user_param
    }

    /// Returns whether `user` satisfies this constraint.
    pub fn matches_user(&self, user: &User) -> bool {
        let user_value = user.value_of(&self.user_param);
        self.matches(user_value.as_ref())
    }

    /// Returns whether the attribute value satisfies this constraint; `None` means the user
    /// does not have the attribute, which never matches.
    pub fn matches(&self, user_value: Option<&AttributeValue>) -> bool {
        let user_value = match user_value {
            Some(v) => v,
            None => return false,
        };

        match self.operator {
            Operator::In => self.in_list(user_value),
            Operator::Nin => !self.in_list(user_value),
            Operator::Contains => self.contains(user_value),
            Operator::DoesNotContain => !self.contains(user_value),
            Operator::Equals => self.compare(user_value, |o| o == Ordering::Equal),
            Operator::DoesNotEqual => self.compare(user_value, |o| o != Ordering::Equal),
            Operator::Gt => self.compare(user_value, |o| o == Ordering::Greater),
            Operator::Gte => self.compare(user_value, |o| o != Ordering::Less),
            Operator::Lt => self.compare(user_value, |o| o == Ordering::Less),
            Operator::Lte => self.compare(user_value, |o| o != Ordering::Greater),
            Operator::Unknown => false,
        }
    }

    fn in_list(&self, user_value: &AttributeValue) -> bool {
        let needle = user_value.to_string();
        self.values.to_string().split(',').any(|v| v == needle)
    }

    fn contains(&self, user_value: &AttributeValue) -> bool {
        self.values.to_string().contains(&user_value.to_string())
    }

    fn compare<F: Fn(Ordering) -> bool>(&self, user_value: &AttributeValue, f: F) -> bool {
        let coerced = self
            .user_param_type
            .coerce(user_value)
            .and_then(|l| Ok((l, self.user_param_type.coerce(&self.values)?)));
        match coerced {
            Ok((lhs, rhs)) => lhs.partial_cmp(&rhs).map(f).unwrap_or(false),
            Err(e) => {
                warn!(
                    "Constraint on '{}' could not be evaluated: {}",
                    self.user_param, e
                );
                false
            }
        }
    }
}

impl ParamType {
    /// Coerce `value` to this type.
    pub fn coerce(&self, value: &AttributeValue) -> Result<ConstraintValue, CoercionError> {
        match self {
            ParamType::Number => to_number(value).map(ConstraintValue::Number),
            ParamType::Boolean => Ok(ConstraintValue::Boolean(to_bool(value))),
            ParamType::Semver => to_semver(value).map(ConstraintValue::Semver),
            ParamType::String => Ok(ConstraintValue::String(value.to_string())),
        }
    }
}

impl PartialOrd for ConstraintValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (ConstraintValue::Number(l), ConstraintValue::Number(r)) => l.partial_cmp(r),
            (ConstraintValue::Boolean(l), ConstraintValue::Boolean(r)) => Some(l.cmp(r)),
            (ConstraintValue::Semver(l), ConstraintValue::Semver(r)) => Some(l.cmp_precedence(r)),
            (ConstraintValue::String(l), ConstraintValue::String(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }
}

fn to_number(value: &AttributeValue) -> Result<f64, CoercionError> {
    match value {
        AttributeValue::Number(n) => Ok(*n),
        AttributeValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        AttributeValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| CoercionError::NotANumber(s.clone())),
    }
}

#[allow(clippy::float_cmp)]
fn to_bool(value: &AttributeValue) -> bool {
    match value {
        AttributeValue::Number(n) => *n == 1.0,
        AttributeValue::Bool(b) => *b,
        AttributeValue::String(s) => s == "true",
    }
}

fn to_semver(value: &AttributeValue) -> Result<semver::Version, CoercionError> {
    let version_str = value.to_string();
    semver::Version::parse(&version_str)
        .ok()
        .or_else(|| parse_semver_loose(&version_str))
        .ok_or(CoercionError::NotASemver(version_str))
}

// Accepts "1" and "1.2" by filling the missing components with zeroes.
fn parse_semver_loose(version_str: &str) -> Option<semver::Version> {
    let parts = VERSION_NUMERIC_COMPONENTS_REGEX.captures(version_str)?;

    let numeric_parts = parts.get(0)?;
    let mut transformed_version_str = numeric_parts.as_str().to_string();

    for i in 1..parts.len() {
        if parts.get(i).is_none() {
            transformed_version_str.push_str(".0");
        }
    }

    let rest = &version_str[numeric_parts.end()..];
    transformed_version_str.push_str(rest);

    semver::Version::parse(&transformed_version_str).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral::prelude::*;
    use test_case::test_case;

    fn astring(s: &str) -> AttributeValue {
        AttributeValue::String(s.into())
    }
    fn anum(f: f64) -> AttributeValue {
        AttributeValue::Number(f)
    }

    fn string_constraint(op: Operator, values: &str) -> UserConstraint {
        UserConstraint::new("attr", op, values, ParamType::String)
    }

    #[test]
    fn test_missing_attribute_never_matches() {
        for op in [
            Operator::In,
            Operator::Nin,
            Operator::Equals,
            Operator::DoesNotEqual,
            Operator::Gt,
            Operator::Gte,
            Operator::Lt,
            Operator::Lte,
            Operator::Contains,
            Operator::DoesNotContain,
            Operator::Unknown,
        ] {
            let constraint = string_constraint(op.clone(), "foo");
            assert!(
                !constraint.matches(None),
                "{:?} should not match a missing attribute",
                op
            );
        }
    }

    #[test]
    fn test_op_in() {
        let constraint = string_constraint(Operator::In, "true,maybe");
        assert!(constraint.matches(Some(&astring("true"))));
        assert!(constraint.matches(Some(&astring("maybe"))));
        assert!(!constraint.matches(Some(&astring("false"))));
        assert!(
            !constraint.matches(Some(&astring("tru"))),
            "requires a whole element"
        );
        assert!(
            constraint.matches(Some(&AttributeValue::Bool(true))),
            "booleans compare by string form"
        );

        let numbers = string_constraint(Operator::In, "1,2,3");
        assert!(numbers.matches(Some(&anum(2.0))));
        assert!(!numbers.matches(Some(&anum(2.5))));
    }

    #[test]
    fn test_op_nin() {
        let constraint = string_constraint(Operator::Nin, "false,maybe");
        assert!(constraint.matches(Some(&astring("true"))));
        assert!(!constraint.matches(Some(&astring("maybe"))));
    }

    #[test]
    fn test_op_contains() {
        // the attribute is looked for inside the expected value
        let constraint = string_constraint(Operator::Contains, "scared");
        assert!(constraint.matches(Some(&astring("scared"))));
        assert!(constraint.matches(Some(&astring("car"))));
        assert!(constraint.matches(Some(&astring(""))));
        assert!(!constraint.matches(Some(&astring("scaredy"))));

        let negated = string_constraint(Operator::DoesNotContain, "fal");
        assert!(negated.matches(Some(&astring("true"))));
        assert!(!negated.matches(Some(&astring("fa"))));
    }

    #[test]
    fn test_op_equals_string() {
        let constraint = string_constraint(Operator::Equals, "true");
        assert!(constraint.matches(Some(&astring("true"))));
        assert!(
            !constraint.matches(Some(&astring("True"))),
            "case sensitive"
        );

        let negated = string_constraint(Operator::DoesNotEqual, "false");
        assert!(negated.matches(Some(&astring("true"))));
        assert!(!negated.matches(Some(&astring("false"))));
    }

    #[test]
    fn test_string_ordering_is_lexicographic() {
        let constraint = string_constraint(Operator::Gt, "b");
        assert!(constraint.matches(Some(&astring("c"))));
        assert!(!constraint.matches(Some(&astring("a"))));
        assert!(
            !string_constraint(Operator::Gt, "9").matches(Some(&astring("10"))),
            "no numeric coercion without a declared type"
        );
    }

    #[test_case(Operator::Equals, "42", 42.0, true)]
    #[test_case(Operator::DoesNotEqual, "42", 42.0, false)]
    #[test_case(Operator::Gt, "10", 11.0, true)]
    #[test_case(Operator::Gt, "10", 10.0, false)]
    #[test_case(Operator::Gte, "10", 10.0, true)]
    #[test_case(Operator::Lt, "10", 9.5, true)]
    #[test_case(Operator::Lte, "10", 10.0, true)]
    #[test_case(Operator::Lte, "10", 10.1, false)]
    fn test_numeric_ops(op: Operator, expected: &str, actual: f64, result: bool) {
        let constraint = UserConstraint::new("attr", op, expected, ParamType::Number);
        assert_eq!(constraint.matches(Some(&anum(actual))), result);
    }

    #[test]
    fn test_numeric_coercion() {
        let constraint = UserConstraint::new("attr", Operator::Gt, "9", ParamType::Number);
        assert!(
            constraint.matches(Some(&astring("10"))),
            "numeric strings are parsed"
        );

        let constraint = UserConstraint::new("attr", Operator::Equals, 1_i64, ParamType::Number);
        assert!(constraint.matches(Some(&AttributeValue::Bool(true))));
        assert!(!constraint.matches(Some(&AttributeValue::Bool(false))));
    }

    #[test]
    fn test_unparseable_number_is_a_non_match() {
        let constraint = UserConstraint::new("attr", Operator::Equals, "10", ParamType::Number);
        assert!(!constraint.matches(Some(&astring("ten"))));

        let negated = UserConstraint::new("attr", Operator::DoesNotEqual, "10", ParamType::Number);
        assert!(
            !negated.matches(Some(&astring("ten"))),
            "coercion failure fails the constraint even when negated"
        );

        assert_that!(ParamType::Number.coerce(&astring("ten")))
            .is_err_containing(CoercionError::NotANumber("ten".into()));
    }

    #[test]
    fn test_boolean_coercion() {
        let constraint = UserConstraint::new("attr", Operator::Equals, "true", ParamType::Boolean);
        assert!(constraint.matches(Some(&AttributeValue::Bool(true))));
        assert!(constraint.matches(Some(&astring("true"))));
        assert!(constraint.matches(Some(&anum(1.0))));
        assert!(!constraint.matches(Some(&anum(2.0))));
        assert!(!constraint.matches(Some(&astring("yes"))));

        let constraint = UserConstraint::new("attr", Operator::Equals, false, ParamType::Boolean);
        assert!(constraint.matches(Some(&anum(0.0))));
        assert!(constraint.matches(Some(&astring("false"))));
    }

    #[test]
    fn test_semver_ops() {
        let gt = UserConstraint::new("attr", Operator::Gt, "1.2.0", ParamType::Semver);
        assert!(gt.matches(Some(&astring("1.3.0"))));
        assert!(!gt.matches(Some(&astring("1.2.0"))));
        assert!(gt.matches(Some(&astring("1.10.0"))), "not lexicographic");
        assert!(!gt.matches(Some(&astring("1.1.9"))));

        let eq = UserConstraint::new("attr", Operator::Equals, "2.0.0", ParamType::Semver);
        assert!(
            eq.matches(Some(&astring("2.0"))),
            "we allow missing components (filled in with zeroes)"
        );
        assert!(eq.matches(Some(&astring("2"))));
        assert!(
            eq.matches(Some(&astring("2.0.0+build"))),
            "build metadata is ignored"
        );

        let lt = UserConstraint::new("attr", Operator::Lt, "2.0.0", ParamType::Semver);
        assert!(
            lt.matches(Some(&astring("2.0.0-rc.1"))),
            "prerelease version < released version"
        );

        let lte = UserConstraint::new("attr", Operator::Lte, "2.0.0", ParamType::Semver);
        assert!(lte.matches(Some(&astring("2.0.0"))));
        assert!(!lte.matches(Some(&astring("2.0.1"))));
    }

    #[test]
    fn test_unparseable_semver_is_a_non_match() {
        let constraint = UserConstraint::new("attr", Operator::Lt, "1.0.0", ParamType::Semver);
        assert!(!constraint.matches(Some(&astring("latest"))));
        assert_that!(ParamType::Semver.coerce(&astring("latest")))
            .is_err_containing(CoercionError::NotASemver("latest".into()));
    }

    #[test]
    fn test_unknown_operator() {
        let constraint: UserConstraint = serde_json::from_str(
            r#"{"userParam": "attr", "operator": "startsWith", "values": "a"}"#,
        )
        .unwrap();
        assert_eq!(constraint.operator, Operator::Unknown);
        assert!(!constraint.matches(Some(&astring("abc"))));
    }

    #[test]
    fn test_constraint_parse() {
        let constraint: UserConstraint = serde_json::from_str(
            r#"{"userParam": "age", "operator": "gte", "values": 21, "userParamType": "number"}"#,
        )
        .unwrap();
        assert_eq!(
            constraint,
            UserConstraint::new("age", Operator::Gte, 21_i64, ParamType::Number)
        );

        let constraint: UserConstraint = serde_json::from_str(
            r#"{"userParam": "isBetaUser", "operator": "doesNotEqual", "values": "false"}"#,
        )
        .unwrap();
        assert_eq!(constraint.user_param_type, ParamType::String);
        assert_eq!(constraint.operator, Operator::DoesNotEqual);

        let constraint: UserConstraint = serde_json::from_str(
            r#"{"userParam": "x", "operator": "in", "values": "a", "userParamType": "uuid"}"#,
        )
        .unwrap();
        assert_eq!(
            constraint.user_param_type,
            ParamType::String,
            "unknown declared types fall back to string"
        );
    }

    #[test]
    fn test_null_fields_take_defaults() {
        let constraint: UserConstraint = serde_json::from_str(
            r#"{"userParam": "plan", "operator": "equals", "values": null, "userParamType": null}"#,
        )
        .unwrap();
        assert_eq!(
            constraint,
            UserConstraint::new("plan", Operator::Equals, "", ParamType::String)
        );
    }

    #[test]
    fn test_id_constraint_uses_identifier() {
        let constraint = string_constraint(Operator::Equals, "123");
        let constraint = UserConstraint {
            user_param: "id".into(),
            ..constraint
        };
        let user = User::with_id("123").param("id", "456").build();
        assert!(constraint.matches_user(&user));

        let other = User::with_id("456").param("id", "123").build();
        assert!(!constraint.matches_user(&other));
    }
}
