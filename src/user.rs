use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

const USER_PARAMS_STARTING_CAPACITY: usize = 10;

/// The name under which a user's identifier is exposed to constraints.
pub(crate) const ID_ATTRIBUTE: &str = "id";

/// AttributeValue is an enum representing possible values that can be stored in a user attribute
/// or in the expected-value payload of a constraint.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Used when storing a string value.
    String(String),
    /// Used when storing a number.
    Number(f64),
    /// Used when storing a boolean.
    Bool(bool),
}

impl Default for AttributeValue {
    fn default() -> Self {
        AttributeValue::String(String::new())
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> AttributeValue {
        AttributeValue::String(s.to_owned())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> AttributeValue {
        AttributeValue::String(s)
    }
}

impl From<bool> for AttributeValue {
    fn from(b: bool) -> AttributeValue {
        AttributeValue::Bool(b)
    }
}

impl From<i64> for AttributeValue {
    fn from(i: i64) -> Self {
        AttributeValue::Number(i as f64)
    }
}

impl From<f64> for AttributeValue {
    fn from(f: f64) -> Self {
        AttributeValue::Number(f)
    }
}

impl AttributeValue {
    /// The value as an integer when it is a whole number small enough to be exact.
    fn as_integral(&self) -> Option<i64> {
        match self {
            AttributeValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(*n as i64),
            _ => None,
        }
    }
}

/// Integral numbers render without a fractional part, so `5.0` displays as `5`.
impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(i) = self.as_integral() {
            return write!(f, "{}", i);
        }
        match self {
            AttributeValue::String(s) => f.write_str(s),
            AttributeValue::Bool(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Serializes numbers the same way they display, so `5.0` is written as `5`.
impl Serialize for AttributeValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(i) = self.as_integral() {
            return serializer.serialize_i64(i);
        }
        match self {
            AttributeValue::String(s) => serializer.serialize_str(s),
            AttributeValue::Bool(b) => serializer.serialize_bool(*b),
            AttributeValue::Number(n) => serializer.serialize_f64(*n),
        }
    }
}

/// A User carries the identity and attributes used to target feature flags.
///
/// The identifier is optional. A user without one is treated as anonymous: every active flag
/// evaluates to on, and no analytics events are recorded for them.
///
/// To construct a User, use the [UserBuilder] by calling [User::with_id], or [User::anonymous]
/// for a user that carries only attributes.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    params: HashMap<String, AttributeValue>,
}

pub(crate) fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    T: Default + Deserialize<'de>,
    D: Deserializer<'de>,
{
    let opt = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

impl User {
    /// Create a new [UserBuilder], seeding it with the provided user identifier.
    pub fn with_id(id: impl Into<String>) -> UserBuilder {
        UserBuilder::new(Some(id.into()))
    }

    /// Create a new [UserBuilder] for a user without an identifier.
    pub fn anonymous() -> UserBuilder {
        UserBuilder::new(None)
    }

    /// Returns the identifier of the user, if any.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Returns the user's attributes.
    pub fn params(&self) -> &HashMap<String, AttributeValue> {
        &self.params
    }

    /// Return the value of the attribute named `attr`.
    ///
    /// The attribute `id` always resolves to the user's identifier, even when the attribute map
    /// also holds an `id` entry.
    pub fn value_of(&self, attr: &str) -> Option<AttributeValue> {
        if attr == ID_ATTRIBUTE {
            return self.id.as_deref().map(AttributeValue::from);
        }
        self.params.get(attr).cloned()
    }

    /// Set the attribute named `key` to `value`.
    pub fn attribute<T: Into<AttributeValue>>(&mut self, key: &str, value: T) {
        let _ = self.params.insert(key.to_string(), value.into());
    }
}

/// Contains methods for configuring a user.
pub struct UserBuilder {
    id: Option<String>,
    params: HashMap<String, AttributeValue>,
}

impl UserBuilder {
    /// Create a new user builder with an optional identifier.
    pub fn new(id: Option<String>) -> Self {
        Self {
            id,
            params: HashMap::with_capacity(USER_PARAMS_STARTING_CAPACITY),
        }
    }

    /// Set a single attribute for this builder instance.
    pub fn param(&mut self, key: impl Into<String>, value: impl Into<AttributeValue>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Extend the attributes of this builder instance.
    pub fn params(&mut self, params: HashMap<String, AttributeValue>) -> &mut Self {
        self.params.extend(params);
        self
    }

    /// Create a new [User] instance.
    pub fn build(&self) -> User {
        User {
            id: self.id.clone(),
            params: self.params.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use maplit::hashmap;
    use spectral::prelude::*;
    use test_case::test_case;

    #[test]
    fn id_attribute_resolves_to_identifier() {
        let user = User::with_id("123")
            .params(hashmap! { "id".into() => "999".into() })
            .build();
        assert_that!(user.value_of("id")).contains_value(AttributeValue::from("123"));
    }

    #[test]
    fn anonymous_user_has_no_id_attribute() {
        let user = User::anonymous().param("id", "999").build();
        assert_that!(user.id()).is_none();
        assert_that!(user.value_of("id")).is_none();
    }

    #[test]
    fn value_of_reads_params() {
        let user = User::with_id("u")
            .param("plan", "pro")
            .param("seats", 12_i64)
            .param("beta", true)
            .build();
        assert_that!(user.value_of("plan")).contains_value(AttributeValue::from("pro"));
        assert_that!(user.value_of("seats")).contains_value(AttributeValue::Number(12.0));
        assert_that!(user.value_of("beta")).contains_value(AttributeValue::Bool(true));
        assert_that!(user.value_of("missing")).is_none();
    }

    #[test]
    fn attribute_overwrites_existing_value() {
        let mut user = User::with_id("u").param("plan", "free").build();
        user.attribute("plan", "pro");
        assert_that!(user.value_of("plan")).contains_value(AttributeValue::from("pro"));
    }

    #[test_case(AttributeValue::from("abc"), "abc")]
    #[test_case(AttributeValue::Number(5.0), "5")]
    #[test_case(AttributeValue::Number(-2.0), "-2")]
    #[test_case(AttributeValue::Number(2.5), "2.5")]
    #[test_case(AttributeValue::Bool(true), "true")]
    #[test_case(AttributeValue::Bool(false), "false")]
    fn display_renders_string_form(value: AttributeValue, expected: &str) {
        assert_eq!(value.to_string(), expected);
    }

    #[test_case(AttributeValue::Number(2.0), "2")]
    #[test_case(AttributeValue::Number(-7.0), "-7")]
    #[test_case(AttributeValue::Number(2.5), "2.5")]
    #[test_case(AttributeValue::Bool(true), "true")]
    #[test_case(AttributeValue::from("2.0"), r#""2.0""#)]
    fn serializes_like_display(value: AttributeValue, expected: &str) {
        assert_eq!(serde_json::to_string(&value).unwrap(), expected);
    }

    #[test]
    fn deserializes_user_without_params() {
        let user: User = serde_json::from_str(r#"{"id": "abc", "params": null}"#).unwrap();
        assert_that!(user.id()).contains_value("abc");
        assert_that!(user.params().len()).is_equal_to(0);

        let user: User = serde_json::from_str(r#"{"params": {"a": 1, "b": "x", "c": false}}"#)
            .unwrap();
        assert_that!(user.id()).is_none();
        assert_that!(user.value_of("a")).contains_value(AttributeValue::Number(1.0));
        assert_that!(user.value_of("c")).contains_value(AttributeValue::Bool(false));
    }
}
