//! Topic values.
//!
//! A topic is opaque to the exchange: it is compared for equality when
//! targeting an upsert and handed unchanged to subscriber predicates. Three
//! shapes are supported and serialize untagged, so a topic reads the same on
//! disk as it was written by the publisher:
//!
//! - `"weather.ca.mountainview"` - a plain string
//! - `["superhero", "fight", "supervillain"]` - an ordered tag sequence
//! - `{"teamup": {"superheroes": ["Batman"]}}` - a nested object

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Error;

/// A topic value supplied by a publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TopicValue {
    /// A plain string topic.
    String(String),
    /// An ordered sequence of tags.
    Tags(Vec<String>),
    /// A nested key/value structure.
    Object(Map<String, Value>),
}

/// The shape of a topic value, used in evaluation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicShape {
    String,
    Tags,
    Object,
}

impl fmt::Display for TopicShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicShape::String => f.write_str("string"),
            TopicShape::Tags => f.write_str("tags"),
            TopicShape::Object => f.write_str("object"),
        }
    }
}

impl TopicValue {
    /// Create a tag sequence topic.
    pub fn tags<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        TopicValue::Tags(tags.into_iter().map(Into::into).collect())
    }

    /// Create an object topic from a JSON value.
    ///
    /// Fails if the value is not a JSON object.
    pub fn object(value: Value) -> Result<Self, Error> {
        match value {
            Value::Object(map) => Ok(TopicValue::Object(map)),
            other => Err(Error::InvalidMessage(format!(
                "expected a JSON object for an object topic, got {other}"
            ))),
        }
    }

    /// Get the shape of this topic.
    pub fn shape(&self) -> TopicShape {
        match self {
            TopicValue::String(_) => TopicShape::String,
            TopicValue::Tags(_) => TopicShape::Tags,
            TopicValue::Object(_) => TopicShape::Object,
        }
    }

    /// Try to get as string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TopicValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as tag slice.
    pub fn as_tags(&self) -> Option<&[String]> {
        match self {
            TopicValue::Tags(tags) => Some(tags),
            _ => None,
        }
    }

    /// Try to get as object map.
    pub fn as_object(&self) -> Option<&Map<String, Value>> {
        match self {
            TopicValue::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Descend into an object topic along `path`.
    ///
    /// Returns `None` if the topic is not an object or any segment is missing.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.as_object()?.get(first.as_ref())?;
        for segment in rest {
            current = current.as_object()?.get(segment.as_ref())?;
        }
        Some(current)
    }

    /// Canonical byte encoding used as the upsert key.
    ///
    /// Object keys are always emitted in sorted order, so two structurally
    /// equal topics encode identically.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, Error> {
        serde_json::to_vec(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl fmt::Display for TopicValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TopicValue::String(s) => f.write_str(s),
            TopicValue::Tags(tags) => write!(f, "[{}]", tags.join(", ")),
            TopicValue::Object(map) => write!(f, "{}", Value::Object(map.clone())),
        }
    }
}

impl From<&str> for TopicValue {
    fn from(v: &str) -> Self {
        TopicValue::String(v.to_string())
    }
}

impl From<String> for TopicValue {
    fn from(v: String) -> Self {
        TopicValue::String(v)
    }
}

impl From<Vec<String>> for TopicValue {
    fn from(v: Vec<String>) -> Self {
        TopicValue::Tags(v)
    }
}

impl From<Vec<&str>> for TopicValue {
    fn from(v: Vec<&str>) -> Self {
        TopicValue::tags(v)
    }
}

impl From<Map<String, Value>> for TopicValue {
    fn from(v: Map<String, Value>) -> Self {
        TopicValue::Object(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_untagged_encoding() {
        let topic = TopicValue::from("weather.ca.mountainview");
        assert_eq!(
            serde_json::to_value(&topic).unwrap(),
            json!("weather.ca.mountainview")
        );

        let tags = TopicValue::tags(["superhero", "fight"]);
        assert_eq!(serde_json::to_value(&tags).unwrap(), json!(["superhero", "fight"]));

        let decoded: TopicValue = serde_json::from_value(json!({"a": 1})).unwrap();
        assert_eq!(decoded.shape(), TopicShape::Object);
    }

    #[test]
    fn test_canonical_bytes_ignore_key_order() {
        let a = TopicValue::object(json!({"b": 1, "a": {"y": 2, "x": 3}})).unwrap();
        let b = TopicValue::object(json!({"a": {"x": 3, "y": 2}, "b": 1})).unwrap();
        assert_eq!(a.canonical_bytes().unwrap(), b.canonical_bytes().unwrap());
    }

    #[test]
    fn test_lookup() {
        let topic = TopicValue::object(json!({
            "teamup": {"superheroes": ["Batman", "Superman"]}
        }))
        .unwrap();

        assert_eq!(
            topic.lookup(&["teamup", "superheroes"]),
            Some(&json!(["Batman", "Superman"]))
        );
        assert!(topic.lookup(&["teamup", "villains"]).is_none());
        assert!(TopicValue::from("x").lookup(&["x"]).is_none());
    }

    #[test]
    fn test_object_rejects_non_object() {
        assert!(TopicValue::object(json!([1, 2])).is_err());
    }
}
