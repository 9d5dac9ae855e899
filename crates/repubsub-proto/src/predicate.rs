//! Topic predicate expressions.
//!
//! Predicates are plain data so they can be shipped to the store and
//! evaluated there against the `topic` field of each new document. They
//! never see the payload or any store bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::topic::TopicValue;

/// A server-evaluable predicate over topic values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopicPredicate {
    /// Matches every topic.
    #[default]
    Any,
    /// Structural equality with a topic value.
    Eq(TopicValue),
    /// Regular expression search against a string topic.
    Matches(String),
    /// Tag topic contains every listed tag.
    ContainsAll(Vec<String>),
    /// Tag topic contains at least one listed tag.
    ContainsAny(Vec<String>),
    /// Test applied to the value found at `path` in an object topic.
    Path { path: Vec<String>, test: PathTest },
    /// All sub-predicates hold.
    And(Vec<TopicPredicate>),
    /// At least one sub-predicate holds.
    Or(Vec<TopicPredicate>),
    /// The sub-predicate does not hold.
    Not(Box<TopicPredicate>),
}

/// A test applied to a value inside an object topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathTest {
    /// The path resolves to some value.
    Exists,
    /// The value equals the given JSON value.
    Eq(Value),
    /// The value is an array containing the element, or a string containing the substring.
    Contains(Value),
    /// The value is a string matching the regular expression.
    Matches(String),
}

impl TopicPredicate {
    /// Create an equality predicate.
    pub fn eq(topic: impl Into<TopicValue>) -> Self {
        TopicPredicate::Eq(topic.into())
    }

    /// Create a regex predicate for string topics.
    pub fn matches(pattern: impl Into<String>) -> Self {
        TopicPredicate::Matches(pattern.into())
    }

    /// Create a "contains all" predicate for tag topics.
    pub fn contains_all<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        TopicPredicate::ContainsAll(tags.into_iter().map(Into::into).collect())
    }

    /// Create a "contains any" predicate for tag topics.
    pub fn contains_any<I, T>(tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        TopicPredicate::ContainsAny(tags.into_iter().map(Into::into).collect())
    }

    /// Create a path predicate for object topics.
    pub fn path<I, T>(path: I, test: PathTest) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        TopicPredicate::Path {
            path: path.into_iter().map(Into::into).collect(),
            test,
        }
    }

    /// Create an AND predicate.
    pub fn and(predicates: Vec<TopicPredicate>) -> Self {
        TopicPredicate::And(predicates)
    }

    /// Create an OR predicate.
    pub fn or(predicates: Vec<TopicPredicate>) -> Self {
        TopicPredicate::Or(predicates)
    }

    /// Negate a predicate.
    pub fn negate(predicate: TopicPredicate) -> Self {
        TopicPredicate::Not(Box::new(predicate))
    }

    /// Collect every regular expression pattern referenced by this predicate.
    pub fn patterns(&self) -> Vec<&str> {
        let mut patterns = Vec::new();
        self.collect_patterns(&mut patterns);
        patterns
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            TopicPredicate::Matches(pattern)
            | TopicPredicate::Path {
                test: PathTest::Matches(pattern),
                ..
            } => out.push(pattern),
            TopicPredicate::And(predicates) | TopicPredicate::Or(predicates) => {
                for p in predicates {
                    p.collect_patterns(out);
                }
            }
            TopicPredicate::Not(inner) => inner.collect_patterns(out),
            _ => {}
        }
    }
}

impl PathTest {
    pub fn eq(value: impl Into<Value>) -> Self {
        PathTest::Eq(value.into())
    }

    pub fn contains(value: impl Into<Value>) -> Self {
        PathTest::Contains(value.into())
    }

    pub fn matches(pattern: impl Into<String>) -> Self {
        PathTest::Matches(pattern.into())
    }
}

impl std::ops::Not for TopicPredicate {
    type Output = TopicPredicate;

    fn not(self) -> Self::Output {
        TopicPredicate::negate(self)
    }
}
