//! Predicate evaluation against topic values.
//!
//! Regular expressions are compiled once when a watcher registers. A pattern
//! that fails to compile is not rejected up front; every evaluation that
//! reaches it reports the failure instead.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use repubsub_proto::{PathTest, TopicPredicate, TopicShape, TopicValue};

/// Failure to evaluate a predicate against one topic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PredicateError {
    /// The operator does not apply to this topic shape.
    #[error("{operator} expects a {expected} topic, got {actual}")]
    ShapeMismatch {
        operator: &'static str,
        expected: TopicShape,
        actual: TopicShape,
    },

    /// The regular expression does not compile.
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The path does not resolve in the topic object.
    #[error("path {path} not found in topic")]
    MissingPath { path: String },

    /// The value at the path has the wrong type for the test.
    #[error("{test} expects {expected} at {path}")]
    ValueMismatch {
        test: &'static str,
        expected: &'static str,
        path: String,
    },
}

/// A predicate ready for repeated evaluation.
#[derive(Debug)]
pub struct CompiledPredicate {
    predicate: TopicPredicate,
    patterns: HashMap<String, Result<Regex, String>>,
}

impl CompiledPredicate {
    /// Compile every pattern referenced by the predicate.
    pub fn new(predicate: TopicPredicate) -> Self {
        let patterns = predicate
            .patterns()
            .into_iter()
            .map(|p| (p.to_string(), Regex::new(p).map_err(|e| e.to_string())))
            .collect();

        Self {
            predicate,
            patterns,
        }
    }

    /// Get the source predicate.
    pub fn predicate(&self) -> &TopicPredicate {
        &self.predicate
    }

    /// Evaluate against a topic value.
    pub fn evaluate(&self, topic: &TopicValue) -> Result<bool, PredicateError> {
        self.eval(&self.predicate, topic)
    }

    fn eval(&self, predicate: &TopicPredicate, topic: &TopicValue) -> Result<bool, PredicateError> {
        match predicate {
            TopicPredicate::Any => Ok(true),
            TopicPredicate::Eq(expected) => Ok(topic == expected),
            TopicPredicate::Matches(pattern) => {
                let s = topic.as_str().ok_or(PredicateError::ShapeMismatch {
                    operator: "matches",
                    expected: TopicShape::String,
                    actual: topic.shape(),
                })?;
                Ok(self.regex(pattern)?.is_match(s))
            }
            TopicPredicate::ContainsAll(wanted) => {
                let tags = Self::tags(topic, "contains_all")?;
                Ok(wanted.iter().all(|w| tags.contains(w)))
            }
            TopicPredicate::ContainsAny(wanted) => {
                let tags = Self::tags(topic, "contains_any")?;
                Ok(wanted.iter().any(|w| tags.contains(w)))
            }
            TopicPredicate::Path { path, test } => self.eval_path(path, test, topic),
            TopicPredicate::And(predicates) => {
                for p in predicates {
                    if !self.eval(p, topic)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            TopicPredicate::Or(predicates) => {
                for p in predicates {
                    if self.eval(p, topic)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TopicPredicate::Not(inner) => Ok(!self.eval(inner, topic)?),
        }
    }

    fn eval_path(
        &self,
        path: &[String],
        test: &PathTest,
        topic: &TopicValue,
    ) -> Result<bool, PredicateError> {
        if topic.as_object().is_none() {
            return Err(PredicateError::ShapeMismatch {
                operator: "path",
                expected: TopicShape::Object,
                actual: topic.shape(),
            });
        }

        let value = match topic.lookup(path) {
            Some(value) => value,
            None if matches!(test, PathTest::Exists) => return Ok(false),
            None => {
                return Err(PredicateError::MissingPath {
                    path: path.join("."),
                })
            }
        };

        match test {
            PathTest::Exists => Ok(true),
            PathTest::Eq(expected) => Ok(value == expected),
            PathTest::Contains(needle) => match value {
                Value::Array(items) => Ok(items.contains(needle)),
                Value::String(haystack) => match needle.as_str() {
                    Some(n) => Ok(haystack.contains(n)),
                    None => Err(PredicateError::ValueMismatch {
                        test: "contains",
                        expected: "a string needle for a string",
                        path: path.join("."),
                    }),
                },
                _ => Err(PredicateError::ValueMismatch {
                    test: "contains",
                    expected: "an array or string",
                    path: path.join("."),
                }),
            },
            PathTest::Matches(pattern) => {
                let s = value.as_str().ok_or_else(|| PredicateError::ValueMismatch {
                    test: "matches",
                    expected: "a string",
                    path: path.join("."),
                })?;
                Ok(self.regex(pattern)?.is_match(s))
            }
        }
    }

    fn tags<'a>(topic: &'a TopicValue, operator: &'static str) -> Result<&'a [String], PredicateError> {
        topic.as_tags().ok_or(PredicateError::ShapeMismatch {
            operator,
            expected: TopicShape::Tags,
            actual: topic.shape(),
        })
    }

    fn regex(&self, pattern: &str) -> Result<&Regex, PredicateError> {
        match self.patterns.get(pattern) {
            Some(Ok(re)) => Ok(re),
            Some(Err(reason)) => Err(PredicateError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: reason.clone(),
            }),
            // Patterns are collected from the same predicate at construction.
            None => Err(PredicateError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: "pattern was not compiled".to_string(),
            }),
        }
    }
}
