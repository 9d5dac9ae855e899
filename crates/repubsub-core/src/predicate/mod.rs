//! Store-side evaluation of topic predicates.

mod evaluator;

pub use evaluator::{CompiledPredicate, PredicateError};
