// Guard parsing and evaluation
// `if:` clauses on jobs and steps are parsed into a typed expression tree and
// evaluated against the job's execution context.

pub mod evaluator;
pub mod expr;

pub use evaluator::ConditionEvaluator;
pub use expr::{CompareOp, Guard, Literal};

use thiserror::Error;

/// Errors produced while parsing or evaluating a guard expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConditionError {
    #[error("parse error at position {position}: {message}")]
    Parse { message: String, position: usize },

    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),

    #[error("type mismatch: {0}")]
    TypeMismatch(String),
}
