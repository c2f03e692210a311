//! Query error types

use ctx_types::DecodeError;
use thiserror::Error;

/// Structural errors in a predicate tree.
///
/// Evaluation never fails: malformed comparisons yield
/// [`Outcome::Indeterminate`](crate::Outcome::Indeterminate). These errors
/// only arise while assembling or decoding a tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("{0} node requires at least one child")]
    EmptyComposite(&'static str),

    #[error("not node takes exactly one child")]
    NotArity,

    #[error("rule node cannot have children")]
    RuleHasNoChildren,

    #[error("attribute selector requires a name")]
    UnnamedAttribute,

    #[error("unknown query node: {0}")]
    UnknownNode(String),

    #[error("malformed query: {0}")]
    Decode(#[from] DecodeError),
}

/// Result type for query assembly
pub type QueryResult<T> = std::result::Result<T, QueryError>;
