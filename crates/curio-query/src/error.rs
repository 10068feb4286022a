//! Error types for query parsing.

use thiserror::Error;

/// Errors produced while parsing a query string.
///
/// Every variant is a deterministic function of the input: none are retried
/// and none are server faults. Callers surface them as a single "bad query"
/// failure class, with the variant as the distinguishing reason code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Structural problems: unmatched parentheses, an operator without its
    /// operands, or a query nested beyond the supported depth.
    #[error("query syntax error: {0}")]
    Syntax(String),

    /// A `sort:` directive named a mode that does not exist, or one that the
    /// query target does not support.
    #[error("unknown sort mode {0:?}")]
    UnknownSort(String),

    /// A recognized filter prefix whose value does not parse.
    #[error("malformed filter {token:?}: {reason}")]
    MalformedFilter {
        /// The full offending token.
        token: String,
        /// What the filter grammar expected instead.
        reason: String,
    },
}

impl QueryError {
    /// Creates a malformed-filter error for the given token.
    pub(crate) fn malformed(token: &str, reason: &str) -> Self {
        Self::MalformedFilter {
            token: token.to_string(),
            reason: reason.to_string(),
        }
    }
}
