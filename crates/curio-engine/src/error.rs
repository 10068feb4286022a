//! Error types for the curio-engine crate.

use curio_query::{QueryError, SortMode};
use thiserror::Error;

use crate::store::StoreError;

/// Reason code attached to a rejected query, for the boundary's
/// bad-request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadQueryReason {
    /// Unmatched parentheses or operator/operand imbalance.
    Syntax,
    /// Unsupported `sort:` value.
    UnknownSort,
    /// A recognized filter prefix with an unparsable value.
    MalformedFilter,
    /// A ratio filter paired with a sort that cannot carry it.
    UnsupportedCombination,
}

/// Errors surfaced by the search engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The query string failed to parse.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Aspect-ratio filters only run under the upload-date sorts.
    #[error("aspect-ratio filters require sort:new or sort:old, not sort:{}", .0.as_str())]
    RatioSortUnsupported(SortMode),

    /// The caller's request context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The storage collaborator failed; not retried here.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl EngineError {
    /// Reason code when this is a deterministic bad-query failure the caller
    /// should reject with a 400-equivalent; None for server-side failures.
    pub fn bad_query_reason(&self) -> Option<BadQueryReason> {
        match self {
            Self::Query(QueryError::Syntax(_)) => Some(BadQueryReason::Syntax),
            Self::Query(QueryError::UnknownSort(_)) => Some(BadQueryReason::UnknownSort),
            Self::Query(QueryError::MalformedFilter { .. }) => {
                Some(BadQueryReason::MalformedFilter)
            }
            Self::RatioSortUnsupported(_) => Some(BadQueryReason::UnsupportedCombination),
            Self::Cancelled | Self::Store(_) => None,
        }
    }
}
