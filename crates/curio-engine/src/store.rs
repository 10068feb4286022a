//! Storage collaborator interface.
//!
//! The engine is indifferent to the persistence technology behind it; it
//! only needs predicate-filtered, ordered, bounded fetches over the two
//! record kinds. Implementations must order by the named field with the
//! item id as tie-breaker, both in the requested direction — the seek
//! predicates the engine builds rely on that ordering being total.

use thiserror::Error;

use serde::{Deserialize, Serialize};

use crate::{
    predicate::{FieldKey, Predicate},
    record::{ComicRecord, MediaRecord},
};

/// Which record kind a query runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// Individual media items.
    Media,
    /// Comics (ordered collections of media).
    Comic,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Smallest first.
    Asc,
    /// Largest first.
    Desc,
}

/// The ordering contract for a fetch: a named field plus the id tie-breaker,
/// both in `direction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    /// Primary ordering field.
    pub field: FieldKey,
    /// Direction applied to the field and the id tie-breaker alike.
    pub direction: Direction,
}

/// One bounded, ordered, predicate-filtered fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPlan {
    /// Rows must satisfy this predicate; None means no constraint.
    pub predicate: Option<Predicate>,
    /// Ordering applied before the limit.
    pub order: OrderBy,
    /// Maximum number of rows to return.
    pub limit: usize,
}

/// A storage failure surfaced to the engine. Never retried here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The backend failed to execute a fetch.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// The generic query capability the engine consumes.
pub trait CatalogStore {
    /// Fetches media rows matching the plan.
    fn fetch_media(&self, plan: &FetchPlan) -> Result<Vec<MediaRecord>, StoreError>;

    /// Fetches comic rows matching the plan.
    fn fetch_comics(&self, plan: &FetchPlan) -> Result<Vec<ComicRecord>, StoreError>;
}
