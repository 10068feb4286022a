//! Backend-agnostic predicate trees.
//!
//! The compiler lowers query ASTs into this closed set of nodes; the storage
//! collaborator evaluates them over one of the two record kinds. The shape
//! is a closed tagged variant so that a forgotten filter kind is a compile
//! error, not a runtime surprise.

use curio_query::MediaKind;
use serde::{Deserialize, Serialize};

use crate::record::ItemStatus;

/// A storage-visible column on one of the record kinds.
///
/// Not every key exists on every kind; the compiler's field maps only emit
/// keys the current target carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKey {
    /// Unique item id.
    Id,
    /// Upload time.
    CreatedAt,
    /// Last modification time.
    UpdatedAt,
    /// Time the most recent page was added (comics only).
    LastPageAt,
    /// Pixel width (media only).
    Width,
    /// Pixel height (media only).
    Height,
    /// Playback length in seconds (media only).
    Duration,
    /// File size in bytes (media only).
    Size,
    /// Average rating.
    Rating,
    /// Number of ratings.
    RatingCount,
    /// Number of comments (media only).
    CommentCount,
    /// Stable per-item random-order key, assigned at write time.
    ShuffleKey,
    /// Media kind discriminant (media only).
    Kind,
    /// Explicit-content flag.
    Explicit,
    /// Moderation status.
    Status,
    /// Id of the uploading user.
    UploaderId,
}

/// A comparison operator on a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    /// Equal.
    Eq,
    /// Strictly greater.
    Gt,
    /// Greater or equal.
    Gte,
    /// Strictly less.
    Lt,
    /// Less or equal.
    Lte,
}

/// A typed comparison value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer values, including unix timestamps.
    Int(i64),
    /// Floating-point values: ratings, shuffle keys, numeric filters.
    Float(f64),
    /// Boolean flags.
    Bool(bool),
    /// A media kind.
    Kind(MediaKind),
    /// A moderation status.
    Status(ItemStatus),
}

impl Value {
    /// Numeric view of the value, when it has one.
    pub fn as_f64(self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(value as f64),
            Self::Float(value) => Some(value),
            Self::Bool(_) | Self::Kind(_) | Self::Status(_) => None,
        }
    }
}

/// A single field comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldCmp {
    /// The field being compared.
    pub field: FieldKey,
    /// The comparison operator.
    pub op: CompareOp,
    /// The value to compare against.
    pub value: Value,
}

/// A tag-membership test.
///
/// The explicit-content gate lives on the leaf: a viewer without the adult
/// gate never matches an explicit-flagged tag, even on an exact name match.
#[derive(Debug, Clone, PartialEq)]
pub struct TagMatch {
    /// Normalized tag name to match.
    pub name: String,
    /// Whether explicit-flagged tags may match at all.
    pub allow_explicit: bool,
}

/// A predicate tree the storage collaborator can evaluate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Every child must hold.
    And(Vec<Self>),
    /// At least one child must hold.
    Or(Vec<Self>),
    /// The child must not hold.
    Not(Box<Self>),
    /// A field comparison.
    Cmp(FieldCmp),
    /// A tag-membership test.
    HasTag(TagMatch),
}

impl Predicate {
    /// Shorthand for a field comparison leaf.
    pub fn cmp(field: FieldKey, op: CompareOp, value: Value) -> Self {
        Self::Cmp(FieldCmp { field, op, value })
    }

    /// Conjunction of clauses; `None` means "no constraint".
    ///
    /// A single clause is returned directly, without a redundant wrapper.
    pub fn all(mut clauses: Vec<Self>) -> Option<Self> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Self::And(clauses)),
        }
    }

    /// Disjunction of clauses; `None` means "no constraint".
    pub fn any(mut clauses: Vec<Self>) -> Option<Self> {
        match clauses.len() {
            0 => None,
            1 => clauses.pop(),
            _ => Some(Self::Or(clauses)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_collapses() {
        assert_eq!(Predicate::all(vec![]), None);

        let single = Predicate::cmp(FieldKey::Rating, CompareOp::Gt, Value::Float(4.0));
        assert_eq!(Predicate::all(vec![single.clone()]), Some(single.clone()));

        let pair = Predicate::all(vec![single.clone(), single.clone()]);
        assert_eq!(pair, Some(Predicate::And(vec![single.clone(), single])));
    }

    #[test]
    fn value_numeric_view() {
        assert_eq!(Value::Int(3).as_f64(), Some(3.0));
        assert_eq!(Value::Float(0.5).as_f64(), Some(0.5));
        assert_eq!(Value::Bool(true).as_f64(), None);
    }
}
