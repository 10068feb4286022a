//! In-memory reference store.
//!
//! Defines the semantics of the [`CatalogStore`] contract — predicate
//! evaluation, field ordering with id tie-break, limits — and backs the
//! engine's test suite. A production deployment would put a relational
//! store behind the same trait.

use std::cmp::Ordering;

use crate::{
    predicate::{CompareOp, FieldCmp, Predicate, Value},
    record::{CatalogRecord, ComicRecord, MediaRecord},
    store::{CatalogStore, Direction, FetchPlan, StoreError},
};

/// A catalog held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Media items, in insertion order.
    media: Vec<MediaRecord>,
    /// Comics, in insertion order.
    comics: Vec<ComicRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a media item.
    pub fn add_media(&mut self, record: MediaRecord) {
        self.media.push(record);
    }

    /// Adds a comic.
    pub fn add_comic(&mut self, record: ComicRecord) {
        self.comics.push(record);
    }

    /// Runs a plan over one record collection.
    fn run<R: CatalogRecord + Clone>(records: &[R], plan: &FetchPlan) -> Vec<R> {
        let mut rows: Vec<R> = records
            .iter()
            .filter(|record| {
                plan.predicate
                    .as_ref()
                    .is_none_or(|predicate| evaluate(*record, predicate))
            })
            .cloned()
            .collect();

        rows.sort_by(|a, b| {
            let ordering = order_values(
                a.field_value(plan.order.field),
                b.field_value(plan.order.field),
            )
            .then_with(|| a.id().cmp(&b.id()));
            match plan.order.direction {
                Direction::Asc => ordering,
                Direction::Desc => ordering.reverse(),
            }
        });

        rows.truncate(plan.limit);
        rows
    }
}

impl CatalogStore for MemoryStore {
    fn fetch_media(&self, plan: &FetchPlan) -> Result<Vec<MediaRecord>, StoreError> {
        Ok(Self::run(&self.media, plan))
    }

    fn fetch_comics(&self, plan: &FetchPlan) -> Result<Vec<ComicRecord>, StoreError> {
        Ok(Self::run(&self.comics, plan))
    }
}

/// Evaluates a predicate against one record.
pub fn evaluate<R: CatalogRecord>(record: &R, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::And(clauses) => clauses.iter().all(|clause| evaluate(record, clause)),
        Predicate::Or(clauses) => clauses.iter().any(|clause| evaluate(record, clause)),
        Predicate::Not(inner) => !evaluate(record, inner),
        Predicate::Cmp(cmp) => eval_cmp(record, cmp),
        Predicate::HasTag(tag) => record
            .tags()
            .iter()
            .any(|link| link.name == tag.name && (tag.allow_explicit || !link.explicit)),
    }
}

/// Evaluates one field comparison. Absent fields never match.
fn eval_cmp<R: CatalogRecord>(record: &R, cmp: &FieldCmp) -> bool {
    let Some(actual) = record.field_value(cmp.field) else {
        return false;
    };

    match cmp.op {
        CompareOp::Eq => values_equal(actual, cmp.value),
        CompareOp::Gt => numeric_order(actual, cmp.value).is_some_and(Ordering::is_gt),
        CompareOp::Gte => numeric_order(actual, cmp.value).is_some_and(Ordering::is_ge),
        CompareOp::Lt => numeric_order(actual, cmp.value).is_some_and(Ordering::is_lt),
        CompareOp::Lte => numeric_order(actual, cmp.value).is_some_and(Ordering::is_le),
    }
}

/// Equality across value variants; mixed numeric widths compare numerically.
fn values_equal(actual: Value, expected: Value) -> bool {
    match (actual, expected) {
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Kind(a), Value::Kind(b)) => a == b,
        (Value::Status(a), Value::Status(b)) => a == b,
        (a, b) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Numeric ordering across value variants; None for non-numeric operands.
fn numeric_order(actual: Value, expected: Value) -> Option<Ordering> {
    Some(actual.as_f64()?.total_cmp(&expected.as_f64()?))
}

/// Total order for sorting, with absent fields first.
fn order_values(a: Option<Value>, b: Option<Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Int(a)), Some(Value::Int(b))) => a.cmp(&b),
        (Some(a), Some(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            _ => Ordering::Equal,
        },
    }
}
