//! Query compiler.
//!
//! Walks a parsed AST and lowers it into a predicate tree the storage
//! collaborator can evaluate, plus the list of aspect-ratio filters that
//! must run client-side after fetch.
//!
//! Compilation is infallible: every rejectable input was already refused at
//! parse time, and a filter naming a field the current target does not
//! support lowers to "no constraint" rather than an error, so the same
//! parsed query can run in either mode.

use curio_query::{Comparison, Expr, Filter, NumericField, RATIO_EPSILON, Term};
use time::Date;

use crate::{
    predicate::{CompareOp, FieldKey, Predicate, TagMatch, Value},
    store::TargetKind,
    visibility::Viewer,
};

/// The output of compilation: a storage predicate plus post-fetch filters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Predicate for the storage layer; None means no constraint.
    pub predicate: Option<Predicate>,

    /// Aspect-ratio filters, in query order, ANDed together after fetch.
    /// Never pushed to the storage layer.
    pub ratio_filters: Vec<Comparison<f64>>,
}

impl CompiledQuery {
    /// Whether a fetched row's ratio passes every collected ratio filter.
    ///
    /// Rows without a ratio (no dimensions, zero height) fail any non-empty
    /// filter list.
    pub fn matches_ratio(&self, ratio: Option<f64>) -> bool {
        self.ratio_filters
            .iter()
            .all(|cmp| ratio.is_some_and(|value| ratio_matches(value, cmp)))
    }
}

/// Compiles query ASTs for one target kind and viewer.
pub struct QueryCompiler {
    /// Which record kind the predicate will run against.
    target: TargetKind,
    /// Whether explicit-flagged tags may match for this viewer.
    allow_explicit_tags: bool,
    /// Ratio filters collected during the walk.
    ratio_filters: Vec<Comparison<f64>>,
}

impl QueryCompiler {
    /// Creates a compiler for the given target and viewer.
    pub fn new(target: TargetKind, viewer: &Viewer) -> Self {
        Self {
            target,
            allow_explicit_tags: viewer.adult,
            ratio_filters: Vec::new(),
        }
    }

    /// Compiles an optional expression; `None` input means "match
    /// everything", which compiles to no constraint.
    pub fn compile(mut self, expr: Option<&Expr>) -> CompiledQuery {
        let predicate = expr.and_then(|expr| self.compile_expr(expr));
        CompiledQuery {
            predicate,
            ratio_filters: self.ratio_filters,
        }
    }

    /// Compiles one AST node.
    fn compile_expr(&mut self, expr: &Expr) -> Option<Predicate> {
        match expr {
            Expr::Term(term) => self.compile_term(term),
            Expr::Not(inner) => self
                .compile_expr(inner)
                .map(|predicate| Predicate::Not(Box::new(predicate))),
            Expr::And(items) => {
                let clauses: Vec<Predicate> = items
                    .iter()
                    .filter_map(|item| self.compile_expr(item))
                    .collect();
                Predicate::all(clauses)
            }
            Expr::Or(items) => {
                let clauses: Vec<Predicate> = items
                    .iter()
                    .filter_map(|item| self.compile_expr(item))
                    .collect();
                Predicate::any(clauses)
            }
        }
    }

    /// Compiles a single term.
    fn compile_term(&mut self, term: &Term) -> Option<Predicate> {
        match term {
            Term::Tag(name) => Some(Predicate::HasTag(TagMatch {
                name: name.clone(),
                allow_explicit: self.allow_explicit_tags,
            })),
            Term::Filter(filter) => self.compile_filter(filter),
        }
    }

    /// Compiles a typed filter through the per-target field map.
    fn compile_filter(&mut self, filter: &Filter) -> Option<Predicate> {
        match filter {
            Filter::Numeric { field, cmp } => {
                let key = self.numeric_key(*field)?;
                Some(numeric_predicate(key, *cmp))
            }
            Filter::Kind(kind) => match self.target {
                TargetKind::Media => Some(Predicate::cmp(
                    FieldKey::Kind,
                    CompareOp::Eq,
                    Value::Kind(*kind),
                )),
                TargetKind::Comic => None,
            },
            Filter::Uploaded(cmp) => Some(date_predicate(*cmp)),
            Filter::Ratio(cmp) => {
                // Collected for the post-fetch loop; nothing reaches the
                // storage layer. Comics have no dimensions, so the filter is
                // a no-op there like any other unsupported field.
                if self.target == TargetKind::Media {
                    self.ratio_filters.push(*cmp);
                }
                None
            }
        }
    }

    /// Maps a query field onto a storage column for the current target.
    ///
    /// The match is exhaustive over both dimensions so adding a field or a
    /// target forces a decision here.
    fn numeric_key(&self, field: NumericField) -> Option<FieldKey> {
        match (self.target, field) {
            (TargetKind::Media, NumericField::Width) => Some(FieldKey::Width),
            (TargetKind::Media, NumericField::Height) => Some(FieldKey::Height),
            (TargetKind::Media, NumericField::Duration) => Some(FieldKey::Duration),
            (TargetKind::Media, NumericField::Size) => Some(FieldKey::Size),
            (TargetKind::Media, NumericField::CommentCount) => Some(FieldKey::CommentCount),
            (_, NumericField::Rating) => Some(FieldKey::Rating),
            (_, NumericField::RatingCount) => Some(FieldKey::RatingCount),
            (
                TargetKind::Comic,
                NumericField::Width
                | NumericField::Height
                | NumericField::Duration
                | NumericField::Size
                | NumericField::CommentCount,
            ) => None,
        }
    }
}

/// Lowers a numeric comparison onto a storage column.
fn numeric_predicate(key: FieldKey, cmp: Comparison<f64>) -> Predicate {
    match cmp {
        Comparison::Eq(value) => Predicate::cmp(key, CompareOp::Eq, Value::Float(value)),
        Comparison::Gt(value) => Predicate::cmp(key, CompareOp::Gt, Value::Float(value)),
        Comparison::Gte(value) => Predicate::cmp(key, CompareOp::Gte, Value::Float(value)),
        Comparison::Lt(value) => Predicate::cmp(key, CompareOp::Lt, Value::Float(value)),
        Comparison::Lte(value) => Predicate::cmp(key, CompareOp::Lte, Value::Float(value)),
        Comparison::Range(low, high) => Predicate::And(vec![
            Predicate::cmp(key, CompareOp::Gte, Value::Float(low)),
            Predicate::cmp(key, CompareOp::Lte, Value::Float(high)),
        ]),
    }
}

/// Lowers a day-granular date comparison onto the upload timestamp.
///
/// A day spans `[start of day, start of next day)`, so equality and the
/// inclusive forms use the next day's start as an exclusive bound.
fn date_predicate(cmp: Comparison<Date>) -> Predicate {
    let key = FieldKey::CreatedAt;
    match cmp {
        Comparison::Eq(day) => Predicate::And(vec![
            Predicate::cmp(key, CompareOp::Gte, Value::Int(day_start(day))),
            Predicate::cmp(key, CompareOp::Lt, Value::Int(day_after(day))),
        ]),
        Comparison::Range(first, last) => Predicate::And(vec![
            Predicate::cmp(key, CompareOp::Gte, Value::Int(day_start(first))),
            Predicate::cmp(key, CompareOp::Lt, Value::Int(day_after(last))),
        ]),
        Comparison::Gt(day) => Predicate::cmp(key, CompareOp::Gte, Value::Int(day_after(day))),
        Comparison::Gte(day) => Predicate::cmp(key, CompareOp::Gte, Value::Int(day_start(day))),
        Comparison::Lt(day) => Predicate::cmp(key, CompareOp::Lt, Value::Int(day_start(day))),
        Comparison::Lte(day) => Predicate::cmp(key, CompareOp::Lt, Value::Int(day_after(day))),
    }
}

/// Unix timestamp of midnight UTC on `day`.
fn day_start(day: Date) -> i64 {
    day.midnight().assume_utc().unix_timestamp()
}

/// Unix timestamp of midnight UTC on the day after `day`; saturates at the
/// calendar's end.
fn day_after(day: Date) -> i64 {
    match day.next_day() {
        Some(next) => day_start(next),
        None => i64::MAX,
    }
}

/// Evaluates one ratio comparison, with tolerance on equality.
fn ratio_matches(ratio: f64, cmp: &Comparison<f64>) -> bool {
    match *cmp {
        Comparison::Eq(value) => (ratio - value).abs() <= RATIO_EPSILON,
        Comparison::Gt(value) => ratio > value,
        Comparison::Gte(value) => ratio >= value,
        Comparison::Lt(value) => ratio < value,
        Comparison::Lte(value) => ratio <= value,
        Comparison::Range(low, high) => ratio >= low && ratio <= high,
    }
}
