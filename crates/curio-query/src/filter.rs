//! Atom classification: filters, sort directives, and tag normalization.
//!
//! A word token that survives operator handling is classified here into
//! either a typed filter term, a `sort:` directive, or a plain tag term.
//! Unknown `field:` prefixes intentionally fall through to the tag branch,
//! so `foo:bar` is the literal tag `foo:bar` rather than an error.

use serde::{Deserialize, Serialize};
use time::{Date, macros::format_description};

use crate::{
    ast::Term,
    error::QueryError,
};

/// Tolerance used when an aspect-ratio filter tests for equality.
pub const RATIO_EPSILON: f64 = 1e-6;

/// A sort order requested via a `sort:` directive.
///
/// `LastPage` only applies to collection queries; the execution engine
/// rejects it once the effective query target is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortMode {
    /// Newest upload first.
    New,
    /// Oldest upload first.
    Old,
    /// Most recently updated first.
    Updated,
    /// Highest average rating first.
    Rating,
    /// Most ratings first.
    RatingCount,
    /// Reproducible random order over per-item shuffle keys.
    Random,
    /// Most recent page addition first (collections only).
    LastPage,
}

impl SortMode {
    /// Parses a sort identifier, case-insensitively.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "new" => Some(Self::New),
            "old" => Some(Self::Old),
            "updated" => Some(Self::Updated),
            "rating" => Some(Self::Rating),
            "rating_count" => Some(Self::RatingCount),
            "random" => Some(Self::Random),
            "last_page" => Some(Self::LastPage),
            _ => None,
        }
    }

    /// The identifier accepted by `sort:`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Old => "old",
            Self::Updated => "updated",
            Self::Rating => "rating",
            Self::RatingCount => "rating_count",
            Self::Random => "random",
            Self::LastPage => "last_page",
        }
    }
}

/// The kind of a media item, matched by `type:` filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// A still image.
    Image,
    /// A video.
    Video,
}

impl MediaKind {
    /// Parses a `type:` filter value, case-insensitively.
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Numeric fields addressable from a query.
///
/// The full set applies to media items; collection queries support only
/// `Rating` and `RatingCount`. That asymmetry is enforced in the compiler's
/// field map, not here — the same parsed query can run in either mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    /// Pixel width.
    Width,
    /// Pixel height.
    Height,
    /// Playback length in seconds.
    Duration,
    /// File size in bytes.
    Size,
    /// Average rating.
    Rating,
    /// Number of ratings.
    RatingCount,
    /// Number of comments.
    CommentCount,
}

impl NumericField {
    /// Parses a field prefix against the whitelist.
    fn parse(name: &str) -> Option<Self> {
        match name {
            "width" => Some(Self::Width),
            "height" => Some(Self::Height),
            "duration" => Some(Self::Duration),
            "size" => Some(Self::Size),
            "rating" => Some(Self::Rating),
            "rating_count" => Some(Self::RatingCount),
            "comment_count" => Some(Self::CommentCount),
            _ => None,
        }
    }
}

/// A comparison against a single value or an inclusive range.
///
/// Ranges with `min > max` are accepted as written; they simply match
/// nothing downstream. Accepted behavior, not a bug.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Comparison<T> {
    /// Exactly equal (with [`RATIO_EPSILON`] tolerance for ratios).
    Eq(T),
    /// Strictly greater.
    Gt(T),
    /// Greater or equal.
    Gte(T),
    /// Strictly less.
    Lt(T),
    /// Less or equal.
    Lte(T),
    /// Inclusive range over both endpoints.
    Range(T, T),
}

/// A typed filter term.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// A comparison against a whitelisted numeric field.
    Numeric {
        /// The field being compared.
        field: NumericField,
        /// The comparison to apply.
        cmp: Comparison<f64>,
    },

    /// A `type:image` / `type:video` media-kind restriction.
    Kind(MediaKind),

    /// An upload-date restriction at day granularity.
    Uploaded(Comparison<Date>),

    /// An aspect-ratio restriction, evaluated after fetch rather than by the
    /// storage layer.
    Ratio(Comparison<f64>),
}

/// Normalizes a tag name: trimmed, lower-cased, internal whitespace
/// collapsed to single underscores. "Blue Sky" and "blue_sky" are the same
/// tag.
pub fn normalize_tag(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

/// A classified word token.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// A term that contributes to the expression tree.
    Term(Term),
    /// A `sort:` directive; contributes no term.
    Sort(SortMode),
}

/// Classifies a word token into a term or a directive.
pub fn classify(word: &str) -> Result<Atom, QueryError> {
    if let Some((prefix, spec)) = word.split_once(':') {
        match prefix.to_ascii_lowercase().as_str() {
            "sort" => {
                let mode = SortMode::parse(spec)
                    .ok_or_else(|| QueryError::UnknownSort(spec.to_string()))?;
                return Ok(Atom::Sort(mode));
            }
            "type" => {
                let kind = MediaKind::parse(spec)
                    .ok_or_else(|| QueryError::malformed(word, "expected image or video"))?;
                return Ok(Atom::Term(Term::Filter(Filter::Kind(kind))));
            }
            "uploaded" => {
                let cmp = parse_date_spec(spec)
                    .ok_or_else(|| QueryError::malformed(word, "expected a date like 2024-01-31"))?;
                return Ok(Atom::Term(Term::Filter(Filter::Uploaded(cmp))));
            }
            "ratio" => {
                let cmp = parse_ratio_spec(spec)
                    .ok_or_else(|| QueryError::malformed(word, "expected a ratio like 16/9"))?;
                return Ok(Atom::Term(Term::Filter(Filter::Ratio(cmp))));
            }
            other => {
                if let Some(field) = NumericField::parse(other) {
                    let cmp = parse_numeric_spec(spec)
                        .ok_or_else(|| QueryError::malformed(word, "expected a number"))?;
                    return Ok(Atom::Term(Term::Filter(Filter::Numeric { field, cmp })));
                }
                // Not a known filter prefix: fall through to the tag branch.
            }
        }
    }

    Ok(Atom::Term(Term::Tag(normalize_tag(word))))
}

/// Parses a finite number; `inf` and `NaN` are rejected.
fn parse_number(text: &str) -> Option<f64> {
    let value: f64 = text.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Parses the shared numeric spec grammar: `N`, `a..b`, `>N`, `>=N`, `<N`,
/// `<=N`.
fn parse_numeric_spec(spec: &str) -> Option<Comparison<f64>> {
    if let Some((low, high)) = spec.split_once("..") {
        return Some(Comparison::Range(parse_number(low)?, parse_number(high)?));
    }
    if let Some(rest) = spec.strip_prefix(">=") {
        return Some(Comparison::Gte(parse_number(rest)?));
    }
    if let Some(rest) = spec.strip_prefix("<=") {
        return Some(Comparison::Lte(parse_number(rest)?));
    }
    if let Some(rest) = spec.strip_prefix('>') {
        return Some(Comparison::Gt(parse_number(rest)?));
    }
    if let Some(rest) = spec.strip_prefix('<') {
        return Some(Comparison::Lt(parse_number(rest)?));
    }
    Some(Comparison::Eq(parse_number(spec)?))
}

/// Parses a `YYYY-MM-DD` calendar date.
fn parse_date(text: &str) -> Option<Date> {
    Date::parse(text, &format_description!("[year]-[month]-[day]")).ok()
}

/// Parses a date spec: `D`, `a..b` (inclusive both ends), `>D`, `>=D`, `<D`,
/// `<=D`.
fn parse_date_spec(spec: &str) -> Option<Comparison<Date>> {
    if let Some((low, high)) = spec.split_once("..") {
        return Some(Comparison::Range(parse_date(low)?, parse_date(high)?));
    }
    if let Some(rest) = spec.strip_prefix(">=") {
        return Some(Comparison::Gte(parse_date(rest)?));
    }
    if let Some(rest) = spec.strip_prefix("<=") {
        return Some(Comparison::Lte(parse_date(rest)?));
    }
    if let Some(rest) = spec.strip_prefix('>') {
        return Some(Comparison::Gt(parse_date(rest)?));
    }
    if let Some(rest) = spec.strip_prefix('<') {
        return Some(Comparison::Lt(parse_date(rest)?));
    }
    Some(Comparison::Eq(parse_date(spec)?))
}

/// Parses a ratio spec: `W/H` (exact), or the numeric spec grammar.
fn parse_ratio_spec(spec: &str) -> Option<Comparison<f64>> {
    if spec.contains('/') {
        let (width, height) = spec.split_once('/')?;
        let width = parse_number(width)?;
        let height = parse_number(height)?;
        if height == 0.0 {
            return None;
        }
        return Some(Comparison::Eq(width / height));
    }
    parse_numeric_spec(spec)
}
