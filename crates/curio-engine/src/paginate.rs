//! Keyset pagination over the storage collaborator.
//!
//! Every sort mode maps to a primary ordering field plus the item id as
//! tie-breaker, both in the same direction, which keeps the seek predicate
//! monotonic: resuming strictly after the cursor's `(key, id)` pair can
//! neither skip nor repeat rows under a static dataset, and tolerates
//! concurrent writes far better than offsets.

use curio_query::SortMode;
use tracing::debug;

use crate::{
    cancel::CancellationToken,
    compile::CompiledQuery,
    config::EngineLimits,
    cursor::Cursor,
    error::EngineError,
    predicate::{CompareOp, FieldKey, Predicate, Value},
    record::CatalogRecord,
    store::{Direction, FetchPlan, OrderBy, StoreError, TargetKind},
};

/// One assembled result page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<R> {
    /// The page's rows, in sort order. Owned, so callers can fan out
    /// per-item post-processing (signing, DTO mapping) concurrently.
    pub items: Vec<R>,

    /// Opaque resume point, or None when the walk is exhausted.
    pub next_cursor: Option<String>,
}

/// Resolves the ordering key for a sort mode.
///
/// `LastPage` is validated against the target before this is reached.
pub fn order_for(sort: SortMode) -> OrderBy {
    let (field, direction) = match sort {
        SortMode::New => (FieldKey::CreatedAt, Direction::Desc),
        SortMode::Old => (FieldKey::CreatedAt, Direction::Asc),
        SortMode::Updated => (FieldKey::UpdatedAt, Direction::Desc),
        SortMode::Rating => (FieldKey::Rating, Direction::Desc),
        SortMode::RatingCount => (FieldKey::RatingCount, Direction::Desc),
        SortMode::Random => (FieldKey::ShuffleKey, Direction::Asc),
        SortMode::LastPage => (FieldKey::LastPageAt, Direction::Desc),
    };
    OrderBy { field, direction }
}

/// Everything one page fetch needs, resolved from the request.
pub struct PageContext<'limits> {
    /// Record kind being paged.
    pub target: TargetKind,
    /// Requested sort mode.
    pub sort: SortMode,
    /// Ordering derived from the sort mode.
    pub order: OrderBy,
    /// Visibility plus compiled query plus any random-walk floor.
    pub base: Option<Predicate>,
    /// Clamped page size.
    pub page_size: usize,
    /// Resume point from the decoded cursor.
    pub resume: Option<(Value, u64)>,
    /// Pinned random-walk start, present only under the random sort.
    pub random_start: Option<f64>,
    /// Engine limits in force.
    pub limits: &'limits EngineLimits,
}

impl PageContext<'_> {
    /// Builds the fetch plan for one batch, seeking past `seek` when set.
    fn plan(&self, limit: usize, seek: Option<(Value, u64)>) -> FetchPlan {
        let mut clauses = Vec::new();
        if let Some(base) = self.base.clone() {
            clauses.push(base);
        }
        if let Some((key, last_id)) = seek {
            clauses.push(seek_predicate(self.order, key, last_id));
        }
        FetchPlan {
            predicate: Predicate::all(clauses),
            order: self.order,
            limit,
        }
    }

    /// Mints the wire cursor resuming strictly after `(key, id)`.
    fn cursor_at(&self, key: Value, last_id: u64) -> String {
        Cursor::new(self.target, self.sort, key, last_id, self.random_start).encode()
    }

    /// Mints the wire cursor resuming strictly after `row`.
    fn cursor_after<R: CatalogRecord>(&self, row: &R) -> String {
        let key = row
            .field_value(self.order.field)
            .unwrap_or(Value::Int(0));
        self.cursor_at(key, row.id())
    }

    /// The sort-key/id pair of `row`, for advancing an in-flight scan.
    fn position_of<R: CatalogRecord>(&self, row: &R) -> (Value, u64) {
        let key = row
            .field_value(self.order.field)
            .unwrap_or(Value::Int(0));
        (key, row.id())
    }
}

/// Builds the seek predicate resuming strictly after `(key, last_id)`.
///
/// "Beyond" follows the sort direction for both the key and the id, so one
/// comparison shape serves every sort mode.
fn seek_predicate(order: OrderBy, key: Value, last_id: u64) -> Predicate {
    let beyond = match order.direction {
        Direction::Asc => CompareOp::Gt,
        Direction::Desc => CompareOp::Lt,
    };

    Predicate::Or(vec![
        Predicate::cmp(order.field, beyond, key),
        Predicate::And(vec![
            Predicate::cmp(order.field, CompareOp::Eq, key),
            Predicate::cmp(FieldKey::Id, beyond, Value::Int(last_id as i64)),
        ]),
    ])
}

/// Fetches one page with the plain `page_size + 1` probe.
///
/// The probe row is dropped from the page; its presence alone decides
/// whether a next cursor exists, and that cursor resumes after the last row
/// actually handed out, so the probe row opens the following page.
pub fn fetch_page<R, F>(fetch: &F, ctx: &PageContext<'_>) -> Result<Page<R>, EngineError>
where
    R: CatalogRecord,
    F: Fn(&FetchPlan) -> Result<Vec<R>, StoreError>,
{
    let mut rows = fetch(&ctx.plan(ctx.page_size + 1, ctx.resume))?;

    let has_more = rows.len() > ctx.page_size;
    if has_more {
        rows.truncate(ctx.page_size);
    }
    let next_cursor = if has_more {
        rows.last().map(|row| ctx.cursor_after(row))
    } else {
        None
    };

    Ok(Page {
        items: rows,
        next_cursor,
    })
}

/// Fetches one page through the bounded ratio post-filter loop.
///
/// Batches of `page_size * ratio_batch_factor` rows (capped) are fetched and
/// filtered client-side until the page plus its probe row is full, a short
/// batch signals exhaustion, or the round cap trips. The cap is the
/// load-shedding mechanism: tripping it returns a possibly-short page plus a
/// cursor that resumes the scan where it stopped.
pub fn fetch_page_filtered<R, F>(
    fetch: &F,
    ctx: &PageContext<'_>,
    compiled: &CompiledQuery,
    cancel: &CancellationToken,
) -> Result<Page<R>, EngineError>
where
    R: CatalogRecord,
    F: Fn(&FetchPlan) -> Result<Vec<R>, StoreError>,
{
    let batch_size = (ctx.page_size * ctx.limits.ratio_batch_factor.max(1))
        .clamp(ctx.page_size + 1, ctx.limits.ratio_batch_cap.max(ctx.page_size + 1));

    let mut seek = ctx.resume;
    let mut matched: Vec<R> = Vec::new();
    let mut exhausted = false;

    for round in 0..ctx.limits.ratio_max_rounds.max(1) {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let rows = fetch(&ctx.plan(batch_size, seek))?;
        let short = rows.len() < batch_size;
        if let Some(last) = rows.last() {
            seek = Some(ctx.position_of(last));
        }

        let before = matched.len();
        matched.extend(
            rows.into_iter()
                .filter(|row| compiled.matches_ratio(row.aspect_ratio())),
        );
        debug!(
            round,
            kept = matched.len() - before,
            total = matched.len(),
            "ratio post-filter round"
        );

        if short {
            exhausted = true;
            break;
        }
        if matched.len() > ctx.page_size {
            break;
        }
    }

    if matched.len() > ctx.page_size {
        matched.truncate(ctx.page_size);
        let next_cursor = matched.last().map(|row| ctx.cursor_after(row));
        return Ok(Page {
            items: matched,
            next_cursor,
        });
    }

    if exhausted {
        return Ok(Page {
            items: matched,
            next_cursor: None,
        });
    }

    // Round cap tripped mid-scan: resume from the last row examined, whether
    // or not it matched.
    let next_cursor = seek.map(|(key, last_id)| ctx.cursor_at(key, last_id));
    Ok(Page {
        items: matched,
        next_cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_modes_map_to_monotonic_orderings() {
        let new = order_for(SortMode::New);
        assert_eq!(new.field, FieldKey::CreatedAt);
        assert_eq!(new.direction, Direction::Desc);

        let old = order_for(SortMode::Old);
        assert_eq!(old.field, FieldKey::CreatedAt);
        assert_eq!(old.direction, Direction::Asc);

        let random = order_for(SortMode::Random);
        assert_eq!(random.field, FieldKey::ShuffleKey);
        assert_eq!(random.direction, Direction::Asc);
    }

    #[test]
    fn seek_predicate_shape() {
        let order = OrderBy {
            field: FieldKey::CreatedAt,
            direction: Direction::Desc,
        };
        let seek = seek_predicate(order, Value::Int(500), 42);

        let Predicate::Or(branches) = seek else {
            panic!("expected a two-branch disjunction");
        };
        assert_eq!(
            branches[0],
            Predicate::cmp(FieldKey::CreatedAt, CompareOp::Lt, Value::Int(500))
        );
        assert_eq!(
            branches[1],
            Predicate::And(vec![
                Predicate::cmp(FieldKey::CreatedAt, CompareOp::Eq, Value::Int(500)),
                Predicate::cmp(FieldKey::Id, CompareOp::Lt, Value::Int(42)),
            ])
        );
    }
}
