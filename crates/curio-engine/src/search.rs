//! Top-level search orchestration.
//!
//! Ties the pipeline together: parse the query, resolve collection mode from
//! the caller toggle and the query text, compile against the effective
//! target, AND in the visibility policy, and hand the result to the
//! pagination machinery. The whole pipeline is a pure function of the
//! request, the viewer, and the store's contents — no state survives a
//! request beyond the cursor the client carries.

use curio_query::{ParseResult, QueryError, SortMode, parse};
use tracing::debug;

use crate::{
    cancel::CancellationToken,
    compile::QueryCompiler,
    config::EngineLimits,
    cursor::Cursor,
    error::EngineError,
    paginate::{Page, PageContext, fetch_page, fetch_page_filtered, order_for},
    predicate::{CompareOp, FieldKey, Predicate, Value},
    record::{ComicRecord, MediaRecord},
    store::{CatalogStore, FetchPlan, TargetKind},
    visibility::{Viewer, visibility_predicate},
};

/// Page size used when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// A catalog search request, as received from the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// The free-text query string.
    pub query: String,

    /// Requested page size; clamped server-side to the engine limit.
    pub page_size: usize,

    /// Opaque cursor from a previous page, if any.
    pub cursor: Option<String>,

    /// Caller-side collection toggle (e.g. browsing the comics section).
    /// The query text can force collection mode on or off regardless.
    pub collections: bool,
}

impl SearchRequest {
    /// Creates a first-page request with the default page size.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            page_size: DEFAULT_PAGE_SIZE,
            cursor: None,
            collections: false,
        }
    }
}

/// The page of results for whichever target the query resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchPage {
    /// Individual media items.
    Media(Page<MediaRecord>),
    /// Comics.
    Comics(Page<ComicRecord>),
}

/// A search response plus the mode metadata the boundary reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    /// The result page.
    pub page: SearchPage,

    /// Whether the query ran in collection mode.
    pub collection_mode: bool,

    /// Whether the query text alone turned collection mode on.
    pub forced_by_query: bool,
}

/// Executes catalog searches against a storage collaborator.
pub struct SearchEngine<'store, S> {
    /// The storage collaborator.
    store: &'store S,
    /// Limits in force for every request.
    limits: EngineLimits,
}

impl<'store, S: CatalogStore> SearchEngine<'store, S> {
    /// Creates an engine with the default limits.
    pub fn new(store: &'store S) -> Self {
        Self::with_limits(store, EngineLimits::default())
    }

    /// Creates an engine with explicit limits.
    pub fn with_limits(store: &'store S, limits: EngineLimits) -> Self {
        Self { store, limits }
    }

    /// Runs one search request end to end.
    pub fn search(
        &self,
        request: &SearchRequest,
        viewer: &Viewer,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse, EngineError> {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }

        let parsed = parse(&request.query)?;
        let collection_mode = (request.collections && !parsed.collection_off) || parsed.collection_on;
        let forced_by_query = parsed.collection_on && !request.collections;

        debug!(
            query = %request.query,
            collection_mode,
            sort = parsed.sort.unwrap_or(SortMode::New).as_str(),
            "executing catalog search"
        );

        let page = if collection_mode {
            SearchPage::Comics(self.comic_page(&parsed, request, viewer)?)
        } else {
            SearchPage::Media(self.media_page(&parsed, request, viewer, cancel)?)
        };

        Ok(SearchResponse {
            page,
            collection_mode,
            forced_by_query,
        })
    }

    /// Runs the media pipeline for an already-parsed query.
    fn media_page(
        &self,
        parsed: &ParseResult,
        request: &SearchRequest,
        viewer: &Viewer,
        cancel: &CancellationToken,
    ) -> Result<Page<MediaRecord>, EngineError> {
        let sort = parsed.sort.unwrap_or(SortMode::New);
        if sort == SortMode::LastPage {
            // Only collections have a last-page time to sort by.
            return Err(QueryError::UnknownSort(sort.as_str().into()).into());
        }

        let compiled = QueryCompiler::new(TargetKind::Media, viewer).compile(parsed.expr.as_ref());
        if !compiled.ratio_filters.is_empty()
            && !matches!(sort, SortMode::New | SortMode::Old)
        {
            return Err(EngineError::RatioSortUnsupported(sort));
        }

        let ctx = self.page_context(
            TargetKind::Media,
            sort,
            compiled.predicate.clone(),
            viewer,
            request,
        );
        let fetch = |plan: &FetchPlan| self.store.fetch_media(plan);

        if compiled.ratio_filters.is_empty() {
            fetch_page(&fetch, &ctx)
        } else {
            fetch_page_filtered(&fetch, &ctx, &compiled, cancel)
        }
    }

    /// Runs the collection pipeline for an already-parsed query.
    fn comic_page(
        &self,
        parsed: &ParseResult,
        request: &SearchRequest,
        viewer: &Viewer,
    ) -> Result<Page<ComicRecord>, EngineError> {
        let sort = parsed.sort.unwrap_or(SortMode::New);
        let compiled = QueryCompiler::new(TargetKind::Comic, viewer).compile(parsed.expr.as_ref());

        let ctx = self.page_context(
            TargetKind::Comic,
            sort,
            compiled.predicate,
            viewer,
            request,
        );
        let fetch = |plan: &FetchPlan| self.store.fetch_comics(plan);
        fetch_page(&fetch, &ctx)
    }

    /// Resolves cursor, page size, random start, and the base predicate.
    fn page_context(
        &self,
        target: TargetKind,
        sort: SortMode,
        predicate: Option<Predicate>,
        viewer: &Viewer,
        request: &SearchRequest,
    ) -> PageContext<'_> {
        let page_size = request.page_size.clamp(1, self.limits.max_page_size.max(1));

        let cursor = request
            .cursor
            .as_deref()
            .and_then(|text| Cursor::decode(text, target, sort));
        let resume = cursor.as_ref().map(|cursor| (cursor.key, cursor.last_id));

        // The first page of a random walk rolls a fresh start; later pages
        // pin the one their cursor carries.
        let random_start = (sort == SortMode::Random).then(|| {
            cursor
                .as_ref()
                .and_then(|cursor| cursor.random_start)
                .unwrap_or_else(rand::random::<f64>)
        });

        let mut clauses = Vec::new();
        if let Some(visibility) = visibility_predicate(viewer) {
            clauses.push(visibility);
        }
        if let Some(predicate) = predicate {
            clauses.push(predicate);
        }
        if let Some(start) = random_start {
            clauses.push(Predicate::cmp(
                FieldKey::ShuffleKey,
                CompareOp::Gte,
                Value::Float(start),
            ));
        }

        PageContext {
            target,
            sort,
            order: order_for(sort),
            base: Predicate::all(clauses),
            page_size,
            resume,
            random_start,
            limits: &self.limits,
        }
    }
}
