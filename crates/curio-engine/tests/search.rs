//! End-to-end tests for the parse → compile → paginate pipeline.

// Integration tests live outside cfg(test) by design
#![allow(clippy::tests_outside_test_module)]

use std::cell::Cell;

use curio_engine::{
    BadQueryReason, CancellationToken, CatalogStore, ComicRecord, EngineError, EngineLimits,
    FetchPlan, ItemStatus, MediaRecord, MemoryStore, Page, SearchEngine, SearchPage,
    SearchRequest, StoreError, Tag, Viewer,
};
use time::OffsetDateTime;

fn at(timestamp: i64) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(timestamp).unwrap()
}

fn media(id: u64, created: i64) -> MediaRecord {
    MediaRecord {
        id,
        width: 1000,
        height: 1000,
        created_at: at(created),
        updated_at: at(created),
        shuffle_key: (id * 37 % 100) as f64 / 100.0,
        tags: vec![Tag::new("cat", false)],
        ..MediaRecord::default()
    }
}

fn comic(id: u64, created: i64, last_page: i64) -> ComicRecord {
    ComicRecord {
        id,
        title: format!("comic {id}"),
        page_count: 10,
        created_at: at(created),
        updated_at: at(created),
        last_page_at: at(last_page),
        shuffle_key: (id * 37 % 100) as f64 / 100.0,
        tags: vec![Tag::new("cat", false)],
        ..ComicRecord::default()
    }
}

fn request(query: &str) -> SearchRequest {
    SearchRequest::new(query)
}

fn media_page(store: &MemoryStore, request: &SearchRequest, viewer: &Viewer) -> Page<MediaRecord> {
    let engine = SearchEngine::new(store);
    let response = engine
        .search(request, viewer, &CancellationToken::new())
        .unwrap();
    match response.page {
        SearchPage::Media(page) => page,
        SearchPage::Comics(_) => panic!("expected a media page"),
    }
}

fn media_ids(page: &Page<MediaRecord>) -> Vec<u64> {
    page.items.iter().map(|item| item.id).collect()
}

#[test]
fn ratio_filter_end_to_end() {
    // Five items, two of them 16:9.
    let dimensions: [(u32, u32); 5] =
        [(1920, 1080), (100, 100), (3840, 2160), (640, 480), (800, 600)];
    let mut store = MemoryStore::new();
    for (index, (width, height)) in dimensions.into_iter().enumerate() {
        let id = index as u64 + 1;
        store.add_media(MediaRecord {
            width,
            height,
            ..media(id, id as i64 * 100)
        });
    }

    let mut req = request("ratio:16/9");
    req.page_size = 10;
    let page = media_page(&store, &req, &Viewer::guest());

    // Items 3 and 1 are 16:9; descending creation order puts 3 first.
    assert_eq!(media_ids(&page), vec![3, 1]);
    assert_eq!(page.next_cursor, None);
}

#[test]
fn ratio_with_rating_sort_is_rejected() {
    let store = MemoryStore::new();
    let engine = SearchEngine::new(&store);
    let err = engine
        .search(
            &request("ratio:16/9 sort:rating"),
            &Viewer::guest(),
            &CancellationToken::new(),
        )
        .unwrap_err();

    assert!(matches!(err, EngineError::RatioSortUnsupported(_)));
    assert_eq!(
        err.bad_query_reason(),
        Some(BadQueryReason::UnsupportedCombination)
    );
}

#[test]
fn ratio_with_old_sort_is_accepted() {
    let mut store = MemoryStore::new();
    store.add_media(MediaRecord {
        width: 1920,
        height: 1080,
        ..media(1, 100)
    });
    store.add_media(MediaRecord {
        width: 100,
        height: 100,
        ..media(2, 200)
    });

    let page = media_page(&store, &request("ratio:16/9 sort:old"), &Viewer::guest());
    assert_eq!(media_ids(&page), vec![1]);
}

#[test]
fn keyset_pages_have_no_duplicates_or_gaps() {
    let mut store = MemoryStore::new();
    for id in 1..=25 {
        store.add_media(media(id, 1000 + id as i64));
    }

    let mut req = request("cat sort:new");
    req.page_size = 10;

    let mut seen: Vec<u64> = Vec::new();
    let mut previous_last: Option<MediaRecord> = None;
    let mut pages = 0;

    loop {
        let page = media_page(&store, &req, &Viewer::guest());
        pages += 1;

        if let (Some(last), Some(first)) = (&previous_last, page.items.first()) {
            // Strictly earlier, or equal with an id further along the
            // (descending) tie-break.
            let earlier = first.created_at < last.created_at
                || (first.created_at == last.created_at && first.id < last.id);
            assert!(earlier, "page boundary out of order");
        }

        seen.extend(media_ids(&page));
        previous_last = page.items.last().cloned();

        match page.next_cursor {
            Some(cursor) => req.cursor = Some(cursor),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    let expected: Vec<u64> = (1..=25).rev().collect();
    assert_eq!(seen, expected);
}

#[test]
fn equal_sort_keys_tiebreak_by_id_in_sort_direction() {
    let mut store = MemoryStore::new();
    for id in 1..=6 {
        store.add_media(media(id, 1000));
    }

    let mut req = request("sort:new");
    req.page_size = 4;
    let first = media_page(&store, &req, &Viewer::guest());
    assert_eq!(media_ids(&first), vec![6, 5, 4, 3]);

    req.cursor = first.next_cursor;
    let second = media_page(&store, &req, &Viewer::guest());
    assert_eq!(media_ids(&second), vec![2, 1]);
    assert_eq!(second.next_cursor, None);
}

#[test]
fn garbage_cursor_restarts_from_the_beginning() {
    let mut store = MemoryStore::new();
    for id in 1..=5 {
        store.add_media(media(id, 1000 + id as i64));
    }

    let mut req = request("sort:new");
    req.page_size = 3;
    let fresh = media_page(&store, &req, &Viewer::guest());

    req.cursor = Some("definitely-not-a-cursor".into());
    let restarted = media_page(&store, &req, &Viewer::guest());
    assert_eq!(media_ids(&restarted), media_ids(&fresh));
}

#[test]
fn random_walk_visits_each_item_at_most_once() {
    let mut store = MemoryStore::new();
    for id in 1..=20 {
        store.add_media(media(id, 1000 + id as i64));
    }

    let mut req = request("sort:random");
    req.page_size = 6;

    let mut visited: Vec<MediaRecord> = Vec::new();
    loop {
        let page = media_page(&store, &req, &Viewer::guest());
        visited.extend(page.items);
        match page.next_cursor {
            Some(cursor) => req.cursor = Some(cursor),
            None => break,
        }
    }

    let mut ids: Vec<u64> = visited.iter().map(|item| item.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), visited.len(), "an item was visited twice");

    // The walk is ordered by shuffle key and, having started at the rolled
    // floor, covers everything from its first key to the end of the domain
    // without wrapping.
    for pair in visited.windows(2) {
        assert!(pair[0].shuffle_key <= pair[1].shuffle_key);
    }
    let floor = visited.first().map_or(1.0, |item| item.shuffle_key);
    let expected = (1..=20)
        .filter(|id| (id * 37 % 100) as f64 / 100.0 >= floor)
        .count();
    assert_eq!(visited.len(), expected);
}

#[test]
fn page_size_is_clamped_server_side() {
    let mut store = MemoryStore::new();
    for id in 1..=30 {
        store.add_media(media(id, 1000 + id as i64));
    }

    let limits = EngineLimits {
        max_page_size: 5,
        ..EngineLimits::default()
    };
    let engine = SearchEngine::with_limits(&store, limits);

    let mut req = request("sort:new");
    req.page_size = 1000;
    let response = engine
        .search(&req, &Viewer::guest(), &CancellationToken::new())
        .unwrap();
    let SearchPage::Media(page) = response.page else {
        panic!("expected a media page");
    };

    assert_eq!(page.items.len(), 5);
    assert!(page.next_cursor.is_some());
}

/// Store wrapper that counts fetches and can cancel a token mid-request.
struct InstrumentedStore<'a> {
    inner: &'a MemoryStore,
    fetches: Cell<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl<'a> InstrumentedStore<'a> {
    fn new(inner: &'a MemoryStore) -> Self {
        Self {
            inner,
            fetches: Cell::new(0),
            cancel_after: None,
        }
    }
}

impl CatalogStore for InstrumentedStore<'_> {
    fn fetch_media(&self, plan: &FetchPlan) -> Result<Vec<MediaRecord>, StoreError> {
        let count = self.fetches.get() + 1;
        self.fetches.set(count);
        if let Some((after, token)) = &self.cancel_after {
            if count >= *after {
                token.cancel();
            }
        }
        self.inner.fetch_media(plan)
    }

    fn fetch_comics(&self, plan: &FetchPlan) -> Result<Vec<ComicRecord>, StoreError> {
        self.inner.fetch_comics(plan)
    }
}

#[test]
fn post_filter_loop_is_bounded_and_resumable() {
    // 40 items, every fourth one 16:9; tiny batches force the round cap.
    let mut store = MemoryStore::new();
    for id in 1..=40 {
        let (width, height) = if id % 4 == 0 { (1920, 1080) } else { (500, 500) };
        store.add_media(MediaRecord {
            width,
            height,
            ..media(id, 1000 + id as i64)
        });
    }

    let limits = EngineLimits {
        ratio_batch_factor: 1,
        ratio_batch_cap: 4,
        ratio_max_rounds: 2,
        ..EngineLimits::default()
    };

    let counting = InstrumentedStore::new(&store);
    let engine = SearchEngine::with_limits(&counting, limits.clone());

    let mut req = request("ratio:16/9 sort:new");
    req.page_size = 3;

    let mut collected: Vec<u64> = Vec::new();
    let mut requests_made = 0;
    loop {
        let response = engine
            .search(&req, &Viewer::guest(), &CancellationToken::new())
            .unwrap();
        requests_made += 1;
        let SearchPage::Media(page) = response.page else {
            panic!("expected a media page");
        };

        // The round cap bounds work per request even when matches are sparse.
        assert!(page.items.len() <= 3);
        collected.extend(media_ids(&page));

        match page.next_cursor {
            Some(cursor) => req.cursor = Some(cursor),
            None => break,
        }
    }

    let expected: Vec<u64> = (1..=40).rev().filter(|id| id % 4 == 0).collect();
    assert_eq!(collected, expected);

    // Never more than ratio_max_rounds fetches per request.
    assert!(counting.fetches.get() <= limits.ratio_max_rounds * requests_made);
}

#[test]
fn cancellation_is_checked_between_batches() {
    let mut store = MemoryStore::new();
    for id in 1..=40 {
        store.add_media(MediaRecord {
            width: 500,
            height: 500,
            ..media(id, 1000 + id as i64)
        });
    }

    let token = CancellationToken::new();
    let mut instrumented = InstrumentedStore::new(&store);
    instrumented.cancel_after = Some((1, token.clone()));

    let limits = EngineLimits {
        ratio_batch_factor: 1,
        ratio_batch_cap: 4,
        ratio_max_rounds: 8,
        ..EngineLimits::default()
    };
    let engine = SearchEngine::with_limits(&instrumented, limits);

    let mut req = request("ratio:16/9 sort:new");
    req.page_size = 3;
    let err = engine.search(&req, &Viewer::guest(), &token).unwrap_err();

    assert!(matches!(err, EngineError::Cancelled));
    // The first batch ran, the second was never issued.
    assert_eq!(instrumented.fetches.get(), 1);
}

#[test]
fn cancelled_request_fails_fast() {
    let store = MemoryStore::new();
    let engine = SearchEngine::new(&store);
    let token = CancellationToken::new();
    token.cancel();

    let err = engine
        .search(&request("cat"), &Viewer::guest(), &token)
        .unwrap_err();
    assert!(matches!(err, EngineError::Cancelled));
}

#[test]
fn collection_mode_from_query_text() {
    let mut store = MemoryStore::new();
    store.add_media(media(1, 100));
    store.add_comic(comic(10, 100, 500));
    store.add_comic(comic(11, 200, 400));

    let engine = SearchEngine::new(&store);
    let response = engine
        .search(&request("comic cat"), &Viewer::guest(), &CancellationToken::new())
        .unwrap();

    assert!(response.collection_mode);
    assert!(response.forced_by_query);
    let SearchPage::Comics(page) = response.page else {
        panic!("expected a comics page");
    };
    assert_eq!(page.items.len(), 2);
}

#[test]
fn collection_mode_from_caller_toggle() {
    let mut store = MemoryStore::new();
    store.add_comic(comic(10, 100, 500));

    let engine = SearchEngine::new(&store);
    let mut req = request("cat");
    req.collections = true;
    let response = engine
        .search(&req, &Viewer::guest(), &CancellationToken::new())
        .unwrap();

    assert!(response.collection_mode);
    assert!(!response.forced_by_query);
}

#[test]
fn negated_toggle_overrides_caller_toggle() {
    let mut store = MemoryStore::new();
    store.add_media(media(1, 100));
    store.add_comic(comic(10, 100, 500));

    let engine = SearchEngine::new(&store);
    let mut req = request("cat -comic");
    req.collections = true;
    let response = engine
        .search(&req, &Viewer::guest(), &CancellationToken::new())
        .unwrap();

    assert!(!response.collection_mode);
    assert!(matches!(response.page, SearchPage::Media(_)));
}

#[test]
fn comics_sort_by_last_page_added() {
    let mut store = MemoryStore::new();
    store.add_comic(comic(1, 100, 900));
    store.add_comic(comic(2, 200, 300));
    store.add_comic(comic(3, 300, 600));

    let engine = SearchEngine::new(&store);
    let response = engine
        .search(
            &request("comic sort:last_page"),
            &Viewer::guest(),
            &CancellationToken::new(),
        )
        .unwrap();
    let SearchPage::Comics(page) = response.page else {
        panic!("expected a comics page");
    };
    let ids: Vec<u64> = page.items.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![1, 3, 2]);
}

#[test]
fn last_page_sort_is_rejected_for_media() {
    let store = MemoryStore::new();
    let engine = SearchEngine::new(&store);
    let err = engine
        .search(
            &request("cat sort:last_page"),
            &Viewer::guest(),
            &CancellationToken::new(),
        )
        .unwrap_err();
    assert_eq!(err.bad_query_reason(), Some(BadQueryReason::UnknownSort));
}

#[test]
fn media_only_fields_are_noops_for_comics() {
    let mut store = MemoryStore::new();
    store.add_comic(comic(1, 100, 100));
    store.add_comic(comic(2, 200, 200));

    let engine = SearchEngine::new(&store);
    let response = engine
        .search(
            &request("comic width:>=100000"),
            &Viewer::guest(),
            &CancellationToken::new(),
        )
        .unwrap();
    let SearchPage::Comics(page) = response.page else {
        panic!("expected a comics page");
    };
    // width: is meaningless for comics and silently becomes no constraint.
    assert_eq!(page.items.len(), 2);
}

#[test]
fn rating_filters_apply_to_comics() {
    let mut store = MemoryStore::new();
    store.add_comic(ComicRecord {
        rating: 4.5,
        ..comic(1, 100, 100)
    });
    store.add_comic(ComicRecord {
        rating: 2.0,
        ..comic(2, 200, 200)
    });

    let engine = SearchEngine::new(&store);
    let response = engine
        .search(
            &request("comic rating:>=4"),
            &Viewer::guest(),
            &CancellationToken::new(),
        )
        .unwrap();
    let SearchPage::Comics(page) = response.page else {
        panic!("expected a comics page");
    };
    let ids: Vec<u64> = page.items.iter().map(|item| item.id).collect();
    assert_eq!(ids, vec![1]);
}

#[test]
fn uploaded_filter_is_day_granular() {
    let mut store = MemoryStore::new();
    // 2024-01-31 00:00 UTC and a minute before/after the day's bounds.
    let day_start = 1_706_659_200;
    store.add_media(media(1, day_start - 60));
    store.add_media(media(2, day_start));
    store.add_media(media(3, day_start + 86_399));
    store.add_media(media(4, day_start + 86_400));

    let page = media_page(&store, &request("uploaded:2024-01-31"), &Viewer::guest());
    assert_eq!(media_ids(&page), vec![3, 2]);
}

#[test]
fn visibility_restricts_results_before_the_query_does() {
    let mut store = MemoryStore::new();
    store.add_media(media(1, 100));
    store.add_media(MediaRecord {
        status: ItemStatus::Pending,
        uploader_id: 7,
        ..media(2, 200)
    });
    store.add_media(MediaRecord {
        status: ItemStatus::Hidden,
        ..media(3, 300)
    });
    store.add_media(MediaRecord {
        explicit: true,
        ..media(4, 400)
    });

    let everything = request("sort:old");

    let guest = media_page(&store, &everything, &Viewer::guest());
    assert_eq!(media_ids(&guest), vec![1]);

    let uploader = media_page(&store, &everything, &Viewer::member(7, false));
    assert_eq!(media_ids(&uploader), vec![1, 2]);

    let adult = media_page(&store, &everything, &Viewer::member(8, true));
    assert_eq!(media_ids(&adult), vec![1, 4]);

    let moderator = media_page(&store, &everything, &Viewer::moderator(9));
    assert_eq!(media_ids(&moderator), vec![1, 2, 3, 4]);
}

#[test]
fn explicit_tags_never_match_without_the_adult_gate() {
    let mut store = MemoryStore::new();
    // The item itself is safe-for-work; only the tag is explicit-flagged.
    store.add_media(MediaRecord {
        tags: vec![Tag::new("lewd_art", true)],
        ..media(1, 100)
    });

    let gated = media_page(&store, &request("lewd_art"), &Viewer::guest());
    assert!(gated.items.is_empty());

    let open = media_page(&store, &request("lewd_art"), &Viewer::member(1, true));
    assert_eq!(media_ids(&open), vec![1]);
}

#[test]
fn boolean_queries_compose_end_to_end() {
    let mut store = MemoryStore::new();
    store.add_media(MediaRecord {
        tags: vec![Tag::new("cat", false), Tag::new("dog", false)],
        ..media(1, 100)
    });
    store.add_media(MediaRecord {
        tags: vec![Tag::new("cat", false)],
        ..media(2, 200)
    });
    store.add_media(MediaRecord {
        tags: vec![Tag::new("cat", false), Tag::new("dog", false), Tag::new("nsfw", false)],
        ..media(3, 300)
    });

    let page = media_page(&store, &request("cat dog -nsfw"), &Viewer::guest());
    assert_eq!(media_ids(&page), vec![1]);

    let page = media_page(&store, &request("dog | nsfw"), &Viewer::guest());
    assert_eq!(media_ids(&page), vec![3, 1]);
}

#[test]
fn bad_queries_surface_reason_codes() {
    let store = MemoryStore::new();
    let engine = SearchEngine::new(&store);
    let viewer = Viewer::guest();
    let cancel = CancellationToken::new();

    let syntax = engine.search(&request("(cat"), &viewer, &cancel).unwrap_err();
    assert_eq!(syntax.bad_query_reason(), Some(BadQueryReason::Syntax));

    let sort = engine.search(&request("sort:upside"), &viewer, &cancel).unwrap_err();
    assert_eq!(sort.bad_query_reason(), Some(BadQueryReason::UnknownSort));

    let filter = engine.search(&request("width:wide"), &viewer, &cancel).unwrap_err();
    assert_eq!(filter.bad_query_reason(), Some(BadQueryReason::MalformedFilter));
}
