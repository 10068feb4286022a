//! Query compilation and paginated execution for the curio media catalog.
//!
//! This crate takes the ASTs produced by `curio-query` and runs them:
//!
//! - compiles expressions into backend-agnostic [`Predicate`] trees, gated
//!   by the viewer's [`visibility`](visibility_predicate) policy
//! - pages results with keyset (seek) cursors over any [`CatalogStore`],
//!   including a reproducible random order
//! - applies aspect-ratio filters client-side through a bounded
//!   fetch-and-filter loop, since no storage column holds a ratio
//!
//! # Example
//!
//! ```
//! use curio_engine::{
//!     CancellationToken, MemoryStore, SearchEngine, SearchRequest, Viewer,
//! };
//!
//! let store = MemoryStore::new();
//! let engine = SearchEngine::new(&store);
//! let response = engine
//!     .search(
//!         &SearchRequest::new("cat -nsfw sort:rating"),
//!         &Viewer::guest(),
//!         &CancellationToken::new(),
//!     )
//!     .unwrap();
//! assert!(!response.collection_mode);
//! ```

#![warn(missing_docs)]

mod cancel;
mod compile;
mod config;
mod cursor;
mod error;
mod memory;
mod paginate;
mod predicate;
mod record;
mod search;
mod store;
mod visibility;

pub use cancel::CancellationToken;
pub use compile::{CompiledQuery, QueryCompiler};
pub use config::EngineLimits;
pub use cursor::Cursor;
pub use error::{BadQueryReason, EngineError};
pub use memory::{MemoryStore, evaluate};
pub use paginate::Page;
pub use predicate::{CompareOp, FieldCmp, FieldKey, Predicate, TagMatch, Value};
pub use record::{CatalogRecord, ComicRecord, ItemStatus, MediaRecord, Tag};
pub use search::{DEFAULT_PAGE_SIZE, SearchEngine, SearchPage, SearchRequest, SearchResponse};
pub use store::{CatalogStore, Direction, FetchPlan, OrderBy, StoreError, TargetKind};
pub use visibility::{Role, Viewer, visibility_predicate};
