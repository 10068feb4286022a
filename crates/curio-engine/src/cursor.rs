//! Opaque pagination cursors.
//!
//! A cursor is a versioned resume point, serialized as JSON and wrapped in
//! URL-safe base64 so clients can round-trip it untouched. A cursor is only
//! honored when its version, target, and sort all match the current request;
//! anything else — including garbage — silently restarts pagination from the
//! beginning, so stale cursors can never misorder a walk.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use curio_query::SortMode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{predicate::Value, store::TargetKind};

/// Current cursor layout version. Bump when the shape changes; old cursors
/// then fall back to a fresh first page instead of being misread.
const CURSOR_VERSION: u8 = 1;

/// Decoded resume point for keyset pagination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    /// Layout version.
    pub version: u8,
    /// Record kind the cursor was minted for.
    pub target: TargetKind,
    /// Sort mode the cursor was minted for.
    pub sort: SortMode,
    /// Sort-key value of the last row handed out (or scanned).
    pub key: Value,
    /// Id of that row.
    pub last_id: u64,
    /// Random-walk starting point, pinned across pages of a random sort.
    pub random_start: Option<f64>,
}

impl Cursor {
    /// Creates a cursor at the current layout version.
    pub fn new(
        target: TargetKind,
        sort: SortMode,
        key: Value,
        last_id: u64,
        random_start: Option<f64>,
    ) -> Self {
        Self {
            version: CURSOR_VERSION,
            target,
            sort,
            key,
            last_id,
            random_start,
        }
    }

    /// Encodes the cursor into its opaque wire form.
    pub fn encode(&self) -> String {
        // Serializing this closed shape cannot fail; an empty string would
        // simply decode to a fresh first page.
        serde_json::to_vec(self)
            .map(|bytes| URL_SAFE_NO_PAD.encode(bytes))
            .unwrap_or_default()
    }

    /// Decodes a wire cursor for the given request shape.
    ///
    /// Returns None — restart from the beginning — on any decode failure or
    /// when the cursor was minted for a different version, target, or sort.
    pub fn decode(text: &str, target: TargetKind, sort: SortMode) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(text).ok()?;
        let cursor: Self = serde_json::from_slice(&bytes).ok()?;

        if cursor.version != CURSOR_VERSION || cursor.target != target || cursor.sort != sort {
            debug!(
                version = cursor.version,
                target = ?cursor.target,
                cursor_sort = cursor.sort.as_str(),
                request_sort = sort.as_str(),
                "ignoring cursor minted for a different request shape"
            );
            return None;
        }

        Some(cursor)
    }
}
