//! Catalog record shapes shared by the engine and its storage collaborator.

use curio_query::{MediaKind, normalize_tag};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::predicate::{FieldKey, Value};

/// Moderation status of a catalog item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Visible to everyone the visibility policy admits.
    Approved,
    /// Awaiting moderation; visible to the uploader and moderators.
    Pending,
    /// Removed from listings; visible to moderators only.
    Hidden,
}

/// A tag attached to an item, materialized from its tag links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Normalized tag name.
    pub name: String,
    /// Whether the tag itself is explicit-flagged.
    pub explicit: bool,
}

impl Tag {
    /// Creates a tag, normalizing the name the same way queries are.
    pub fn new(name: &str, explicit: bool) -> Self {
        Self {
            name: normalize_tag(name),
            explicit,
        }
    }
}

/// A single media item.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaRecord {
    /// Unique id.
    pub id: u64,
    /// Image or video.
    pub kind: MediaKind,
    /// Pixel width.
    pub width: u32,
    /// Pixel height.
    pub height: u32,
    /// Playback length in seconds; zero for images.
    pub duration: f64,
    /// File size in bytes.
    pub size: u64,
    /// Average rating.
    pub rating: f64,
    /// Number of ratings.
    pub rating_count: u32,
    /// Number of comments.
    pub comment_count: u32,
    /// Upload time.
    pub created_at: OffsetDateTime,
    /// Last modification time.
    pub updated_at: OffsetDateTime,
    /// Random-order key, assigned once at write time.
    pub shuffle_key: f64,
    /// Uploading user.
    pub uploader_id: u64,
    /// Explicit-content flag.
    pub explicit: bool,
    /// Moderation status.
    pub status: ItemStatus,
    /// Materialized tag links.
    pub tags: Vec<Tag>,
}

impl Default for MediaRecord {
    fn default() -> Self {
        Self {
            id: 0,
            kind: MediaKind::Image,
            width: 0,
            height: 0,
            duration: 0.0,
            size: 0,
            rating: 0.0,
            rating_count: 0,
            comment_count: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            shuffle_key: 0.0,
            uploader_id: 0,
            explicit: false,
            status: ItemStatus::Approved,
            tags: Vec::new(),
        }
    }
}

/// An ordered collection of media (a comic).
#[derive(Debug, Clone, PartialEq)]
pub struct ComicRecord {
    /// Unique id.
    pub id: u64,
    /// Display title.
    pub title: String,
    /// Number of pages.
    pub page_count: u32,
    /// Average rating.
    pub rating: f64,
    /// Number of ratings.
    pub rating_count: u32,
    /// Creation time.
    pub created_at: OffsetDateTime,
    /// Last modification time.
    pub updated_at: OffsetDateTime,
    /// Time the most recent page was added.
    pub last_page_at: OffsetDateTime,
    /// Random-order key, assigned once at write time.
    pub shuffle_key: f64,
    /// Uploading user.
    pub uploader_id: u64,
    /// Explicit-content flag.
    pub explicit: bool,
    /// Moderation status.
    pub status: ItemStatus,
    /// Materialized tag links.
    pub tags: Vec<Tag>,
}

impl Default for ComicRecord {
    fn default() -> Self {
        Self {
            id: 0,
            title: String::new(),
            page_count: 0,
            rating: 0.0,
            rating_count: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
            last_page_at: OffsetDateTime::UNIX_EPOCH,
            shuffle_key: 0.0,
            uploader_id: 0,
            explicit: false,
            status: ItemStatus::Approved,
            tags: Vec::new(),
        }
    }
}

/// Field and tag access the engine needs from both record kinds.
pub trait CatalogRecord {
    /// Unique item id.
    fn id(&self) -> u64;

    /// Looks up a storage-visible field, or None when this kind does not
    /// carry it. Comparisons against absent fields never match.
    fn field_value(&self, field: FieldKey) -> Option<Value>;

    /// Materialized tag links.
    fn tags(&self) -> &[Tag];

    /// Width/height ratio for post-fetch filtering; None when the kind has
    /// no dimensions or the height is zero.
    fn aspect_ratio(&self) -> Option<f64> {
        None
    }
}

impl CatalogRecord for MediaRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn field_value(&self, field: FieldKey) -> Option<Value> {
        match field {
            FieldKey::Id => Some(Value::Int(self.id as i64)),
            FieldKey::CreatedAt => Some(Value::Int(self.created_at.unix_timestamp())),
            FieldKey::UpdatedAt => Some(Value::Int(self.updated_at.unix_timestamp())),
            FieldKey::LastPageAt => None,
            FieldKey::Width => Some(Value::Int(i64::from(self.width))),
            FieldKey::Height => Some(Value::Int(i64::from(self.height))),
            FieldKey::Duration => Some(Value::Float(self.duration)),
            FieldKey::Size => Some(Value::Int(self.size as i64)),
            FieldKey::Rating => Some(Value::Float(self.rating)),
            FieldKey::RatingCount => Some(Value::Int(i64::from(self.rating_count))),
            FieldKey::CommentCount => Some(Value::Int(i64::from(self.comment_count))),
            FieldKey::ShuffleKey => Some(Value::Float(self.shuffle_key)),
            FieldKey::Kind => Some(Value::Kind(self.kind)),
            FieldKey::Explicit => Some(Value::Bool(self.explicit)),
            FieldKey::Status => Some(Value::Status(self.status)),
            FieldKey::UploaderId => Some(Value::Int(self.uploader_id as i64)),
        }
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }

    fn aspect_ratio(&self) -> Option<f64> {
        (self.height > 0).then(|| f64::from(self.width) / f64::from(self.height))
    }
}

impl CatalogRecord for ComicRecord {
    fn id(&self) -> u64 {
        self.id
    }

    fn field_value(&self, field: FieldKey) -> Option<Value> {
        match field {
            FieldKey::Id => Some(Value::Int(self.id as i64)),
            FieldKey::CreatedAt => Some(Value::Int(self.created_at.unix_timestamp())),
            FieldKey::UpdatedAt => Some(Value::Int(self.updated_at.unix_timestamp())),
            FieldKey::LastPageAt => Some(Value::Int(self.last_page_at.unix_timestamp())),
            FieldKey::Rating => Some(Value::Float(self.rating)),
            FieldKey::RatingCount => Some(Value::Int(i64::from(self.rating_count))),
            FieldKey::ShuffleKey => Some(Value::Float(self.shuffle_key)),
            FieldKey::Explicit => Some(Value::Bool(self.explicit)),
            FieldKey::Status => Some(Value::Status(self.status)),
            FieldKey::UploaderId => Some(Value::Int(self.uploader_id as i64)),
            FieldKey::Width
            | FieldKey::Height
            | FieldKey::Duration
            | FieldKey::Size
            | FieldKey::CommentCount
            | FieldKey::Kind => None,
        }
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}
