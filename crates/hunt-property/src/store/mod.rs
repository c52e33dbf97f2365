//! Persistence seam shared by every marketplace collection.
//!
//! Each collection is a [`Record`] type with its own filter and patch shapes. The
//! [`Repository`] trait is implemented twice: [`memory::MemoryStore`] evaluates filters in
//! process, [`mongo::MongoStore`] translates them into MongoDB query documents.

pub mod memory;
pub mod mongo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId, Document};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// A document stored in one named collection.
pub trait Record:
    Clone + Send + Sync + Unpin + Serialize + DeserializeOwned + 'static
{
    const COLLECTION: &'static str;
    /// Timestamp field listings are ordered by (descending).
    const SORT_FIELD: &'static str;

    type Filter: Default + Send + Sync;
    type Patch: Send + Sync + Serialize;

    fn id(&self) -> ObjectId;
    fn sort_key(&self) -> DateTime<Utc>;

    /// In-process evaluation of the filter.
    fn matches(&self, filter: &Self::Filter) -> bool;
    /// The same filter as a MongoDB query document.
    fn filter_document(filter: &Self::Filter) -> Document;

    fn apply(&mut self, patch: &Self::Patch);

    /// `$set` payload for the patch. Absent fields are skipped during serialization.
    fn patch_document(patch: &Self::Patch) -> Result<Document, StoreError> {
        Ok(bson::to_document(patch)?)
    }

    /// Values that must be unique across the collection, keyed by field name.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }
}

/// Offset/limit slice over a sorted listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Window {
    /// Largest offset the database driver accepts as a skip.
    pub const MAX_OFFSET: u64 = i64::MAX as u64;

    pub const fn new(offset: u64, limit: u64) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    pub const fn first(limit: u64) -> Self {
        Self::new(0, limit)
    }

    pub const fn unbounded() -> Self {
        Self {
            offset: 0,
            limit: None,
        }
    }
}

/// One-based page request, as exposed on the HTTP surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    pub const MAX_LIMIT: u64 = 100;

    pub fn new(page: u64, limit: u64) -> Result<Self, StoreError> {
        if page == 0 {
            return Err(StoreError::InvalidPage("page must be at least 1".to_string()));
        }
        if limit == 0 || limit > Self::MAX_LIMIT {
            return Err(StoreError::InvalidPage(format!(
                "limit must be between 1 and {}",
                Self::MAX_LIMIT
            )));
        }
        match (page - 1).checked_mul(limit) {
            Some(offset) if offset <= Window::MAX_OFFSET => Ok(Self { page, limit }),
            _ => Err(StoreError::InvalidPage("page is out of range".to_string())),
        }
    }

    pub fn window(&self) -> Window {
        let offset = self.page.saturating_sub(1).saturating_mul(self.limit);
        Window::new(offset.min(Window::MAX_OFFSET), self.limit)
    }
}

/// A page of results plus the metadata clients use to drive pagination controls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            total.div_ceil(request.limit)
        };

        Self {
            items,
            total,
            page: request.page,
            limit: request.limit,
            total_pages,
            has_next: request.page < total_pages,
            has_prev: request.page > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

/// Storage abstraction over one collection.
#[async_trait]
pub trait Repository<T: Record>: Send + Sync {
    /// Persist a new record and return the stored copy.
    async fn insert(&self, record: T) -> Result<T, StoreError>;
    async fn get(&self, id: ObjectId) -> Result<Option<T>, StoreError>;
    /// Matching records ordered by [`Record::SORT_FIELD`] descending, then id descending.
    async fn find(&self, filter: &T::Filter, window: Window) -> Result<Vec<T>, StoreError>;
    async fn count(&self, filter: &T::Filter) -> Result<u64, StoreError>;
    /// Apply the patch and return the updated record, or `None` when the id is unknown.
    async fn update(&self, id: ObjectId, patch: &T::Patch) -> Result<Option<T>, StoreError>;
    /// Apply the patch to every match, returning how many records changed.
    async fn update_many(&self, filter: &T::Filter, patch: &T::Patch) -> Result<u64, StoreError>;
    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError>;
    async fn delete_many(&self, filter: &T::Filter) -> Result<u64, StoreError>;

    async fn find_one(&self, filter: &T::Filter) -> Result<Option<T>, StoreError> {
        Ok(self.find(filter, Window::first(1)).await?.into_iter().next())
    }

    async fn exists(&self, id: ObjectId) -> Result<bool, StoreError> {
        Ok(self.get(id).await?.is_some())
    }

    async fn page(&self, filter: &T::Filter, request: PageRequest) -> Result<Page<T>, StoreError> {
        let total = self.count(filter).await?;
        let items = self.find(filter, request.window()).await?;
        Ok(Page::new(items, total, request))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate value for unique field '{field}'")]
    Duplicate { field: String },
    #[error("{0}")]
    InvalidPage(String),
    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("failed to encode document: {0}")]
    Encode(#[from] bson::ser::Error),
    #[error("failed to decode document: {0}")]
    Decode(#[from] bson::de::Error),
}

/// Case-insensitive "contains" used by the in-memory backend to mirror `$regex` matching.
pub(crate) fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Escapes user input before it is embedded into a `$regex` pattern.
pub(crate) fn escape_regex(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(
            ch,
            '\\' | '.' | '+' | '*' | '?' | '(' | ')' | '|' | '[' | ']' | '{' | '}' | '^' | '$'
        ) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

pub(crate) fn bson_datetime(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_chrono(value)
}

/// Serde adapter storing `Option<DateTime<Utc>>` as a BSON datetime (or null).
pub(crate) mod optional_datetime {
    use chrono::{DateTime, Utc};
    use mongodb::bson;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        value.map(bson::DateTime::from_chrono).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        Ok(Option::<bson::DateTime>::deserialize(deserializer)?.map(|value| value.to_chrono()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_metadata_rounds_total_pages_up() {
        let request = PageRequest::new(2, 3).expect("valid page");
        let page = Page::new(vec![4, 5, 6], 7, request);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_prev);
        assert_eq!(request.window(), Window::new(3, 3));
    }

    #[test]
    fn empty_listing_has_zero_pages() {
        let request = PageRequest::new(1, 10).expect("valid page");
        let page: Page<u8> = Page::new(Vec::new(), 0, request);
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next);
        assert!(!page.has_prev);
    }

    #[test]
    fn rejects_out_of_range_requests() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, 101).is_err());
    }

    #[test]
    fn huge_pages_are_rejected_instead_of_overflowing() {
        assert!(PageRequest::new(u64::MAX, 10).is_err());
        assert!(PageRequest::new(u64::MAX / 10 + 2, 10).is_err());
        let last = PageRequest::new(Window::MAX_OFFSET / 100 + 1, 100).expect("largest page");
        assert!(last.window().offset <= Window::MAX_OFFSET);
    }

    #[test]
    fn escapes_regex_metacharacters() {
        assert_eq!(escape_regex("Anna (North)"), "Anna \\(North\\)");
        assert_eq!(escape_regex("a.b*"), "a\\.b\\*");
    }
}
