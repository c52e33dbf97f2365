//! Extractors and response helpers shared by the handlers.

use axum::extract::FromRequest;
use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Response};
use mongodb::bson::oid::ObjectId;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::ApiError;
use crate::store::{Page, PageRequest, Window};

/// `axum::Json` whose rejections render as `{"error": ...}` with status 400.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Query-string counterpart of [`ApiJson`].
#[derive(Debug, Clone, Copy, Default, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Parses a 24-hex object id, answering `Invalid {label} ID` otherwise.
pub fn parse_id(raw: &str, label: &str) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(raw.trim()).map_err(|_| ApiError::bad_request(format!("Invalid {label} ID")))
}

pub fn parse_optional_id(raw: Option<&str>, label: &str) -> Result<Option<ObjectId>, ApiError> {
    raw.map(str::trim)
        .filter(|raw| !raw.is_empty())
        .map(|raw| parse_id(raw, label))
        .transpose()
}

pub const DEFAULT_SKIP_LIMIT: u64 = 10;

/// Offset listing used by the plain CRUD collections (`skip`, `limit` 1..=100).
pub fn skip_window(skip: Option<u64>, limit: Option<u64>) -> Result<Window, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_SKIP_LIMIT);
    if limit == 0 || limit > PageRequest::MAX_LIMIT {
        return Err(ApiError::bad_request(format!(
            "limit must be between 1 and {}",
            PageRequest::MAX_LIMIT
        )));
    }
    let skip = skip.unwrap_or(0);
    if skip > Window::MAX_OFFSET {
        return Err(ApiError::bad_request("skip is out of range"));
    }
    Ok(Window::new(skip, limit))
}

pub fn page_request(
    page: Option<u64>,
    limit: Option<u64>,
    default_limit: u64,
) -> Result<PageRequest, ApiError> {
    Ok(PageRequest::new(
        page.unwrap_or(1),
        limit.unwrap_or(default_limit),
    )?)
}

/// `{"success": true, "data": ...}` envelope used by the screen-oriented endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct Success<T> {
    pub success: bool,
    pub data: T,
}

pub fn success<T: Serialize>(data: T) -> ApiJson<Success<T>> {
    ApiJson(Success {
        success: true,
        data,
    })
}

/// A page whose items are emitted under a collection-specific key, next to
/// `total`, `page`, `limit`, `total_pages`, `has_next` and `has_prev`.
#[derive(Debug, Clone)]
pub struct KeyedPage<T> {
    key: &'static str,
    page: Page<T>,
}

impl<T> KeyedPage<T> {
    pub fn new(key: &'static str, page: Page<T>) -> Self {
        Self { key, page }
    }
}

impl<T: Serialize> Serialize for KeyedPage<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry(self.key, &self.page.items)?;
        map.serialize_entry("total", &self.page.total)?;
        map.serialize_entry("page", &self.page.page)?;
        map.serialize_entry("limit", &self.page.limit)?;
        map.serialize_entry("total_pages", &self.page.total_pages)?;
        map.serialize_entry("has_next", &self.page.has_next)?;
        map.serialize_entry("has_prev", &self.page.has_prev)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_name_the_entity() {
        let err = parse_id("abc", "property").expect_err("invalid");
        assert_eq!(err.to_string(), "Invalid property ID");
        assert_eq!(parse_optional_id(Some(" "), "user").expect("blank is absent"), None);
    }

    #[test]
    fn keyed_page_renames_items() {
        let request = PageRequest::new(1, 2).expect("valid");
        let body = serde_json::to_value(KeyedPage::new("orders", Page::new(vec![1, 2], 3, request)))
            .expect("serializes");
        assert_eq!(body["orders"], serde_json::json!([1, 2]));
        assert_eq!(body["total_pages"], 2);
        assert_eq!(body["has_next"], true);
        assert!(body.get("items").is_none());
    }

    #[test]
    fn skip_window_bounds_limit() {
        assert_eq!(skip_window(None, None).expect("defaults"), Window::new(0, 10));
        assert!(skip_window(Some(5), Some(0)).is_err());
        assert!(skip_window(Some(5), Some(101)).is_err());
        assert!(skip_window(Some(u64::MAX), None).is_err());
    }
}
