// src/routes/mod.rs

use axum::extract::{FromRequest, FromRequestParts};
use serde::Serialize;
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

pub mod bookings;
pub mod customers;
pub mod health;
pub mod hotel_amenities;
pub mod hotels;
pub mod master_rooms;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod slots;
pub mod sub_rooms;
pub mod support;
pub mod users;

/// `Json` whose rejection renders as the error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

// ───────────────────────────────────────
// Response envelope
// ───────────────────────────────────────
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<Value>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), message: None, pagination: None, filters: None, stats: None }
    }

    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    pub fn paginated(mut self, pagination: Pagination) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn filters(mut self, applied: Value) -> Self {
        self.filters = Some(serde_json::json!({ "applied": applied }));
        self
    }

    pub fn stats(mut self, stats: Value) -> Self {
        self.stats = Some(stats);
        self
    }
}

pub type Reply<T> = ApiResult<axum::Json<Envelope<T>>>;

// ───────────────────────────────────────
// Pagination
// ───────────────────────────────────────
pub const MAX_LIMIT: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
    pub has_more: bool,
}

/// Page request. Without a limit every row comes back on page 1.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: i64,
    pub limit: Option<i64>,
}

impl Page {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        match limit {
            Some(l) => {
                let limit = l.clamp(1, MAX_LIMIT);
                // keeps page * limit inside i64
                let page = page.unwrap_or(1).clamp(1, i64::MAX / limit);
                Self { page, limit: Some(limit) }
            }
            None => Self { page: 1, limit: None },
        }
    }

    pub fn offset(&self) -> i64 {
        self.limit.map(|l| (self.page - 1) * l).unwrap_or(0)
    }

    pub fn summarize(&self, total: i64) -> Pagination {
        match self.limit {
            Some(limit) => {
                let pages = (total + limit - 1) / limit;
                Pagination { total, page: self.page, limit, pages, has_more: self.page * limit < total }
            }
            None => Pagination {
                total,
                page: 1,
                limit: total,
                pages: if total > 0 { 1 } else { 0 },
                has_more: false,
            },
        }
    }
}

// ───────────────────────────────────────
// Identifiers
// ───────────────────────────────────────
pub fn parse_id(raw: &str, what: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::Validation(format!("Invalid {what} ID format")))
}

/// Comma-separated id list from a `delete/:ids` path.
pub fn parse_ids(raw: &str, what: &str) -> ApiResult<Vec<Uuid>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_id(s, what))
        .collect::<ApiResult<Vec<_>>>()?;
    if ids.is_empty() {
        return Err(ApiError::Validation(format!("No {what} IDs provided")));
    }
    Ok(ids)
}

/// Optional comma-separated id filter from a query string.
pub fn parse_id_filter(raw: Option<&str>, what: &str) -> ApiResult<Option<Vec<Uuid>>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_ids(s, what).map(Some),
    }
}

/// Trimmed, non-empty search term.
pub fn search_term(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Image storage is external; hard deletes hand the object keys over by folder and owner id.
pub fn release_media(folder: &str, owner: Uuid, images: &[String]) {
    if !images.is_empty() {
        info!(folder, owner = %owner, count = images.len(), "released stored media");
    }
}

pub fn require_text(value: &str, field: &str) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{field} is required")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginates_with_limit() {
        let p = Page::new(Some(2), Some(10));
        assert_eq!(p.offset(), 10);
        assert_eq!(
            p.summarize(25),
            Pagination { total: 25, page: 2, limit: 10, pages: 3, has_more: true }
        );
        assert!(!Page::new(Some(3), Some(10)).summarize(25).has_more);
    }

    #[test]
    fn no_limit_means_everything() {
        let p = Page::new(Some(4), None);
        assert_eq!(p.offset(), 0);
        assert_eq!(
            p.summarize(7),
            Pagination { total: 7, page: 1, limit: 7, pages: 1, has_more: false }
        );
        assert_eq!(p.summarize(0).pages, 0);
    }

    #[test]
    fn clamps_silly_values() {
        let p = Page::new(Some(-3), Some(100_000));
        assert_eq!(p.page, 1);
        assert_eq!(p.limit, Some(MAX_LIMIT));
        assert_eq!(Page::new(None, Some(0)).limit, Some(1));
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let p = Page::new(Some(i64::MAX), Some(MAX_LIMIT));
        assert!(p.offset() >= 0);
        let summary = p.summarize(10);
        assert!(!summary.has_more);
        assert_eq!(summary.pages, 1);

        let p = Page::new(Some(i64::MAX), Some(1));
        assert_eq!(p.offset(), i64::MAX - 1);
        assert!(!p.summarize(3).has_more);
    }

    #[test]
    fn parses_id_lists() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(parse_ids(&format!("{a}, {b},"), "hotel").unwrap(), vec![a, b]);
        assert_eq!(
            parse_ids("abc", "hotel").unwrap_err().to_string(),
            "Invalid hotel ID format"
        );
        assert_eq!(parse_ids(" , ", "hotel").unwrap_err().to_string(), "No hotel IDs provided");
        assert_eq!(parse_id_filter(Some(""), "hotel").unwrap(), None);
    }

    #[test]
    fn envelope_omits_empty_parts() {
        let v = serde_json::to_value(Envelope::ok(1).message("Created")).unwrap();
        assert_eq!(v, serde_json::json!({ "success": true, "data": 1, "message": "Created" }));

        let v = serde_json::to_value(Envelope::ok(Vec::<i32>::new()).paginated(Page::new(None, None).summarize(0)))
            .unwrap();
        assert_eq!(v["pagination"]["hasMore"], false);
    }
}
