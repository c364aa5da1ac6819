//! Normalization of inconsistent list envelopes into one `Page<T>` shape.
//!
//! # Overview
//! Admin list endpoints disagree on how they wrap results: a bare array,
//! `{ items, total, limit, offset }`, `{ rows }`, a domain-named array such
//! as `{ users, total }`, or a nested `pagination` block with
//! `total_count`/`current_page`/`per_page`/`total_pages`. `normalize_page`
//! resolves each field in a fixed priority order and never fails; missing
//! data falls back to the caller's request and then to the endpoint default.
//!
//! # Conventions
//! - Numeric fields accept JSON numbers and numeric strings. Anything else
//!   (null, negative, garbage) counts as absent.
//! - A limit of zero is treated as one when dividing.
//! - `total_pages` is never below 1: an empty result is one empty page. The
//!   floor applies to computed and server-supplied values alike.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::query::QueryParams;

/// Canonical paginated result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn empty(limit: u64) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            page: 1,
            limit,
            total_pages: 1,
        }
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        }
    }

    pub fn try_map<U, E>(self, f: impl FnMut(T) -> Result<U, E>) -> Result<Page<U>, E> {
        Ok(Page {
            items: self.items.into_iter().map(f).collect::<Result<Vec<_>, E>>()?,
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
        })
    }
}

impl Page<Value> {
    /// Deserialize every item into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Page<T>, ApiError> {
        self.try_map(|item| {
            serde_json::from_value(item).map_err(|e| ApiError::Deserialization(e.to_string()))
        })
    }
}

/// Per-endpoint normalization parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    /// Domain-named array key, e.g. `users` or `themes`.
    pub domain_key: Option<&'static str>,
    pub default_limit: u64,
}

impl PageSpec {
    pub const fn new(default_limit: u64) -> Self {
        Self {
            domain_key: None,
            default_limit,
        }
    }

    pub const fn keyed(domain_key: &'static str, default_limit: u64) -> Self {
        Self {
            domain_key: Some(domain_key),
            default_limit,
        }
    }
}

/// Which paging parameters an endpoint family understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageDialect {
    LimitOffset,
    LimitPage,
}

/// Paging parameters the caller asked for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub page: Option<u64>,
}

impl PageRequest {
    pub fn offset(limit: u64, offset: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: Some(offset),
            page: None,
        }
    }

    pub fn page(limit: u64, page: u64) -> Self {
        Self {
            limit: Some(limit),
            offset: None,
            page: Some(page),
        }
    }

    /// Append paging parameters in `dialect`, filling the limit from `spec`
    /// when the caller left it out.
    pub fn apply(&self, query: QueryParams, dialect: PageDialect, spec: &PageSpec) -> QueryParams {
        let limit = self.limit.unwrap_or(spec.default_limit);
        let query = query.push("limit", limit);
        match dialect {
            PageDialect::LimitOffset => {
                let offset = self
                    .offset
                    .or_else(|| self.page.map(|p| p.saturating_sub(1).saturating_mul(limit)))
                    .unwrap_or(0);
                query.push("offset", offset)
            }
            PageDialect::LimitPage => {
                let page = self
                    .page
                    .or_else(|| self.offset.map(|o| (o / limit.max(1)).saturating_add(1)))
                    .unwrap_or(1);
                query.push("page", page)
            }
        }
    }
}

/// Resolve a raw list envelope into a `Page`.
pub fn normalize_page(envelope: Value, spec: &PageSpec, request: &PageRequest) -> Page<Value> {
    let empty = Map::new();
    let (fields, pagination) = match &envelope {
        Value::Object(map) => (
            map,
            map.get("pagination").and_then(Value::as_object).unwrap_or(&empty),
        ),
        _ => (&empty, &empty),
    };

    let explicit_total = count(fields.get("total"))
        .or_else(|| count(pagination.get("total_count")))
        .or_else(|| count(pagination.get("total")));

    let limit = count(fields.get("limit"))
        .or_else(|| count(pagination.get("per_page")))
        .or(request.limit)
        .unwrap_or(spec.default_limit);
    let divisor = limit.max(1);

    let page = count(fields.get("page"))
        .or_else(|| count(pagination.get("current_page")))
        .or_else(|| count(fields.get("offset")).map(|o| (o / divisor).saturating_add(1)))
        .or(request.page)
        .or_else(|| request.offset.map(|o| (o / divisor).saturating_add(1)))
        .unwrap_or(1)
        .max(1);

    let explicit_pages = count(fields.get("totalPages"))
        .or_else(|| count(fields.get("total_pages")))
        .or_else(|| count(pagination.get("total_pages")));

    let items = take_items(envelope, spec.domain_key);
    let total = explicit_total.unwrap_or(items.len() as u64);
    let total_pages = explicit_pages
        .unwrap_or_else(|| total.div_ceil(divisor))
        .max(1);

    Page {
        items,
        total,
        page,
        limit,
        total_pages,
    }
}

/// Locate the item array: `items`, then `rows`, then the domain key, then
/// the envelope itself when it is an array.
fn take_items(envelope: Value, domain_key: Option<&str>) -> Vec<Value> {
    match envelope {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let keys = [Some("items"), Some("rows"), domain_key];
            for key in keys.into_iter().flatten() {
                if matches!(map.get(key), Some(Value::Array(_))) {
                    if let Some(Value::Array(items)) = map.remove(key) {
                        return items;
                    }
                }
            }
            Vec::new()
        }
        _ => Vec::new(),
    }
}

/// Read a loosely typed non-negative count.
pub(crate) fn count(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const USERS: PageSpec = PageSpec::keyed("users", 20);

    #[test]
    fn users_envelope_end_to_end() {
        let raw = json!({"users": [{"id": 1}, {"id": 2}], "total": 2, "limit": 20, "offset": 0});
        let page = normalize_page(raw, &USERS, &PageRequest::offset(20, 0));
        assert_eq!(
            page,
            Page {
                items: vec![json!({"id": 1}), json!({"id": 2})],
                total: 2,
                page: 1,
                limit: 20,
                total_pages: 1,
            }
        );
    }

    #[test]
    fn bare_array_uses_length_and_request_limit() {
        let raw = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
        let page = normalize_page(raw, &PageSpec::new(50), &PageRequest::offset(2, 0));
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.total, 3);
        assert_eq!(page.limit, 2);
        assert_eq!(page.total_pages, 2);
    }

    #[test]
    fn items_beat_rows_beat_domain_key() {
        let raw = json!({"rows": [1], "items": [2, 3], "users": [4, 5, 6]});
        assert_eq!(normalize_page(raw, &USERS, &PageRequest::default()).items, vec![json!(2), json!(3)]);

        let raw = json!({"rows": [1], "users": [4, 5, 6]});
        assert_eq!(normalize_page(raw, &USERS, &PageRequest::default()).items, vec![json!(1)]);

        let raw = json!({"items": null, "users": [4]});
        assert_eq!(normalize_page(raw, &USERS, &PageRequest::default()).items, vec![json!(4)]);
    }

    #[test]
    fn nested_pagination_block_is_honored() {
        let raw = json!({
            "themes": [{"id": 9}],
            "pagination": {"total_count": 41, "current_page": 3, "per_page": 10, "total_pages": 5}
        });
        let page = normalize_page(raw, &PageSpec::keyed("themes", 20), &PageRequest::default());
        assert_eq!(page.total, 41);
        assert_eq!(page.page, 3);
        assert_eq!(page.limit, 10);
        assert_eq!(page.total_pages, 5);
    }

    #[test]
    fn page_is_derived_from_offset() {
        let raw = json!({"items": [], "total": 100, "limit": 20, "offset": 40});
        let page = normalize_page(raw, &PageSpec::new(50), &PageRequest::default());
        assert_eq!(page.page, 3);
        assert_eq!(page.total_pages, 5);
    }

    #[test]
    fn request_offset_is_used_when_envelope_is_silent() {
        let raw = json!({"items": [1]});
        let page = normalize_page(raw, &PageSpec::new(50), &PageRequest::offset(10, 25));
        assert_eq!(page.page, 3);
        let page = normalize_page(json!([]), &PageSpec::new(50), &PageRequest::page(10, 4));
        assert_eq!(page.page, 4);
    }

    #[test]
    fn empty_envelope_is_one_empty_page() {
        let page = normalize_page(json!({}), &PageSpec::new(50), &PageRequest::default());
        assert_eq!(page, Page::empty(50));
    }

    #[test]
    fn non_container_envelope_is_empty() {
        let page = normalize_page(json!("oops"), &PageSpec::new(20), &PageRequest::default());
        assert!(page.items.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn zero_limit_does_not_divide_by_zero() {
        let raw = json!({"items": [1, 2], "limit": 0, "offset": 6});
        let page = normalize_page(raw, &PageSpec::new(20), &PageRequest::default());
        assert_eq!(page.limit, 0);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.page, 7);
    }

    #[test]
    fn numeric_strings_are_accepted_and_garbage_ignored() {
        let raw = json!({"items": [1], "total": "42", "limit": "abc"});
        let page = normalize_page(raw, &PageSpec::new(20), &PageRequest::default());
        assert_eq!(page.total, 42);
        assert_eq!(page.limit, 20);
        assert_eq!(page.total_pages, 3);
    }

    #[test]
    fn server_supplied_zero_total_pages_is_floored() {
        let raw = json!({"items": [], "total": 0, "totalPages": 0});
        let page = normalize_page(raw, &PageSpec::new(20), &PageRequest::default());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn total_pages_is_ceiling_of_total_over_limit() {
        for total in [0u64, 1, 19, 20, 21, 100] {
            for limit in [10u64, 20, 50] {
                let raw = json!({"items": [], "total": total, "limit": limit});
                let page = normalize_page(raw, &PageSpec::new(20), &PageRequest::default());
                let expected = total.div_ceil(limit).max(1);
                assert_eq!(page.total_pages, expected, "total={total} limit={limit}");
                if total == 0 {
                    assert!(page.items.is_empty());
                }
            }
        }
    }

    #[test]
    fn normalization_is_deterministic() {
        let raw = json!({"logs": [{"id": 1}], "total": 7, "limit": 5, "offset": 5});
        let spec = PageSpec::keyed("logs", 50);
        let a = normalize_page(raw.clone(), &spec, &PageRequest::default());
        let b = normalize_page(raw, &spec, &PageRequest::default());
        assert_eq!(a, b);
    }

    #[test]
    fn page_serializes_with_camel_case_total_pages() {
        let v = serde_json::to_value(Page::<Value>::empty(20)).unwrap();
        assert_eq!(v, json!({"items": [], "total": 0, "page": 1, "limit": 20, "totalPages": 1}));
    }

    #[test]
    fn decode_maps_items_to_typed_records() {
        #[derive(Deserialize, Debug, PartialEq)]
        struct Row {
            id: u32,
        }
        let page = normalize_page(json!([{"id": 1}]), &PageSpec::new(20), &PageRequest::default());
        let typed: Page<Row> = page.decode().unwrap();
        assert_eq!(typed.items, vec![Row { id: 1 }]);
    }

    #[test]
    fn request_applies_offset_dialect() {
        let q = PageRequest::page(20, 3).apply(QueryParams::new(), PageDialect::LimitOffset, &USERS);
        assert_eq!(q.encode(), "limit=20&offset=40");
    }

    #[test]
    fn request_applies_page_dialect_with_defaults() {
        let q = PageRequest::default().apply(QueryParams::new(), PageDialect::LimitPage, &USERS);
        assert_eq!(q.encode(), "limit=20&page=1");
        let q = PageRequest::offset(10, 30).apply(QueryParams::new(), PageDialect::LimitPage, &USERS);
        assert_eq!(q.encode(), "limit=10&page=4");
    }

    #[test]
    fn extreme_offsets_saturate_instead_of_overflowing() {
        let page = normalize_page(
            json!({"items": [], "limit": 1, "offset": u64::MAX}),
            &USERS,
            &PageRequest::default(),
        );
        assert_eq!(page.page, u64::MAX);
        assert_eq!(page.total_pages, 1);

        let page = normalize_page(
            json!({"items": [], "limit": 0, "offset": "1e300"}),
            &USERS,
            &PageRequest::default(),
        );
        assert_eq!(page.page, u64::MAX);

        let page = normalize_page(json!([]), &USERS, &PageRequest::offset(1, u64::MAX));
        assert_eq!(page.page, u64::MAX);
    }

    #[test]
    fn extreme_requests_saturate_in_both_dialects() {
        let q = PageRequest::page(u64::MAX, u64::MAX).apply(QueryParams::new(), PageDialect::LimitOffset, &USERS);
        assert_eq!(q.encode(), format!("limit={max}&offset={max}", max = u64::MAX));
        let q = PageRequest::offset(1, u64::MAX).apply(QueryParams::new(), PageDialect::LimitPage, &USERS);
        assert_eq!(q.encode(), format!("limit=1&page={}", u64::MAX));
    }
}
