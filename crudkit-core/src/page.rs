//! Offset pagination calculus and result envelopes.
//!
//! The functions here are pure — no I/O, no side effects — so the page/limit/
//! offset derivation and the `total_pages` arithmetic are unit-testable in
//! isolation from any backend.

use serde::{Deserialize, Serialize};

/// Page size applied when a request omits one.
pub const DEFAULT_PAGE_SIZE: u64 = 50;

/// A caller-supplied pagination request. Page numeration starts from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPagination {
    /// Page index to get.
    pub page: u64,
    /// Maximum number of items to return for the page.
    #[serde(rename = "pageSize")]
    pub page_size: u64,
}

/// Shorthand constructor for a pagination request.
pub fn offset_pagination(page: u64, page_size: u64) -> OffsetPagination {
    OffsetPagination { page, page_size }
}

/// Normalized limit/offset metadata derived from a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Normalizes a pagination request into page/limit/offset.
///
/// A missing request, a page below 1, or a page size of zero fall back to
/// `page = 1` / `limit = DEFAULT_PAGE_SIZE`; the offset is always
/// `(page - 1) * limit`.
pub fn calculate_limit(pagination: Option<OffsetPagination>) -> Page {
    let mut page = pagination.map(|p| p.page).unwrap_or(0);
    if page < 1 {
        page = 1;
    }
    let mut page_size = pagination.map(|p| p.page_size).unwrap_or(0);
    if page_size == 0 {
        page_size = DEFAULT_PAGE_SIZE;
    }
    Page {
        page,
        limit: page_size,
        offset: (page - 1) * page_size,
    }
}

/// Total pages for a total count at a page size: zero when either is zero,
/// otherwise `ceil(total / page_size)`.
pub fn calculate_total_pages(total: u64, page_size: u64) -> u64 {
    if total == 0 || page_size == 0 {
        0
    } else {
        total.div_ceil(page_size)
    }
}

/// A page of data together with its pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedSet<T> {
    pub data: Vec<T>,
    pub page: u64,
    #[serde(rename = "pageSize")]
    pub page_size: u64,
    pub total: u64,
    #[serde(rename = "totalPages")]
    pub total_pages: u64,
}

/// Wraps a page of data into a [`PaginatedSet`] envelope.
pub fn result_set<T>(data: Vec<T>, paginated: &Page, total: u64) -> PaginatedSet<T> {
    PaginatedSet {
        data,
        page: paginated.page,
        page_size: paginated.limit,
        total,
        total_pages: calculate_total_pages(total, paginated.limit),
    }
}

/// Applies limit/offset to an already-materialized vector.
pub fn limit_offset<T>(data: Vec<T>, paginated: &Page) -> Vec<T> {
    data.into_iter()
        .skip(paginated.offset as usize)
        .take(paginated.limit as usize)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_request_derives_offset() {
        let page = calculate_limit(Some(offset_pagination(3, 20)));
        assert_eq!(page, Page { page: 3, limit: 20, offset: 40 });
    }

    #[test]
    fn missing_request_normalizes_to_defaults() {
        let page = calculate_limit(None);
        assert_eq!(page, Page { page: 1, limit: 50, offset: 0 });
    }

    #[test]
    fn invalid_request_normalizes_to_defaults() {
        let page = calculate_limit(Some(offset_pagination(0, 0)));
        assert_eq!(page, Page { page: 1, limit: 50, offset: 0 });
    }

    #[test]
    fn total_pages_is_a_ceiling_division() {
        assert_eq!(calculate_total_pages(101, 50), 3);
        assert_eq!(calculate_total_pages(100, 50), 2);
        assert_eq!(calculate_total_pages(1, 50), 1);
    }

    #[test]
    fn total_pages_is_zero_iff_total_or_page_size_is_zero() {
        assert_eq!(calculate_total_pages(0, 50), 0);
        assert_eq!(calculate_total_pages(10, 0), 0);
        assert_eq!(calculate_total_pages(0, 0), 0);
    }

    #[test]
    fn result_set_carries_envelope_metadata() {
        let paginated = calculate_limit(Some(offset_pagination(1, 2)));
        let envelope = result_set(vec!["a", "b"], &paginated, 3);
        assert_eq!(envelope.page, 1);
        assert_eq!(envelope.page_size, 2);
        assert_eq!(envelope.total, 3);
        assert_eq!(envelope.total_pages, 2);
    }

    #[test]
    fn limit_offset_slices_a_vector() {
        let items: Vec<u64> = (1..=10).collect();
        let paginated = calculate_limit(Some(offset_pagination(2, 3)));
        assert_eq!(limit_offset(items, &paginated), vec![4, 5, 6]);
    }

    #[test]
    fn limit_offset_past_the_end_is_empty() {
        let items: Vec<u64> = (1..=3).collect();
        let paginated = calculate_limit(Some(offset_pagination(4, 3)));
        assert!(limit_offset(items, &paginated).is_empty());
    }
}
