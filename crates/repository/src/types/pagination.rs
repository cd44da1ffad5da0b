//! Pagination types for `find_all` results.
//!
//! Pagination is offset based and driven by a 1-based page number and a page
//! size. A non-positive page or page size disables pagination.

use serde::{Deserialize, Serialize};

/// A page request resolved against a total row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// Rows to skip.
    pub offset: u64,
    /// Maximum rows to return.
    pub limit: u64,
    /// Last page number, `ceil(count / page_size)`.
    pub last_page: i32,
    /// Next page number, wrapping to 1 after the last page.
    pub next_page: i32,
}

impl PageWindow {
    /// Returns true if `page_size` and `page` request a paginated read.
    pub fn is_enabled(page_size: i32, page: i32) -> bool {
        page_size > 0 && page > 0
    }

    /// Computes the window for `page` given the total number of matching rows.
    ///
    /// Callers must check [`PageWindow::is_enabled`] first.
    pub fn resolve(page_size: i32, page: i32, count: u64) -> Self {
        let size = u64::from(page_size.unsigned_abs());
        let last_page = count.div_ceil(size.max(1));
        let last_page = i32::try_from(last_page).unwrap_or(i32::MAX);
        let next_page = if page < last_page { page + 1 } else { 1 };

        Self {
            offset: u64::from(page.unsigned_abs().saturating_sub(1)) * size,
            limit: size,
            last_page,
            next_page,
        }
    }
}

/// A page of entities plus pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult<T> {
    /// The rows of this page.
    pub results: Vec<T>,

    /// The requested page.
    pub current_page: i32,

    /// The requested page size.
    pub page_size: i32,

    /// The last page number.
    pub last_page: i32,

    /// The page following the current one.
    pub next_page: i32,
}

impl<T> PaginatedResult<T> {
    /// Creates a paginated result.
    pub fn new(
        results: Vec<T>,
        current_page: i32,
        page_size: i32,
        last_page: i32,
        next_page: i32,
    ) -> Self {
        Self {
            results,
            current_page,
            page_size,
            last_page,
            next_page,
        }
    }

    /// Creates an unpaginated result: all rows, last and next page fixed at 1.
    pub fn unpaginated(results: Vec<T>, current_page: i32, page_size: i32) -> Self {
        Self::new(results, current_page, page_size, 1, 1)
    }

    /// Returns the number of rows in this page.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if the page holds no rows.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Maps the rows, keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            results: self.results.into_iter().map(f).collect(),
            current_page: self.current_page,
            page_size: self.page_size,
            last_page: self.last_page,
            next_page: self.next_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_enabled() {
        assert!(PageWindow::is_enabled(4, 1));
        assert!(!PageWindow::is_enabled(-1, -1));
        assert!(!PageWindow::is_enabled(0, 1));
        assert!(!PageWindow::is_enabled(4, 0));
    }

    #[test]
    fn test_window_first_page() {
        let window = PageWindow::resolve(4, 1, 10);
        assert_eq!(window.offset, 0);
        assert_eq!(window.limit, 4);
        assert_eq!(window.last_page, 3);
        assert_eq!(window.next_page, 2);
    }

    #[test]
    fn test_window_last_page_wraps() {
        let window = PageWindow::resolve(4, 3, 10);
        assert_eq!(window.offset, 8);
        assert_eq!(window.last_page, 3);
        assert_eq!(window.next_page, 1);
    }

    #[test]
    fn test_window_exact_multiple() {
        let window = PageWindow::resolve(5, 2, 10);
        assert_eq!(window.last_page, 2);
        assert_eq!(window.next_page, 1);
    }

    #[test]
    fn test_window_empty_table() {
        let window = PageWindow::resolve(4, 1, 0);
        assert_eq!(window.last_page, 0);
        assert_eq!(window.next_page, 1);
    }

    #[test]
    fn test_paginated_result_serialization() {
        let page = PaginatedResult::unpaginated(vec![1, 2], -1, -1);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["lastPage"], 1);
        assert_eq!(json["nextPage"], 1);
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
    }
}
