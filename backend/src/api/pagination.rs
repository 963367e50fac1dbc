//! Page/per-page handling shared by list endpoints.

use serde::Serialize;
use utoipa::ToSchema;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

/// Resolved paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub per_page: u32,
}

impl PageParams {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn pagination(&self, total: i64) -> Pagination {
        let total_pages = ((total.max(0) as f64) / (self.per_page as f64)).ceil() as u32;
        Pagination {
            page: self.page,
            per_page: self.per_page,
            total,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: u32,
}
