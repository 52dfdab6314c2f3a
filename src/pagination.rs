use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// A 1-based page request with the page size clamped into `1..=MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn clamped(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page.unwrap_or(1).clamp(1, u32::MAX as i64) as u32;
        let limit = limit
            .unwrap_or(DEFAULT_LIMIT as i64)
            .clamp(1, MAX_LIMIT as i64) as u32;
        Self { page, limit }
    }

    pub fn first(limit: u32) -> Self {
        Self::clamped(Some(1), Some(limit as i64))
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
    pub current_page: u32,
    pub total_pages: i64,
    pub total_count: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub limit: u32,
}

impl PaginationInfo {
    pub fn new(request: PageRequest, total_count: i64) -> Self {
        let limit = request.limit as i64;
        let total_pages = (total_count + limit - 1) / limit;
        Self {
            current_page: request.page,
            total_pages,
            total_count,
            has_next_page: (request.page as i64) < total_pages,
            has_prev_page: request.page > 1,
            limit: request.limit,
        }
    }
}
