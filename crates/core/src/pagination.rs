//! Offset pagination shared by the patient and exam listings.

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_SIZE};
use crate::{RecordsError, RecordsResult};
use serde::Serialize;

/// A validated page request: `page >= 1` and `1 <= page_size <= max_page_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: u32, page_size: u32, max_page_size: u32) -> RecordsResult<Self> {
        if page == 0 {
            return Err(RecordsError::validation("page must be at least 1"));
        }
        if page_size == 0 || page_size > max_page_size {
            return Err(RecordsError::validation(format!(
                "pageSize must be between 1 and {max_page_size}"
            )));
        }
        Ok(Self { page, page_size })
    }

    /// Builds a request from optional query parameters, defaulting to page 1 of 10.
    pub fn from_query(
        page: Option<u32>,
        page_size: Option<u32>,
        max_page_size: u32,
    ) -> RecordsResult<Self> {
        Self::new(
            page.unwrap_or(DEFAULT_PAGE),
            page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            max_page_size,
        )
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub(crate) fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub(crate) fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the totals needed to render a pager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page,
            page_size: request.page_size,
            total_pages: total_pages(total, request.page_size),
        }
    }
}

/// `ceil(total / page_size)`; zero when there are no rows.
pub fn total_pages(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1)))
}

/// Converts a SQL `COUNT(*)` into an unsigned total.
pub(crate) fn count_to_total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}
