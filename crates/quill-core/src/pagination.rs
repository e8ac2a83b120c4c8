//! Page requests and paginated results.

use serde::{Deserialize, Serialize};

/// Default number of posts per listing page.
pub const DEFAULT_PER_PAGE: u64 = 10;

/// A 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Largest row offset a request may produce; SQL `OFFSET` is a signed
    /// 64-bit value.
    pub const MAX_OFFSET: u64 = i64::MAX as u64;

    /// Returns `None` for page 0 and for pages whose offset exceeds
    /// [`Self::MAX_OFFSET`]. A `per_page` of 0 is raised to 1.
    pub fn new(page: u64, per_page: u64) -> Option<Self> {
        let per_page = per_page.max(1);
        let offset = page.checked_sub(1)?.checked_mul(per_page)?;
        if offset > Self::MAX_OFFSET {
            return None;
        }
        Some(Self { page, per_page })
    }

    pub fn first(per_page: u64) -> Self {
        Self {
            page: 1,
            per_page: per_page.max(1),
        }
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, request: PageRequest, total: u64) -> Self {
        Self {
            items,
            page: request.page,
            per_page: request.per_page,
            total,
        }
    }

    /// Number of pages; an empty listing still has one (empty) page.
    pub fn num_pages(&self) -> u64 {
        self.total.div_ceil(self.per_page).max(1)
    }

    /// Whether the requested page lies past the end of the listing.
    pub fn is_out_of_range(&self) -> bool {
        self.page > self.num_pages()
    }

    pub fn has_next(&self) -> bool {
        self.page < self.num_pages()
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
        }
    }
}
