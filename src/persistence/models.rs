//! Stored record wrapper and paging types.

use serde::{Deserialize, Serialize};

/// A record with its store-assigned id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    /// Monotonic row id.
    pub id: u64,
    /// The record itself.
    #[serde(flatten)]
    pub record: T,
}

/// Offset/limit window for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of rows to return.
    pub limit: usize,
    /// Rows to skip from the newest.
    pub offset: usize,
}

impl Page {
    /// Largest accepted page size.
    pub const MAX_LIMIT: usize = 1000;

    /// Builds a page, applying defaults (100 / 0) and clamping the limit.
    #[must_use]
    pub fn new(limit: Option<usize>, offset: Option<usize>) -> Self {
        Self {
            limit: limit.unwrap_or(100).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, PartialEq)]
pub struct Paged<T> {
    /// Rows in this page.
    pub items: Vec<Stored<T>>,
    /// Total matching rows.
    pub total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults_and_clamps() {
        assert_eq!(Page::default(), Page { limit: 100, offset: 0 });
        assert_eq!(Page::new(Some(0), None).limit, 1);
        assert_eq!(Page::new(Some(50_000), Some(7)), Page { limit: 1000, offset: 7 });
    }
}
