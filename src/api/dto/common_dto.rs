//! Shared DTO types used across list endpoints.

use serde::Deserialize;
use utoipa::IntoParams;

use crate::persistence::Page;

/// Pagination query parameters for list endpoints.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
pub struct PaginationParams {
    /// Maximum rows to return (1..=1000). Defaults to 100.
    #[serde(default)]
    pub limit: Option<usize>,
    /// Rows to skip, newest first. Defaults to 0.
    #[serde(default)]
    pub offset: Option<usize>,
}

impl PaginationParams {
    /// Resolves defaults and clamps the limit.
    #[must_use]
    pub fn page(&self) -> Page {
        Page::new(self.limit, self.offset)
    }
}
