//! Offset-based paging for relational queries.

use serde::{Deserialize, Serialize};

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Hard upper bound on rows per page.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// A window over an ordered result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// Number of rows to skip.
    #[serde(default)]
    pub offset: u32,

    /// Maximum number of rows to return.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Creates a page request; the limit is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn new(offset: u32, limit: u32) -> Self {
        Self {
            offset,
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// The first page of the given size.
    pub fn first(limit: u32) -> Self {
        Self::new(0, limit)
    }

    /// The page following this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }

    /// The limit actually applied to a query.
    pub fn effective_limit(&self) -> u32 {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_default() {
        let page = PageRequest::default();
        assert_eq!(page.offset, 0);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_page_request_clamps() {
        assert_eq!(PageRequest::new(0, 0).limit, 1);
        assert_eq!(PageRequest::new(0, 50_000).limit, MAX_PAGE_SIZE);
    }

    #[test]
    fn test_next_page() {
        let page = PageRequest::first(10).next().next();
        assert_eq!(page.offset, 20);
        assert_eq!(page.limit, 10);
    }

    #[test]
    fn test_deserialize_defaults() {
        let page: PageRequest = serde_json::from_str(r#"{"offset": 40}"#).unwrap();
        assert_eq!(page.offset, 40);
        assert_eq!(page.limit, DEFAULT_PAGE_SIZE);
    }
}
