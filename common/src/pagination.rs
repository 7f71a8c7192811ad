//! Page/limit normalization and list metadata.

use serde::{Deserialize, Serialize};

/// Largest page size served.
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Normalized pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page.
    pub page: u64,
    /// Page size, `1..=MAX_PAGE_LIMIT`.
    pub limit: u64,
}

impl Pagination {
    /// Normalize raw query values: page defaults to 1, a limit of 0 or at least
    /// [`MAX_PAGE_LIMIT`] becomes [`MAX_PAGE_LIMIT`].
    pub fn new(page: u64, limit: u64) -> Self {
        let page = page.max(1);
        let limit = if limit == 0 || limit >= MAX_PAGE_LIMIT {
            MAX_PAGE_LIMIT
        } else {
            limit
        };
        Self { page, limit }
    }

    /// Row offset of the first item of this page.
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.limit
    }

    /// Metadata for a result set of `total_item` rows.
    pub fn meta(&self, total_item: u64) -> ListMeta {
        ListMeta {
            limit: self.limit,
            page: self.page,
            total_item,
            total_page: total_item.div_ceil(self.limit),
        }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(1, MAX_PAGE_LIMIT)
    }
}

/// Pagination metadata attached to list responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ListMeta {
    pub limit: u64,
    pub page: u64,
    pub total_item: u64,
    pub total_page: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalization() {
        assert_eq!(Pagination::new(0, 0), Pagination { page: 1, limit: 100 });
        assert_eq!(Pagination::new(3, 100), Pagination { page: 3, limit: 100 });
        assert_eq!(Pagination::new(2, 150).limit, 100);
        assert_eq!(Pagination::new(2, 99).limit, 99);
    }

    #[test]
    fn test_meta_and_offset() {
        let p = Pagination::new(2, 10);
        assert_eq!(p.offset(), 10);

        let meta = p.meta(21);
        assert_eq!(meta.total_page, 3);
        assert_eq!(p.meta(20).total_page, 2);
        assert_eq!(p.meta(0).total_page, 0);
    }
}
