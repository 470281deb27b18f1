use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::{IntoParams, ToSchema};

const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize, IntoParams, Clone, Default)]
pub struct PaginationQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl fmt::Display for PaginationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page:{}:limit:{}", self.page(), self.limit())
    }
}

impl PaginationQuery {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: Some(page),
            limit: Some(limit),
        }
    }

    pub fn page(&self) -> u32 {
        self.page.filter(|page| *page > 1).unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        match self.limit {
            Some(limit) if limit > 0 => limit.min(MAX_LIMIT),
            _ => DEFAULT_LIMIT,
        }
    }

    pub fn skip(&self) -> u64 {
        u64::from(self.page() - 1) * u64::from(self.limit())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct PaginationMeta {
    #[schema(example = 42)]
    pub total: u64,

    #[schema(example = 1)]
    pub page: u32,

    #[schema(example = 20)]
    pub limit: u32,

    #[schema(example = 3)]
    pub pages: u64,
}

impl PaginationMeta {
    pub fn new(total: u64, query: &PaginationQuery) -> Self {
        let limit = query.limit();
        PaginationMeta {
            total,
            page: query.page(),
            limit,
            pages: total.div_ceil(u64::from(limit)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PaginationMeta,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_first_page_of_twenty() {
        let query = PaginationQuery::default();
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 20);
        assert_eq!(query.skip(), 0);
    }

    #[test]
    fn zero_values_fall_back_and_limit_is_capped() {
        let query = PaginationQuery::new(0, 0);
        assert_eq!(query.page(), 1);
        assert_eq!(query.limit(), 20);

        let query = PaginationQuery::new(3, 500);
        assert_eq!(query.limit(), 100);
        assert_eq!(query.skip(), 200);
    }

    #[test]
    fn pages_round_up() {
        let query = PaginationQuery::new(1, 20);
        assert_eq!(PaginationMeta::new(41, &query).pages, 3);
        assert_eq!(PaginationMeta::new(40, &query).pages, 2);
        assert_eq!(PaginationMeta::new(0, &query).pages, 0);
    }
}
