// src/query.rs
//! Validated aggregate query. The only constructors validate, so anything the
//! engine receives already satisfies `page >= 1` and `1 <= page_size <= 100`.

use serde::Deserialize;

use crate::cache::cache_key;
use crate::error::QueryError;
use crate::ingest::types::{Category, FetchParams};

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Immutable filter for one aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateQuery {
    category: Option<Category>,
    q: Option<String>,
    page: u32,
    page_size: u32,
}

/// Query-string shape accepted by the boundary; numbers stay raw so that
/// malformed input maps to our own client error.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

impl AggregateQuery {
    pub fn new(
        category: Option<Category>,
        q: Option<&str>,
        page: u32,
        page_size: u32,
    ) -> Result<Self, QueryError> {
        Self::with_max(category, q, page, page_size, MAX_PAGE_SIZE)
    }

    /// First page, default size, no filters.
    pub fn latest() -> Self {
        Self {
            category: None,
            q: None,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    fn with_max(
        category: Option<Category>,
        q: Option<&str>,
        page: u32,
        page_size: u32,
        max: u32,
    ) -> Result<Self, QueryError> {
        if page < 1 {
            return Err(QueryError::Page(page as i64));
        }
        let max = max.clamp(1, MAX_PAGE_SIZE);
        if page_size < 1 || page_size > max {
            return Err(QueryError::PageSize {
                got: page_size as i64,
                max,
            });
        }
        Ok(Self {
            category,
            q: q.and_then(normalize_q),
            page,
            page_size,
        })
    }

    /// Validate raw boundary input. Missing page -> 1, missing pageSize ->
    /// `default_page_size`, empty category/q -> absent.
    pub fn from_raw(
        raw: &RawQuery,
        default_page_size: u32,
        max_page_size: u32,
    ) -> Result<Self, QueryError> {
        let category = match raw.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(c) => Some(
                c.parse::<Category>()
                    .map_err(|_| QueryError::Category(c.to_string()))?,
            ),
        };

        let page = parse_num("page", raw.page.as_deref())?.unwrap_or(1);
        let page_size = parse_num("pageSize", raw.page_size.as_deref())?
            .unwrap_or(default_page_size as i64);

        if page < 1 {
            return Err(QueryError::Page(page));
        }
        let max = max_page_size.clamp(1, MAX_PAGE_SIZE);
        if page_size < 1 || page_size > max as i64 {
            return Err(QueryError::PageSize {
                got: page_size,
                max,
            });
        }
        let page = u32::try_from(page).map_err(|_| QueryError::Malformed {
            field: "page",
            raw: page.to_string(),
        })?;

        Self::with_max(category, raw.q.as_deref(), page, page_size as u32, max)
    }

    pub fn category(&self) -> Option<Category> {
        self.category
    }

    pub fn q(&self) -> Option<&str> {
        self.q.as_deref()
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Cache signature of this query shape.
    pub fn signature(&self) -> String {
        cache_key(self.category, self.q(), self.page, self.page_size)
    }

    pub fn fetch_params(&self) -> FetchParams {
        FetchParams {
            category: self.category,
            q: self.q.clone(),
            page: self.page,
            page_size: self.page_size,
        }
    }
}

/// Trim and collapse inner whitespace; blank queries are no query.
fn normalize_q(q: &str) -> Option<String> {
    let joined = q.split_whitespace().collect::<Vec<_>>().join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

fn parse_num(field: &'static str, raw: Option<&str>) -> Result<Option<i64>, QueryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse::<i64>().map(Some).map_err(|_| QueryError::Malformed {
            field,
            raw: s.to_string(),
        }),
    }
}
