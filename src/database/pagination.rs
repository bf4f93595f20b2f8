use serde::{Deserialize, Serialize};

use crate::{constants::MAX_PAGE_SIZE, error::ApiError};

/// 1-based page number plus page size, resolved from `?page=` and `?limit=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, limit: Option<i64>, default_size: i64) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        let page_size = match limit {
            Some(limit) if limit > 0 => limit.min(MAX_PAGE_SIZE),
            _ => default_size,
        };

        // the offset must fit an i64 for every accepted page
        if page < 1 || (page - 1).checked_mul(page_size).is_none() {
            return Err(ApiError::NotFound(String::from("Invalid page.")));
        }

        Ok(Self { page, page_size })
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

/// Builds `next` / `previous` links that keep every query parameter except `page`.
#[derive(Debug, Clone)]
pub struct PageLink {
    path: String,
    params: Vec<(String, String)>,
}

impl PageLink {
    pub fn new(path: &str, params: &[(String, String)]) -> Self {
        Self {
            path: path.to_string(),
            params: params
                .iter()
                .filter(|(key, _)| key != "page")
                .cloned()
                .collect(),
        }
    }

    pub fn to_page(&self, page: i64) -> String {
        let mut pairs: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(key),
                    urlencoding::encode(value)
                )
            })
            .collect();

        if page > 1 {
            pairs.push(format!("page={page}"));
        }

        if pairs.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, pairs.join("&"))
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct PageContext<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> PageContext<T> {
    pub fn from_rows(
        rows: Vec<T>,
        total_rows: i64,
        request: &PageRequest,
        link: &PageLink,
    ) -> Result<Self, ApiError> {
        if rows.is_empty() && request.page > 1 {
            return Err(ApiError::NotFound(String::from("Invalid page.")));
        }

        let shown = request.offset().saturating_add(rows.len() as i64);
        let next = (shown < total_rows).then(|| link.to_page(request.page.saturating_add(1)));
        let previous = (request.page > 1).then(|| link.to_page(request.page - 1));

        Ok(Self {
            count: total_rows,
            next,
            previous,
            results: rows,
        })
    }
}
