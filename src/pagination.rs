use serde::{Deserialize, Serialize};

use crate::{
    config::PaginationConfig,
    error::{AppResult, FieldErrors},
};

/// `?page=&page_size=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Validated offset/limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self { page, page_size }
    }

    #[cfg(test)]
    pub fn first(page_size: i64) -> Self {
        Self::new(1, page_size)
    }

    pub fn resolve(params: PageParams, cfg: &PaginationConfig) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        let page = params.page.unwrap_or(1);
        if page < 1 {
            errors.add("page", "Invalid page.");
        }
        let page_size = params.page_size.unwrap_or(cfg.default_page_size);
        if page_size < 1 {
            errors.add("page_size", "Ensure this value is greater than or equal to 1.");
        }
        errors.into_result()?;
        let req = Self::new(page, page_size.min(cfg.max_page_size));
        if (req.page - 1).checked_mul(req.page_size).is_none() {
            let mut errors = FieldErrors::new();
            errors.add("page", "Invalid page.");
            errors.into_result()?;
        }
        Ok(req)
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub next: Option<i64>,
    pub previous: Option<i64>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(results: Vec<T>, count: i64, req: PageRequest) -> Self {
        let next = if req.offset().saturating_add(req.limit()) < count {
            req.page.checked_add(1)
        } else {
            None
        };
        let previous = (req.page > 1).then_some(req.page - 1);
        Self {
            count,
            next,
            previous,
            results,
        }
    }

    pub fn empty(req: PageRequest) -> Self {
        Self::new(Vec::new(), 0, req)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            count: self.count,
            next: self.next,
            previous: self.previous,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}
