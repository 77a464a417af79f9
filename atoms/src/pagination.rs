use serde::{Deserialize, Serialize};

use crate::AppError;

pub const DEFAULT_PAGE_SIZE: u32 = 9;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One-based page selection over a sorted result set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn first_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: first_page(),
            limit: default_limit(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Result<Self, AppError> {
        let req = Self { page, limit };
        req.validate()?;
        Ok(req)
    }

    /// Builds a request from raw query-string values, falling back to defaults
    /// for absent parameters.
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Result<Self, AppError> {
        let page = match page {
            Some(p) => p
                .parse()
                .map_err(|_| AppError::validation(format!("page must be a positive integer, got {:?}", p)))?,
            None => first_page(),
        };
        let limit = match limit {
            Some(l) => l
                .parse()
                .map_err(|_| AppError::validation(format!("limit must be a positive integer, got {:?}", l)))?,
            None => default_limit(),
        };
        Self::new(page, limit)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.page == 0 {
            return Err(AppError::validation("page numbers start at 1"));
        }
        if self.limit == 0 || self.limit > MAX_PAGE_SIZE {
            return Err(AppError::validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.limit as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            page: self.page,
            total: self.total,
            total_pages: self.total_pages,
        }
    }
}

/// Slices an already sorted collection into the requested page.
pub fn paginate<T>(items: Vec<T>, req: PageRequest) -> Page<T> {
    let total = items.len() as u64;
    let limit = req.limit.max(1) as u64;
    let data = items
        .into_iter()
        .skip(req.offset())
        .take(req.limit as usize)
        .collect();

    Page {
        data,
        page: req.page,
        total,
        total_pages: total.div_ceil(limit),
    }
}
