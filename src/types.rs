use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};

/// Common query parameters of every collection `GET`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub search: Option<String>,
}

/// Resolved paging window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: i64,
    pub limit: i64,
}

impl Paging {
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

impl ListQuery {
    /// Page defaults to 1, limit is clamped to `1..=max_limit`.
    pub fn paging(&self, cfg: &PaginationConfig) -> Paging {
        let page = self.page.unwrap_or(1).max(1);
        let limit = self.limit.unwrap_or(cfg.default_limit).clamp(1, cfg.max_limit);
        Paging { page, limit }
    }

    /// `%term%` for a case-insensitive LIKE, or `None` when no search was given.
    pub fn search_pattern(&self) -> Option<String> {
        like_pattern(self.search.as_deref())
    }
}

pub fn like_pattern(term: Option<&str>) -> Option<String> {
    let term = term.map(str::trim).filter(|t| !t.is_empty())?;
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    Some(format!("%{}%", escaped))
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, paging: Paging) -> Self {
        Self { items, total, page: paging.page, limit: paging.limit }
    }
}

/// A populated reference: the id of the related row plus its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefSummary {
    pub id: Uuid,
    pub name: String,
}

/// Parses an id column; ids are written by this crate so a bad value means corruption.
pub fn parse_id(raw: &str) -> AppResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| AppError::Internal(anyhow::anyhow!("corrupt id '{}' in database: {}", raw, e)))
}

/// UTC timestamp in the same format as the schema defaults.
pub fn now_utc() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
