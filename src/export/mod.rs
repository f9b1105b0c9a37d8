//! Excel and Word rendering of entity listings.
//!
//! Every exportable entity implements [`Tabular`]; handlers collect the rows,
//! build a [`Sheet`] and hand it to [`respond`], which renders on the blocking
//! pool and attaches the download headers.

use std::str::FromStr;

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

mod excel;
mod sheets;
mod word;

pub use sheets::Tabular;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Word,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Word => "docx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Word => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "word" | "docx" => Ok(ExportFormat::Word),
            _ => Err(AppError::BadRequest(format!("Unsupported export format '{}'. Use 'excel' or 'word'", s))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("excel rendering failed: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),
    #[error("word rendering failed: {0}")]
    Word(String),
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        AppError::Internal(err.into())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    /// Display form used where cells are not typed (Word tables).
    pub fn as_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => format_number(*n),
            Cell::Empty => String::new(),
        }
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<Option<String>> for Cell {
    fn from(s: Option<String>) -> Self {
        s.map(Cell::Text).unwrap_or(Cell::Empty)
    }
}

// 12.0 -> "12", 12.5 -> "12.5"
fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// A titled table ready to render.
#[derive(Debug, Clone)]
pub struct Sheet {
    pub title: String,
    pub headers: Vec<&'static str>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn from_items<T: Tabular>(title: &str, items: &[T]) -> Self {
        Self {
            title: title.to_string(),
            headers: T::headers().to_vec(),
            rows: items.iter().map(T::row).collect(),
        }
    }

    pub fn render(&self, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
        match format {
            ExportFormat::Excel => excel::render(self),
            ExportFormat::Word => word::render(self),
        }
    }
}

/// `<resource>_<YYYY-MM-DD>.<ext>`
pub fn file_name(resource: &str, format: ExportFormat) -> String {
    format!("{}_{}.{}", resource, chrono::Utc::now().format("%Y-%m-%d"), format.extension())
}

/// Renders `items` and wraps the document in a download response.
pub async fn respond<T: Tabular>(
    state: &AppState,
    format: ExportFormat,
    resource: &'static str,
    title: &str,
    items: &[T],
) -> AppResult<Response> {
    let sheet = Sheet::from_items(title, items);
    let rows = sheet.rows.len();
    let bytes = tokio::task::spawn_blocking(move || sheet.render(format)).await??;
    state.metrics.inc_exports();
    tracing::info!(resource, format = format.extension(), rows, "export generated");

    let mut response = bytes.into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(format.content_type()));
    let disposition = format!("attachment; filename=\"{}\"", file_name(resource, format));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}
