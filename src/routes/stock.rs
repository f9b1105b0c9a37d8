use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, OptionExt},
    export::{self, ExportFormat},
    extract::{AppPath, AppQuery},
    inventory::{reconcile, StockDrift},
    middleware::{AdminUser, AuthUser},
    models::stock::{self, Stock, StockFilter},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
    AppQuery(filter): AppQuery<StockFilter>,
) -> AppResult<Json<Page<Stock>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = stock::list(&state.db, paging, q.search_pattern(), &filter).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_stock(State(state): State<AppState>, _user: AuthUser, AppPath(id): AppPath<Uuid>) -> AppResult<Json<Stock>> {
    Ok(Json(stock::find(&state.db, id).await?.ok_or_not_found("Stock")?))
}

pub async fn delete_stock(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if !stock::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Stock not found".to_string()));
    }
    tracing::warn!(stock = %id, by = %admin.id, "Stock row deleted manually");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = stock::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "stock", "Stock", &items).await
}

#[derive(Debug, Serialize)]
pub struct DriftReport {
    pub items: Vec<StockDrift>,
    pub total: usize,
}

impl From<Vec<StockDrift>> for DriftReport {
    fn from(items: Vec<StockDrift>) -> Self {
        Self { total: items.len(), items }
    }
}

/// Pairs whose stored stock disagrees with the entries.
pub async fn stock_drift(State(state): State<AppState>, _admin: AdminUser) -> AppResult<Json<DriftReport>> {
    let mut conn = state.db.acquire().await?;
    let drift = reconcile::detect_drift(&mut *conn).await?;
    Ok(Json(drift.into()))
}

/// Rewrites drifting stock rows from the entries; returns what was corrected.
pub async fn reconcile_stock(State(state): State<AppState>, AdminUser(admin): AdminUser) -> AppResult<Json<DriftReport>> {
    let corrected = reconcile::reconcile(&state.db).await?;
    tracing::info!(by = %admin.id, corrected = corrected.len(), "Stock reconciliation requested");
    Ok(Json(corrected.into()))
}
