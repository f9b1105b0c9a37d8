use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult, OptionExt},
    export::{self, ExportFormat},
    extract::{AppJson, AppPath, AppQuery},
    inventory::reconcile,
    middleware::{AdminUser, AuthUser},
    models::food_entry::{self, FoodEntry, FoodEntryFilter, FoodEntryInput},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_entries(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
    AppQuery(filter): AppQuery<FoodEntryFilter>,
) -> AppResult<Json<Page<FoodEntry>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = food_entry::list(&state.db, paging, &filter).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_entry(State(state): State<AppState>, _user: AuthUser, AppPath(id): AppPath<Uuid>) -> AppResult<Json<FoodEntry>> {
    Ok(Json(food_entry::find(&state.db, id).await?.ok_or_not_found("Food entry")?))
}

/// Records a delivery and credits the center's stock in the same transaction.
pub async fn create_entry(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(input): AppJson<FoodEntryInput>,
) -> AppResult<(StatusCode, Json<FoodEntry>)> {
    let input = input.validated(&state.db).await?;
    let change = reconcile::record_entry(&state.db, &input).await?;
    state.metrics.inc_entries_created();
    state.metrics.add_stock_adjustments(change.stock_adjustments as u64);
    tracing::info!(entry = %change.id, by = %admin.id, stock_adjustments = change.stock_adjustments, "Food entry recorded");
    let entry = food_entry::find(&state.db, change.id).await?.ok_or_not_found("Food entry")?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn update_entry(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<FoodEntryInput>,
) -> AppResult<Json<FoodEntry>> {
    let input = input.validated(&state.db).await?;
    let change = reconcile::revise_entry(&state.db, id, &input).await?.ok_or_not_found("Food entry")?;
    state.metrics.inc_entries_updated();
    state.metrics.add_stock_adjustments(change.stock_adjustments as u64);
    tracing::info!(entry = %id, by = %admin.id, stock_adjustments = change.stock_adjustments, "Food entry revised");
    let entry = food_entry::find(&state.db, id).await?.ok_or_not_found("Food entry")?;
    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    let Some(change) = reconcile::remove_entry(&state.db, id).await? else {
        return Err(AppError::NotFound("Food entry not found".to_string()));
    };
    state.metrics.inc_entries_deleted();
    state.metrics.add_stock_adjustments(change.stock_adjustments as u64);
    tracing::info!(entry = %id, by = %admin.id, stock_adjustments = change.stock_adjustments, "Food entry removed");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_entries(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = food_entry::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "food_entries", "Food entries", &items).await
}
