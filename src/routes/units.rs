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
    middleware::{AdminUser, AuthUser},
    models::unit::{self, UnitInput, UnitOfMeasurement},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_units(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
) -> AppResult<Json<Page<UnitOfMeasurement>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = unit::list(&state.db, paging, q.search_pattern()).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_unit(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<UnitOfMeasurement>> {
    Ok(Json(unit::find(&state.db, id).await?.ok_or_not_found("Unit of measurement")?))
}

pub async fn create_unit(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(input): AppJson<UnitInput>,
) -> AppResult<(StatusCode, Json<UnitOfMeasurement>)> {
    let input = input.validated()?;
    let created = unit::insert(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_unit(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UnitInput>,
) -> AppResult<Json<UnitOfMeasurement>> {
    let input = input.validated()?;
    let updated = unit::update(&state.db, id, &input).await?.ok_or_not_found("Unit of measurement")?;
    Ok(Json(updated))
}

pub async fn delete_unit(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if !unit::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Unit of measurement not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_units(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = unit::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "units", "Units of measurement", &items).await
}
