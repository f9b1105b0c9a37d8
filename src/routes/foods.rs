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
    models::food::{self, Food, FoodFilter, FoodInput},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_foods(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
    AppQuery(filter): AppQuery<FoodFilter>,
) -> AppResult<Json<Page<Food>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = food::list(&state.db, paging, q.search_pattern(), &filter).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_food(State(state): State<AppState>, _user: AuthUser, AppPath(id): AppPath<Uuid>) -> AppResult<Json<Food>> {
    Ok(Json(food::find(&state.db, id).await?.ok_or_not_found("Food")?))
}

pub async fn create_food(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(input): AppJson<FoodInput>,
) -> AppResult<(StatusCode, Json<Food>)> {
    let input = input.validated(&state.db).await?;
    let created = food::insert(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_food(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<FoodInput>,
) -> AppResult<Json<Food>> {
    let input = input.validated(&state.db).await?;
    let updated = food::update(&state.db, id, &input).await?.ok_or_not_found("Food")?;
    Ok(Json(updated))
}

pub async fn delete_food(State(state): State<AppState>, _admin: AdminUser, AppPath(id): AppPath<Uuid>) -> AppResult<StatusCode> {
    if !food::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Food not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_foods(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = food::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "foods", "Foods", &items).await
}
