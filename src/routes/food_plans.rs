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
    inventory::completion::{self, RealVsPlanned},
    middleware::{AdminUser, AuthUser},
    models::food_plan::{self, FoodPlan, FoodPlanFilter, FoodPlanInput},
    models::{row_exists, Table},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_plans(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
    AppQuery(filter): AppQuery<FoodPlanFilter>,
) -> AppResult<Json<Page<FoodPlan>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = food_plan::list(&state.db, paging, q.search_pattern(), &filter).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_plan(State(state): State<AppState>, _user: AuthUser, AppPath(id): AppPath<Uuid>) -> AppResult<Json<FoodPlan>> {
    Ok(Json(food_plan::find(&state.db, id).await?.ok_or_not_found("Food plan")?))
}

pub async fn create_plan(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(input): AppJson<FoodPlanInput>,
) -> AppResult<(StatusCode, Json<FoodPlan>)> {
    let input = input.validated(&state.db, None).await?;
    let created = food_plan::insert(&state.db, &input).await?;
    tracing::info!(plan = %created.id, by = %admin.id, "Food plan created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<FoodPlanInput>,
) -> AppResult<Json<FoodPlan>> {
    if !row_exists(&state.db, Table::FoodPlans, id).await? {
        return Err(AppError::NotFound("Food plan not found".to_string()));
    }
    let input = input.validated(&state.db, Some(id)).await?;
    let updated = food_plan::update(&state.db, id, &input).await?.ok_or_not_found("Food plan")?;
    Ok(Json(updated))
}

pub async fn delete_plan(State(state): State<AppState>, _admin: AdminUser, AppPath(id): AppPath<Uuid>) -> AppResult<StatusCode> {
    if !food_plan::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Food plan not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_plans(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = food_plan::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "food_plans", "Food plans", &items).await
}

/// Planned against delivered quantities, per food.
pub async fn real_vs_planned(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<RealVsPlanned>> {
    let plan = food_plan::find(&state.db, id).await?.ok_or_not_found("Food plan")?;
    Ok(Json(completion::real_vs_planned(&state.db, &plan).await?))
}
