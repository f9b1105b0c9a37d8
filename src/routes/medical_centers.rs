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
    extract::{AppJson, AppPath, AppQuery},
    middleware::{AdminUser, AuthUser},
    models::medical_center::{self, MedicalCenter, MedicalCenterInput},
    models::stock::{self, Stock},
    state::AppState,
    types::{ListQuery, Page, RefSummary},
};

pub async fn list_centers(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
) -> AppResult<Json<Page<MedicalCenter>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = medical_center::list(&state.db, paging, q.search_pattern()).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_center(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<MedicalCenter>> {
    Ok(Json(medical_center::find(&state.db, id).await?.ok_or_not_found("Medical center")?))
}

pub async fn create_center(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(input): AppJson<MedicalCenterInput>,
) -> AppResult<(StatusCode, Json<MedicalCenter>)> {
    let input = input.validated()?;
    let created = medical_center::insert(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_center(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<MedicalCenterInput>,
) -> AppResult<Json<MedicalCenter>> {
    let input = input.validated()?;
    let updated = medical_center::update(&state.db, id, &input).await?.ok_or_not_found("Medical center")?;
    Ok(Json(updated))
}

pub async fn delete_center(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if !medical_center::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Medical center not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_centers(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = medical_center::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "medical_centers", "Medical centers", &items).await
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CenterStock {
    pub medical_center: RefSummary,
    pub items: Vec<Stock>,
}

/// Current stock of every food at one center.
pub async fn center_stock(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<CenterStock>> {
    let center = medical_center::find(&state.db, id).await?.ok_or_not_found("Medical center")?;
    let items = stock::list_for_center(&state.db, id).await?;
    Ok(Json(CenterStock { medical_center: RefSummary { id: center.id, name: center.name }, items }))
}
