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
    models::provider::{self, Provider, ProviderInput},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_providers(
    State(state): State<AppState>,
    _user: AuthUser,
    AppQuery(q): AppQuery<ListQuery>,
) -> AppResult<Json<Page<Provider>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = provider::list(&state.db, paging, q.search_pattern()).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_provider(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<Json<Provider>> {
    Ok(Json(provider::find(&state.db, id).await?.ok_or_not_found("Provider")?))
}

pub async fn create_provider(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppJson(input): AppJson<ProviderInput>,
) -> AppResult<(StatusCode, Json<Provider>)> {
    let input = input.validated()?;
    let created = provider::insert(&state.db, &input).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_provider(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<ProviderInput>,
) -> AppResult<Json<Provider>> {
    let input = input.validated()?;
    let updated = provider::update(&state.db, id, &input).await?.ok_or_not_found("Provider")?;
    Ok(Json(updated))
}

pub async fn delete_provider(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if !provider::delete(&state.db, id).await? {
        return Err(AppError::NotFound("Provider not found".to_string()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_providers(
    State(state): State<AppState>,
    _user: AuthUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = provider::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "providers", "Providers", &items).await
}
