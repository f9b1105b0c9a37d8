use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    Json,
};
use uuid::Uuid;

use crate::{
    auth::password,
    error::{AppError, AppResult, OptionExt},
    export::{self, ExportFormat},
    extract::{AppJson, AppPath, AppQuery},
    middleware::AdminUser,
    models::user::{self, Role, User, UserInput},
    state::AppState,
    types::{ListQuery, Page},
};

pub async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppQuery(q): AppQuery<ListQuery>,
) -> AppResult<Json<Page<User>>> {
    let paging = q.paging(&state.config.pagination);
    let (items, total) = user::list(&state.db, paging, q.search_pattern()).await?;
    Ok(Json(Page::new(items, total, paging)))
}

pub async fn get_user(State(state): State<AppState>, _admin: AdminUser, AppPath(id): AppPath<Uuid>) -> AppResult<Json<User>> {
    Ok(Json(user::find(&state.db, id).await?.ok_or_not_found("User")?))
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppJson(input): AppJson<UserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    let input = input.validated(true)?;
    let plain = input.password.as_deref().unwrap_or_default();
    let hash = password::hash(plain, state.config.auth.bcrypt_cost).await?;
    let created = user::insert(&state.db, &input.name, &input.email, &hash, input.role.unwrap_or(Role::User)).await?;
    tracing::info!(user = %created.id, by = %admin.id, role = %created.role, "User created");
    Ok((StatusCode::CREATED, Json(created)))
}

/// A missing `role` keeps the stored one; a missing or empty `password` keeps the stored hash.
/// Admins cannot demote themselves, so at least one admin always remains.
pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(input): AppJson<UserInput>,
) -> AppResult<Json<User>> {
    let input = input.validated(false)?;
    let current = user::find(&state.db, id).await?.ok_or_not_found("User")?;
    let hash = match input.password.as_deref() {
        Some(p) => Some(password::hash(p, state.config.auth.bcrypt_cost).await?),
        None => None,
    };
    let role = input.role.unwrap_or(current.role);
    if id == admin.id && role != Role::Admin {
        return Err(AppError::BadRequest("Admins cannot remove their own admin role".to_string()));
    }
    let updated = user::update(&state.db, id, &input.name, &input.email, role, hash.as_deref())
        .await?
        .ok_or_not_found("User")?;
    tracing::info!(user = %id, by = %admin.id, "User updated");
    Ok(Json(updated))
}

pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    AppPath(id): AppPath<Uuid>,
) -> AppResult<StatusCode> {
    if id == admin.id {
        return Err(AppError::BadRequest("Admins cannot delete their own account".to_string()));
    }
    if !user::delete(&state.db, id).await? {
        return Err(AppError::NotFound("User not found".to_string()));
    }
    tracing::info!(user = %id, by = %admin.id, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn export_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    AppPath(format): AppPath<String>,
) -> AppResult<Response> {
    let format: ExportFormat = format.parse()?;
    let items = user::list_for_export(&state.db, state.config.export.max_rows).await?;
    export::respond(&state, format, "users", "Users", &items).await
}
