use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::{
    auth::password,
    error::{AppError, AppResult, OptionExt},
    extract::AppJson,
    middleware::{ip::ClientIp, AuthUser},
    models::user::{self, LoginInput, RegisterInput, Role, User},
    state::{AppState, LOGIN_ENDPOINT},
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub user: User,
}

fn auth_response(state: &AppState, user: User) -> AppResult<AuthResponse> {
    let token = state.tokens.issue(user.id, &user.email, user.role)?;
    Ok(AuthResponse { token, token_type: "Bearer", expires_in: state.tokens.ttl_secs(), user })
}

/// Self-service sign-up. Always creates a `user` account.
pub async fn register(
    State(state): State<AppState>,
    AppJson(input): AppJson<RegisterInput>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let input = input.validated()?;
    let hash = password::hash(&input.password, state.config.auth.bcrypt_cost).await?;
    let user = user::insert(&state.db, &input.name, &input.email, &hash, Role::User).await?;
    tracing::info!(user = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

pub async fn login(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    AppJson(input): AppJson<LoginInput>,
) -> AppResult<Json<AuthResponse>> {
    state.rate_limiter.check_endpoint_limit(LOGIN_ENDPOINT, ip).await?;

    let found = user::find_credentials(&state.db, &input.email).await?;
    let verified = match &found {
        Some((_, hash)) => password::verify(&input.password, hash).await?,
        None => false,
    };
    state.metrics.record_login(verified);

    match found {
        Some((user, _)) if verified => {
            tracing::info!(user = %user.id, "Login succeeded");
            Ok(Json(auth_response(&state, user)?))
        }
        _ => {
            tracing::info!(%ip, "Login failed");
            Err(AppError::Unauthorized("Invalid email or password".to_string()))
        }
    }
}

pub async fn me(State(state): State<AppState>, caller: AuthUser) -> AppResult<Json<User>> {
    let user = user::find(&state.db, caller.id).await?.ok_or_not_found("User")?;
    Ok(Json(user))
}
