//! Shared fixtures: an in-memory database, the full router and signed-in callers.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::ServiceExt;

use crate::auth::password;
use crate::config::AppConfig;
use crate::models::user::{self, Role};
use crate::routes;
use crate::state::AppState;

pub fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.bcrypt_cost = 4;
    cfg.database.url = "sqlite::memory:".to_string();
    cfg
}

/// A single connection keeps the in-memory database alive for the whole test.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    crate::db::init_db(&pool).await.unwrap();
    pool
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub admin_token: String,
    pub user_token: String,
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(test_config()).await
}

pub async fn spawn_app_with(cfg: AppConfig) -> TestApp {
    spawn_app_on(test_pool().await, cfg).await
}

/// Builds the app on an existing, already initialized pool.
pub async fn spawn_app_on(pool: SqlitePool, cfg: AppConfig) -> TestApp {
    let state = AppState::new(pool, cfg);

    let hash = password::hash("secret-pass", 4).await.unwrap();
    let admin = user::insert(&state.db, "Admin", "admin@test.local", &hash, Role::Admin).await.unwrap();
    let member = user::insert(&state.db, "Member", "member@test.local", &hash, Role::User).await.unwrap();
    let admin_token = state.tokens.issue(admin.id, &admin.email, admin.role).unwrap();
    let user_token = state.tokens.issue(member.id, &member.email, member.role).unwrap();

    TestApp { app: routes::router(state.clone()), state, admin_token, user_token }
}

impl TestApp {
    pub async fn raw(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", t));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        self.app.clone().oneshot(builder.body(body).unwrap()).await.unwrap()
    }

    /// Sends a request and decodes the body as JSON (`Null` when empty).
    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.raw(method, uri, token, body).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn admin(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(&self.admin_token), body).await
    }

    pub async fn member(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(&self.user_token), body).await
    }

    /// Creates a row as admin and returns its id, failing the test on anything but `201`.
    pub async fn create(&self, uri: &str, body: Value) -> String {
        let (status, value) = self.admin(Method::POST, uri, Some(body)).await;
        assert_eq!(status, StatusCode::CREATED, "POST {} failed: {}", uri, value);
        value["id"].as_str().unwrap().to_string()
    }
}

/// Ids of a minimal catalog: one unit, two foods, one provider, two centers.
pub struct Catalog {
    pub unit: String,
    pub rice: String,
    pub beans: String,
    pub provider: String,
    pub center: String,
    pub other_center: String,
}

pub async fn seed_catalog(app: &TestApp) -> Catalog {
    let unit = app.create("/units", json!({"name": "Kilogram", "symbol": "kg"})).await;
    let rice = app.create("/foods", json!({"name": "Rice", "unitOfMeasurement": unit})).await;
    let beans = app.create("/foods", json!({"name": "Beans", "unitOfMeasurement": unit})).await;
    let provider = app.create("/providers", json!({"name": "Agro Supplies", "email": "sales@agro.test"})).await;
    let center = app
        .create("/medical-centers", json!({"name": "North Clinic", "address": "1 Main St", "phoneNumber": "555-0100"}))
        .await;
    let other_center = app
        .create("/medical-centers", json!({"name": "South Clinic", "address": "9 Side St", "email": "south@clinic.test"}))
        .await;
    Catalog { unit, rice, beans, provider, center, other_center }
}

/// A monthly plan for `center` with the given `(food, quantity)` items.
pub async fn create_plan<S: AsRef<str>>(app: &TestApp, catalog: &Catalog, center: &str, items: &[(S, f64)]) -> String {
    let planned: Vec<Value> = items
        .iter()
        .map(|(food, q)| json!({"food": food.as_ref(), "provider": catalog.provider, "quantity": q}))
        .collect();
    app.create(
        "/food-plans",
        json!({
            "name": "January",
            "medicalCenter": center,
            "type": "monthly",
            "startDate": "2024-01-01",
            "endDate": "2024-01-31",
            "plannedFoods": planned,
        }),
    )
    .await
}

pub fn entry_body<S: AsRef<str>>(catalog: &Catalog, center: &str, plan: &str, items: &[(S, f64)]) -> Value {
    let foods: Vec<Value> = items.iter().map(|(food, q)| json!({"food": food.as_ref(), "quantity": q})).collect();
    json!({
        "medicalCenter": center,
        "provider": catalog.provider,
        "foodPlan": plan,
        "entryDate": "2024-01-10",
        "enteredFoods": foods,
    })
}

/// Stock quantity for a pair, `None` when no row exists.
pub async fn stock_quantity(app: &TestApp, center: &str, food: &str) -> Option<f64> {
    sqlx::query_scalar("SELECT quantity FROM stocks WHERE medical_center_id = ?1 AND food_id = ?2")
        .bind(center)
        .bind(food)
        .fetch_optional(&app.state.db)
        .await
        .unwrap()
}
