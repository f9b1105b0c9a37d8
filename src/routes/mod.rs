//! HTTP route handlers for the medfood API.
//!
//! One sub-module per resource. Every resource follows the same pattern:
//!
//! - `GET /{resource}` paginated list, `POST /{resource}` create (admin)
//! - `GET /{resource}/{id}`, `PUT` (admin), `DELETE` (admin)
//! - `GET /{resource}/export/{excel|word}`
//!
//! Stock has no create/update; its rows follow food entries.
//! [`router`] assembles the routes with the middleware stack and is shared by
//! the binary and the API tests.

use axum::{
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

use crate::middleware::{
    rate_limit::rate_limit_middleware, security_headers::security_headers_middleware,
    validation::validate_request_middleware,
};
use crate::state::AppState;

pub mod auth;
pub mod food_entries;
pub mod food_plans;
pub mod foods;
pub mod health;
pub mod medical_centers;
pub mod providers;
pub mod stock;
pub mod units;
pub mod users;

pub fn router(state: AppState) -> Router {
    let cfg = state.config.clone();

    let mut app = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz))
        .route("/metrics", get(health::metrics))
        .route("/metrics/prometheus", get(health::metrics_prometheus))
        .route("/version", get(health::version))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/export/{format}", get(users::export_users))
        .route("/users/{id}", get(users::get_user).put(users::update_user).delete(users::delete_user))
        .route("/units", get(units::list_units).post(units::create_unit))
        .route("/units/export/{format}", get(units::export_units))
        .route("/units/{id}", get(units::get_unit).put(units::update_unit).delete(units::delete_unit))
        .route("/foods", get(foods::list_foods).post(foods::create_food))
        .route("/foods/export/{format}", get(foods::export_foods))
        .route("/foods/{id}", get(foods::get_food).put(foods::update_food).delete(foods::delete_food))
        .route("/providers", get(providers::list_providers).post(providers::create_provider))
        .route("/providers/export/{format}", get(providers::export_providers))
        .route(
            "/providers/{id}",
            get(providers::get_provider).put(providers::update_provider).delete(providers::delete_provider),
        )
        .route("/medical-centers", get(medical_centers::list_centers).post(medical_centers::create_center))
        .route("/medical-centers/export/{format}", get(medical_centers::export_centers))
        .route(
            "/medical-centers/{id}",
            get(medical_centers::get_center).put(medical_centers::update_center).delete(medical_centers::delete_center),
        )
        .route("/medical-centers/{id}/stock", get(medical_centers::center_stock))
        .route("/food-plans", get(food_plans::list_plans).post(food_plans::create_plan))
        .route("/food-plans/export/{format}", get(food_plans::export_plans))
        .route(
            "/food-plans/{id}",
            get(food_plans::get_plan).put(food_plans::update_plan).delete(food_plans::delete_plan),
        )
        .route("/food-plans/{id}/real-vs-planned", get(food_plans::real_vs_planned))
        .route("/food-entries", get(food_entries::list_entries).post(food_entries::create_entry))
        .route("/food-entries/export/{format}", get(food_entries::export_entries))
        .route(
            "/food-entries/{id}",
            get(food_entries::get_entry).put(food_entries::update_entry).delete(food_entries::delete_entry),
        )
        .route("/stock", get(stock::list_stock))
        .route("/stock/export/{format}", get(stock::export_stock))
        .route("/stock/drift", get(stock::stock_drift))
        .route("/stock/reconcile", post(stock::reconcile_stock))
        .route("/stock/{id}", get(stock::get_stock).delete(stock::delete_stock));

    // Optional pre-built UI with SPA fallback to index.html
    if let Some(dir) = cfg.server.ui_dir.as_deref() {
        let index = std::path::Path::new(dir).join("index.html");
        app = app.fallback_service(
            ServeDir::new(dir).append_index_html_on_directories(true).not_found_service(ServeFile::new(index)),
        );
    }

    app.with_state(state.clone())
        .layer(DefaultBodyLimit::max(cfg.server.max_body_bytes))
        .layer(from_fn_with_state(cfg.clone(), validate_request_middleware))
        .layer(from_fn_with_state(state, rate_limit_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn_with_state(cfg, security_headers_middleware))
}
