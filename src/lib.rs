//! # medfood Backend Library
//!
//! Food inventory management for medical centers: foods and their units,
//! providers, medical centers, food plans (budgeted quantities per period),
//! food entries (actual deliveries) and the stock levels derived from them.
//!
//! ## Architecture
//!
//! - **Axum**: HTTP server, routing and extractors
//! - **SQLx**: SQLite persistence, one transaction per stock-affecting request
//! - **Tokio**: async runtime; bcrypt and document rendering run on the blocking pool
//! - **Serde**: camelCase JSON for every payload
//!
//! ## Core Components
//!
//! - [`config`]: layered configuration (embedded defaults, files, environment)
//! - [`db`]: schema creation and admin bootstrap
//! - [`error`]: the [`error::AppError`] type and its HTTP mapping
//! - [`auth`]: JWT tokens and password hashing
//! - [`models`]: entity types, payload validation and queries
//! - [`inventory`]: stock reconciliation and plan completion reporting
//! - [`export`]: Excel and Word rendering
//! - [`middleware`]: authentication extractors, rate limiting, request validation, security headers
//! - [`routes`]: HTTP handlers and the router
//! - [`state`]: shared application state
//! - [`metrics`]: operational counters

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod extract;
pub mod inventory;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;
