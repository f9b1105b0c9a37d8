//! Integration and unit tests for the medfood backend.
//!
//! API tests drive the full router with `tower::ServiceExt::oneshot` against an
//! in-memory SQLite database (see [`support`]).
//!
//! ## Test Modules
//!
//! - **auth_api_tests**: registration, login, token and role checks
//! - **catalog_api_tests**: units, foods, providers, medical centers, users
//! - **food_plan_api_tests**: plan validation, hierarchy and completion figures
//! - **inventory_api_tests**: food entries and the stock they maintain
//! - **export_api_tests**: Excel and Word downloads
//! - **error_tests**: error mapping and field validation
//! - **config_tests**: configuration defaults and validation
//! - **db_tests**: schema and admin bootstrap
//! - **health_api_tests**: health, readiness, metrics and version endpoints
//!
//! Individual modules can be run with:
//! ```bash
//! cargo test inventory_api_tests
//! ```

pub mod support;

pub mod catalog_api_tests;
pub mod error_tests;
pub mod food_plan_api_tests;
pub mod inventory_api_tests;
