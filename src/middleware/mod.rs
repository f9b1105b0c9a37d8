//! Middleware components for HTTP request processing.
//!
//! Cross-cutting concerns layered around the router: authentication extractors,
//! security headers, rate limiting, request validation and client identification.

pub mod auth;
pub mod ip;
pub mod rate_limit;
pub mod security_headers;
pub mod validation;

pub use auth::{AdminUser, AuthUser};
pub use rate_limit::{EndpointRateLimiter, RateLimiter};
