use std::sync::Arc;

use crate::auth::TokenService;
use crate::config::AppConfig;
use crate::metrics::Metrics;
use crate::middleware::{EndpointRateLimiter, RateLimiter};

/// Path key of the per-endpoint limiter guarding credential checks.
pub const LOGIN_ENDPOINT: &str = "/auth/login";

/// The shared application state.
///
/// Holds everything handlers, middleware and background tasks need. It is cheap to
/// clone and is handed to Axum through `Router::with_state`.
#[derive(Clone)]
pub struct AppState {
    /// The database connection pool.
    pub db: sqlx::SqlitePool,
    /// The application configuration.
    pub config: Arc<AppConfig>,
    /// Issues and verifies bearer tokens.
    pub tokens: TokenService,
    /// The application metrics.
    pub metrics: Metrics,
    /// Per-IP limiter applied to every request.
    pub global_limiter: RateLimiter,
    /// The per-endpoint rate limiter.
    pub rate_limiter: EndpointRateLimiter,
}

impl AppState {
    /// Creates a new `AppState` from a connected pool and a validated configuration.
    ///
    /// Rate limits come from the `rate_limit` config section:
    /// - a global sliding window per client IP
    /// - a tighter window on `/auth/login` to slow down password guessing
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> Self {
        let rl = &config.rate_limit;
        let global_limiter = RateLimiter::new(rl.global_max_requests, rl.global_window_seconds);
        let rate_limiter = EndpointRateLimiter::new().with_limits(vec![(
            LOGIN_ENDPOINT,
            rl.login_max_requests,
            rl.login_window_seconds,
        )]);
        let tokens = TokenService::new(&config.auth.jwt_secret, config.auth.token_ttl_secs);

        Self {
            db,
            config: Arc::new(config),
            tokens,
            metrics: Metrics::new(),
            global_limiter,
            rate_limiter,
        }
    }
}
