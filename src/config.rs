use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory with a pre-built SPA, served as fallback for unknown routes.
    pub ui_dir: Option<String>,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub token_ttl_secs: u64,
    pub bcrypt_cost: u32,
    pub admin_name: String,
    pub admin_email: String,
    pub admin_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    pub default_limit: i64,
    pub max_limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    pub max_rows: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub global_max_requests: usize,
    pub global_window_seconds: u64,
    pub login_max_requests: usize,
    pub login_window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SecurityConfig {
    pub enable_hsts: Option<bool>,
    pub hsts_max_age: Option<u64>,
    pub hsts_include_subdomains: Option<bool>,
    pub csp: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub pagination: PaginationConfig,
    pub export: ExportConfig,
    pub rate_limit: RateLimitConfig,
    pub security: Option<SecurityConfig>,
}

const DEFAULTS: &str = include_str!("../config/default.toml");

impl Default for AppConfig {
    fn default() -> Self {
        // Fallback: parse the embedded default TOML
        match ::config::Config::builder()
            .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
            .build()
        {
            Ok(cfg) => match cfg.try_deserialize() {
                Ok(app_cfg) => app_cfg,
                Err(e) => {
                    eprintln!("FATAL: Failed to deserialize default config: {}", e);
                    panic!("Failed to deserialize default config: {}", e);
                }
            },
            Err(e) => {
                eprintln!("FATAL: Failed to parse default config: {}", e);
                panic!("Failed to parse default config: {}", e);
            }
        }
    }
}

pub fn load() -> anyhow::Result<AppConfig> {
    // Load .env first (optional)
    let _ = dotenvy::dotenv();

    let mut builder = ::config::Config::builder()
        .add_source(::config::File::from_str(DEFAULTS, ::config::FileFormat::Toml))
        // Optional local file: medfood.toml (in CWD)
        .add_source(::config::File::with_name("medfood").required(false));

    if let Ok(custom_path) = std::env::var("MEDFOOD_CONFIG") {
        builder = builder.add_source(::config::File::with_name(&custom_path).required(false));
    }
    // Environment variables last to have highest precedence
    builder = builder.add_source(::config::Environment::with_prefix("MEDFOOD").separator("__"));

    let cfg = builder.build()?;
    let app_cfg: AppConfig = cfg.try_deserialize()?;
    validate(&app_cfg)?;
    Ok(app_cfg)
}

/// Exports hydrate child rows with one bound id per exported row; SQLite accepts
/// at most 32766 parameters per statement.
pub const MAX_EXPORT_ROWS: i64 = 30_000;

pub fn validate(cfg: &AppConfig) -> anyhow::Result<()> {
    // Server
    if cfg.server.port == 0 {
        return Err(anyhow::anyhow!("invalid server.port: {}", cfg.server.port));
    }
    #[cfg(unix)]
    if cfg.server.port < 1024 {
        tracing::warn!("Using privileged port {} - may require elevated permissions", cfg.server.port);
    }
    if cfg.server.max_body_bytes < 1024 {
        return Err(anyhow::anyhow!("server.max_body_bytes must be >= 1024"));
    }

    if cfg.database.max_connections == 0 {
        return Err(anyhow::anyhow!("database.max_connections must be > 0"));
    }

    // Auth
    if cfg.auth.jwt_secret.len() < 16 {
        return Err(anyhow::anyhow!("auth.jwt_secret must be at least 16 characters"));
    }
    if cfg.auth.token_ttl_secs == 0 {
        return Err(anyhow::anyhow!("auth.token_ttl_secs must be > 0"));
    }
    if !(4..=31).contains(&cfg.auth.bcrypt_cost) {
        return Err(anyhow::anyhow!("auth.bcrypt_cost must be in 4..=31"));
    }
    if cfg.auth.admin_email.trim().is_empty() || cfg.auth.admin_password.len() < 6 {
        return Err(anyhow::anyhow!("auth.admin_email must be set and auth.admin_password must have >= 6 chars"));
    }

    // Pagination / export
    if cfg.pagination.default_limit <= 0 || cfg.pagination.max_limit <= 0 {
        return Err(anyhow::anyhow!("pagination limits must be > 0"));
    }
    if cfg.pagination.default_limit > cfg.pagination.max_limit {
        return Err(anyhow::anyhow!("pagination.default_limit must be <= pagination.max_limit"));
    }
    if cfg.export.max_rows <= 0 || cfg.export.max_rows > MAX_EXPORT_ROWS {
        return Err(anyhow::anyhow!("export.max_rows must be in 1..={}", MAX_EXPORT_ROWS));
    }

    // Rate limits
    let rl = &cfg.rate_limit;
    if rl.global_max_requests == 0 || rl.global_window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.global_* values must be > 0"));
    }
    if rl.login_max_requests == 0 || rl.login_window_seconds == 0 {
        return Err(anyhow::anyhow!("rate_limit.login_* values must be > 0"));
    }

    Ok(())
}

pub fn ensure_sqlite_parent_dir(url: &str) -> anyhow::Result<()> {
    if let Some(path) = url.strip_prefix("sqlite://") {
        // sqlite:///C:/... on Windows carries a leading '/' before the drive letter
        #[cfg(windows)]
        let path = {
            let bytes = path.as_bytes();
            if bytes.len() >= 3 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
                &path[1..]
            } else {
                path
            }
        };
        let p = Path::new(path);
        if let Some(parent) = p.parent() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
